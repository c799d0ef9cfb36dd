//! blocksync - delta-download files over HTTP using zsync control files
//!
//! This library syncs a local file against a remote one by parsing the
//! remote's control file, reusing the blocks that already match locally, and
//! fetching only the changed blocks via HTTP range requests. The patched
//! result is verified against a whole-file SHA-1 before it replaces the
//! target.

pub mod checksum;
pub mod cli;
pub mod config;
pub mod control;
pub mod error;
pub mod install;
pub mod matcher;
pub mod patch;
pub mod plan;
pub mod progress;
pub mod retry;
pub mod scan;
pub mod sync;
pub mod transport;

pub use config::SyncOptions;
pub use control::{BlockSum, ControlFile, Header};
pub use error::{Error, Result};
pub use sync::{sync, sync_from_url};
