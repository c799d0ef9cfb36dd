//! Progress reporting for sync operations

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Pipeline stage transitions observable by callers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// Scanning the seed file and comparing checksum tables
    ComputingDiff,
    /// Copying reusable blocks from the seed into the output
    CopyingBlocks,
    /// Fetching the remaining ranges over the network
    DownloadingPatch,
}

/// Observer invoked at each pipeline stage transition. Purely observational;
/// no return value is consumed and no suspension is implied.
pub trait ProgressObserver {
    fn state_changed(&self, state: SyncState);
}

/// Console observer backed by an indicatif spinner
pub struct ConsoleProgress {
    bar: ProgressBar,
}

impl ConsoleProgress {
    pub fn new(enabled: bool) -> Self {
        let bar = if enabled {
            let pb = ProgressBar::new_spinner();
            pb.set_style(
                ProgressStyle::default_spinner()
                    .template("{spinner:.green} {msg}")
                    .unwrap(),
            );
            pb.enable_steady_tick(Duration::from_millis(100));
            pb
        } else {
            ProgressBar::hidden()
        };
        Self { bar }
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ProgressObserver for ConsoleProgress {
    fn state_changed(&self, state: SyncState) {
        let msg = match state {
            SyncState::ComputingDiff => "computing local differences",
            SyncState::CopyingBlocks => "copying local blocks",
            SyncState::DownloadingPatch => "downloading patch",
        };
        self.bar.set_message(msg);
    }
}

/// Format a byte count for display
pub fn format_size(bytes: u64) -> String {
    human_bytes::human_bytes(bytes as f64)
}
