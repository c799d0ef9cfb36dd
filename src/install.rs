//! Installer: verifies the finished temporary file and atomically replaces
//! the target
//!
//! This is the only place the original file on disk can be overwritten. A
//! verification failure leaves the target untouched.

use crate::checksum::sha1_hex_of_file;
use crate::error::{Error, Result};
use std::path::Path;

/// Verify the temporary file's whole-file SHA-1 against the expected hex
/// digest (case-insensitive) and, on success, atomically rename it over the
/// target path.
pub fn verify_and_install(tmp_path: &Path, target: &Path, expected_sha1: &str) -> Result<()> {
    let actual = sha1_hex_of_file(tmp_path)?;

    if !actual.eq_ignore_ascii_case(expected_sha1) {
        return Err(Error::Verification {
            path: tmp_path.to_path_buf(),
            expected: expected_sha1.to_ascii_lowercase(),
            actual,
        });
    }

    std::fs::rename(tmp_path, target)
        .map_err(|e| Error::io("installing verified file", e))?;

    tracing::debug!(target = %target.display(), "Verified and installed");
    Ok(())
}
