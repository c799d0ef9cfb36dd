//! Control file data model: header metadata and the block checksum table

pub mod make;
pub mod parse;

pub use make::{
    build_control_file, build_control_file_from_bytes, write_control_file,
    write_control_file_to_bytes,
};
pub use parse::{read_control_file, read_control_file_from_bytes};

use crate::checksum::CHECKSUM_SIZE;
use chrono::{DateTime, Utc};

/// Header metadata parsed once from a control file
#[derive(Debug, Clone)]
pub struct Header {
    /// Producing zsync version string
    pub version: String,

    /// Target filename (relative to the control file's location)
    pub filename: String,

    /// Absolute or relative URL of the target file, if present
    pub url: Option<String>,

    /// Modification time of the target file
    pub mtime: DateTime<Utc>,

    /// Bytes per block (power of two in practice, always > 0)
    pub block_size: usize,

    /// Total target file length in bytes
    pub length: u64,

    /// Consecutive-match requirement from Hash-Lengths (1 or 2)
    pub seq_matches: u8,

    /// Significant bytes of the weak checksum (1-4)
    pub rsum_bytes: u8,

    /// Significant bytes of the strong checksum (3-16)
    pub checksum_bytes: u8,

    /// Whole-file SHA-1 as a lowercase hex string
    pub sha1: String,
}

impl Header {
    /// Number of blocks the target file divides into
    pub fn block_count(&self) -> u64 {
        if self.length == 0 {
            0
        } else {
            (self.length + self.block_size as u64 - 1) / self.block_size as u64
        }
    }

    /// Size of the final block (equals `block_size` when the length divides evenly)
    pub fn last_block_size(&self) -> usize {
        let rem = (self.length % self.block_size as u64) as usize;
        if rem == 0 {
            self.block_size
        } else {
            rem
        }
    }
}

/// Checksums for a single block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockSum {
    /// Block index (0-based), not a byte offset
    pub block_start: u64,

    /// Weak rolling-style checksum, masked to the header's rsum width
    pub weak: u32,

    /// Strong checksum, truncated to the header's width and zero-padded
    pub strong: [u8; CHECKSUM_SIZE],
}

impl BlockSum {
    pub fn new(block_start: u64, weak: u32, strong: [u8; CHECKSUM_SIZE]) -> Self {
        Self {
            block_start,
            weak,
            strong,
        }
    }

    /// Two blocks match only when both checksums are byte-for-byte equal.
    /// Weak equality alone is a candidate filter, never a match.
    pub fn checksums_match(&self, other: &BlockSum) -> bool {
        self.weak == other.weak && self.strong == other.strong
    }
}

/// A parsed control file: header plus the remote block checksum table,
/// ordered by block position in the target file
#[derive(Debug, Clone)]
pub struct ControlFile {
    pub header: Header,
    pub block_sums: Vec<BlockSum>,
}

impl ControlFile {
    /// Number of blocks in the table
    pub fn block_count(&self) -> usize {
        self.block_sums.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_with(block_size: usize, length: u64) -> Header {
        Header {
            version: "0.6.2".to_string(),
            filename: "file.bin".to_string(),
            url: None,
            mtime: Utc::now(),
            block_size,
            length,
            seq_matches: 1,
            rsum_bytes: 4,
            checksum_bytes: 16,
            sha1: String::new(),
        }
    }

    #[test]
    fn test_block_count() {
        assert_eq!(header_with(4, 10).block_count(), 3);
        assert_eq!(header_with(4, 8).block_count(), 2);
        assert_eq!(header_with(4, 0).block_count(), 0);
    }

    #[test]
    fn test_last_block_size() {
        assert_eq!(header_with(4, 10).last_block_size(), 2);
        assert_eq!(header_with(4, 8).last_block_size(), 4);
    }

    #[test]
    fn test_weak_match_alone_is_not_a_match() {
        let mut strong_a = [0u8; CHECKSUM_SIZE];
        strong_a[0] = 1;
        let mut strong_b = [0u8; CHECKSUM_SIZE];
        strong_b[0] = 2;

        let a = BlockSum::new(0, 0xdead_beef, strong_a);
        let b = BlockSum::new(1, 0xdead_beef, strong_b);
        assert!(!a.checksums_match(&b));

        let c = BlockSum::new(2, 0xdead_beef, strong_a);
        assert!(a.checksums_match(&c));
    }
}
