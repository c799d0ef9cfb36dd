//! Local scanner: computes the block checksum table of an existing seed file
//!
//! Produces a table with the same shape as the remote table in the control
//! file, using the header's block size and checksum widths. A short final
//! window is summed over the remaining bytes only, mirroring how the last
//! remote block is computed.

use crate::checksum;
use crate::control::{BlockSum, Header};
use crate::error::{Error, Result};
use memmap2::Mmap;
use rayon::prelude::*;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Seed files above this size are scanned through a memory map
const MMAP_THRESHOLD: u64 = 10 * 1024 * 1024;

/// Scan a seed file into a local block checksum table
pub fn scan_file(path: &Path, header: &Header) -> Result<Vec<BlockSum>> {
    let file = File::open(path).map_err(|e| Error::io("opening seed file", e))?;
    let metadata = file
        .metadata()
        .map_err(|e| Error::io("reading seed metadata", e))?;
    let file_size = metadata.len();

    if file_size == 0 {
        return Ok(Vec::new());
    }

    if file_size > MMAP_THRESHOLD {
        scan_file_mmap(&file, header)
    } else {
        scan_file_read(file, header)
    }
}

fn scan_file_mmap(file: &File, header: &Header) -> Result<Vec<BlockSum>> {
    let mmap = unsafe { Mmap::map(file).map_err(|e| Error::io("memory mapping seed file", e))? };
    let block_size = header.block_size;
    let num_blocks = (mmap.len() + block_size - 1) / block_size;

    let blocks = (0..num_blocks)
        .into_par_iter()
        .map(|i| {
            let start = i * block_size;
            let end = std::cmp::min(start + block_size, mmap.len());
            block_sum(i as u64, &mmap[start..end], header)
        })
        .collect();

    Ok(blocks)
}

fn scan_file_read(mut file: File, header: &Header) -> Result<Vec<BlockSum>> {
    let mut blocks = Vec::new();
    let mut buffer = vec![0u8; header.block_size];
    let mut index = 0u64;

    loop {
        let filled = fill_buffer(&mut file, &mut buffer)?;
        if filled == 0 {
            break;
        }
        blocks.push(block_sum(index, &buffer[..filled], header));
        index += 1;
        if filled < buffer.len() {
            break; // short final window
        }
    }

    Ok(blocks)
}

/// Scan an in-memory buffer into a block checksum table
pub fn scan_bytes(data: &[u8], header: &Header) -> Vec<BlockSum> {
    data.chunks(header.block_size)
        .enumerate()
        .map(|(i, chunk)| block_sum(i as u64, chunk, header))
        .collect()
}

fn block_sum(index: u64, chunk: &[u8], header: &Header) -> BlockSum {
    BlockSum::new(
        index,
        checksum::rsum(chunk, header.rsum_bytes),
        checksum::strong_sum(chunk, header.checksum_bytes),
    )
}

/// Read until the buffer is full or EOF; returns the number of bytes read
fn fill_buffer(file: &mut File, buffer: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buffer.len() {
        let read = file
            .read(&mut buffer[filled..])
            .map_err(|e| Error::io("reading seed file", e))?;
        if read == 0 {
            break;
        }
        filled += read;
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn header(block_size: usize, length: u64) -> Header {
        Header {
            version: "0.6.2".to_string(),
            filename: "f".to_string(),
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
    fn test_scan_bytes_block_count() {
        let sums = scan_bytes(&[0u8; 1000], &header(100, 1000));
        assert_eq!(sums.len(), 10);
        assert_eq!(sums[3].block_start, 3);
    }

    #[test]
    fn test_scan_bytes_short_last_window() {
        let data = vec![9u8; 150];
        let h = header(100, 150);
        let sums = scan_bytes(&data, &h);

        assert_eq!(sums.len(), 2);
        // The short window is summed over the remaining 50 bytes only
        assert_eq!(sums[1].weak, crate::checksum::rsum(&data[100..], 4));
        assert_eq!(sums[1].strong, crate::checksum::strong_sum(&data[100..], 16));
    }

    #[test]
    fn test_scan_file_matches_scan_bytes() {
        let data: Vec<u8> = (0..=255u8).cycle().take(700).collect();
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&data).unwrap();

        let h = header(256, 700);
        assert_eq!(scan_file(file.path(), &h).unwrap(), scan_bytes(&data, &h));
    }

    #[test]
    fn test_scan_empty_file() {
        let file = NamedTempFile::new().unwrap();
        assert!(scan_file(file.path(), &header(4096, 0)).unwrap().is_empty());
    }

    #[test]
    fn test_scan_missing_file_errors() {
        let result = scan_file(Path::new("/nonexistent/seed"), &header(4096, 0));
        assert!(matches!(result, Err(crate::Error::Io { .. })));
    }
}
