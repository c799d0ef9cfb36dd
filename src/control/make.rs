//! Control file generation
//!
//! Builds a control file for a local file so the other side of a sync can be
//! produced with the same tool. Also used heavily by tests.

use super::{ControlFile, Header};
use crate::checksum::{self, RSUM_SIZE};
use crate::error::{Error, Result};
use crate::scan;
use chrono::{DateTime, Utc};
use std::fs;
use std::io::Write;
use std::path::Path;

/// Build a control file describing a file on disk
pub fn build_control_file(path: &Path, block_size: usize, url: Option<String>) -> Result<ControlFile> {
    let data = fs::read(path).map_err(|e| Error::io("reading input file", e))?;
    let metadata = fs::metadata(path).map_err(|e| Error::io("reading input metadata", e))?;
    let mtime: DateTime<Utc> = metadata
        .modified()
        .map_err(|e| Error::io("reading input mtime", e))?
        .into();

    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| Error::config("input path has no usable file name"))?;

    Ok(build_control_file_from_bytes(
        &data, block_size, filename, url, mtime,
    ))
}

/// Build a control file from in-memory data
pub fn build_control_file_from_bytes(
    data: &[u8],
    block_size: usize,
    filename: &str,
    url: Option<String>,
    mtime: DateTime<Utc>,
) -> ControlFile {
    let header = Header {
        version: "0.6.2".to_string(),
        filename: filename.to_string(),
        url,
        mtime,
        block_size,
        length: data.len() as u64,
        seq_matches: 1,
        rsum_bytes: RSUM_SIZE as u8,
        checksum_bytes: checksum::CHECKSUM_SIZE as u8,
        sha1: checksum::sha1_hex(data),
    };

    let block_sums = scan::scan_bytes(data, &header);

    ControlFile { header, block_sums }
}

/// Write a control file to disk
pub fn write_control_file(cf: &ControlFile, path: &Path) -> Result<()> {
    let bytes = write_control_file_to_bytes(cf);
    fs::write(path, bytes).map_err(|e| Error::io("writing control file", e))
}

/// Serialize a control file to bytes
pub fn write_control_file_to_bytes(cf: &ControlFile) -> Vec<u8> {
    let h = &cf.header;
    let mut out = Vec::new();

    // Writes are to a Vec, they cannot fail
    let _ = writeln!(out, "zsync: {}", h.version);
    let _ = writeln!(out, "Filename: {}", h.filename);
    let _ = writeln!(out, "MTime: {}", h.mtime.to_rfc2822());
    let _ = writeln!(out, "Blocksize: {}", h.block_size);
    let _ = writeln!(out, "Length: {}", h.length);
    let _ = writeln!(
        out,
        "Hash-Lengths: {},{},{}",
        h.seq_matches, h.rsum_bytes, h.checksum_bytes
    );
    if let Some(url) = &h.url {
        let _ = writeln!(out, "URL: {}", url);
    }
    let _ = writeln!(out, "SHA-1: {}", h.sha1);
    let _ = writeln!(out);

    for block in &cf.block_sums {
        // Trailing rsum_bytes of the weak checksum, big-endian
        let weak = block.weak.to_be_bytes();
        out.extend_from_slice(&weak[RSUM_SIZE - h.rsum_bytes as usize..]);

        // Leading checksum_bytes of the strong checksum
        out.extend_from_slice(&block.strong[..h.checksum_bytes as usize]);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;
    use tempfile::NamedTempFile;

    #[test]
    fn test_build_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&[7u8; 100]).unwrap();

        let cf = build_control_file(file.path(), 32, None).unwrap();
        assert_eq!(cf.header.length, 100);
        assert_eq!(cf.block_count(), 4); // 32+32+32+4
    }

    #[test]
    fn test_table_record_width() {
        let cf = build_control_file_from_bytes(&[1u8; 64], 16, "f", None, Utc::now());
        let bytes = write_control_file_to_bytes(&cf);

        let blank = bytes.windows(2).position(|w| w == b"\n\n").unwrap() + 2;
        let record_len = (cf.header.rsum_bytes + cf.header.checksum_bytes) as usize;
        assert_eq!(bytes.len() - blank, record_len * 4);
    }

    #[test]
    fn test_sha1_is_hex_of_content() {
        let data = b"control file content hash";
        let cf = build_control_file_from_bytes(data, 8, "f", None, Utc::now());
        assert_eq!(cf.header.sha1, crate::checksum::sha1_hex(data));
    }
}
