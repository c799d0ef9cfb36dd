//! Control file parsing
//!
//! A control file is a set of `Key: Value` header lines terminated by a blank
//! line, followed by one fixed-width binary record per block: the trailing
//! `rsum_bytes` bytes of the weak checksum, then the leading `checksum_bytes`
//! bytes of the strong checksum.

use super::{BlockSum, ControlFile, Header};
use crate::checksum::{CHECKSUM_SIZE, RSUM_SIZE};
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Read and parse a control file from disk
pub fn read_control_file(path: &Path) -> Result<ControlFile> {
    let mut file = File::open(path).map_err(|e| Error::io("opening control file", e))?;
    let mut data = Vec::new();
    file.read_to_end(&mut data)
        .map_err(|e| Error::io("reading control file", e))?;
    read_control_file_from_bytes(&data)
}

/// Parse a control file from raw bytes
pub fn read_control_file_from_bytes(data: &[u8]) -> Result<ControlFile> {
    let (header, body_offset) = parse_header(data)?;
    let block_sums = parse_block_sums(&header, &data[body_offset..])?;
    Ok(ControlFile { header, block_sums })
}

fn parse_header(data: &[u8]) -> Result<(Header, usize)> {
    let mut version = String::new();
    let mut filename = String::new();
    let mut url = None;
    let mut mtime: Option<DateTime<Utc>> = None;
    let mut block_size: usize = 0;
    let mut length: u64 = 0;
    let mut seq_matches: u8 = 1;
    let mut rsum_bytes: u8 = RSUM_SIZE as u8;
    let mut checksum_bytes: u8 = CHECKSUM_SIZE as u8;
    let mut sha1 = String::new();

    let mut pos = 0usize;
    loop {
        let line_end = data[pos..]
            .iter()
            .position(|&b| b == b'\n')
            .ok_or_else(|| Error::control("unterminated header"))?;
        let line = &data[pos..pos + line_end];
        pos += line_end + 1;

        if line.is_empty() {
            break; // blank line ends the header
        }

        let line = std::str::from_utf8(line)
            .map_err(|_| Error::control("header line is not valid UTF-8"))?;
        let (key, value) = line
            .split_once(':')
            .ok_or_else(|| Error::control(format!("malformed header line: {}", line)))?;
        let value = value.trim();

        match key.to_ascii_lowercase().as_str() {
            "zsync" => version = value.to_string(),
            "filename" => filename = value.to_string(),
            "url" => url = Some(value.to_string()),
            "mtime" => {
                let parsed = DateTime::parse_from_rfc2822(value)
                    .map_err(|e| Error::control(format!("invalid MTime value: {}", e)))?;
                mtime = Some(parsed.with_timezone(&Utc));
            }
            "blocksize" => {
                block_size = value
                    .parse()
                    .map_err(|_| Error::control(format!("invalid Blocksize: {}", value)))?;
            }
            "length" => {
                length = value
                    .parse()
                    .map_err(|_| Error::control(format!("invalid Length: {}", value)))?;
            }
            "hash-lengths" => {
                let parts: Vec<&str> = value.split(',').collect();
                if parts.len() != 3 {
                    return Err(Error::control(format!("invalid Hash-Lengths: {}", value)));
                }
                seq_matches = parts[0]
                    .parse()
                    .map_err(|_| Error::control("invalid seq_matches"))?;
                rsum_bytes = parts[1]
                    .parse()
                    .map_err(|_| Error::control("invalid rsum_bytes"))?;
                checksum_bytes = parts[2]
                    .parse()
                    .map_err(|_| Error::control("invalid checksum_bytes"))?;
            }
            "sha-1" => sha1 = value.to_ascii_lowercase(),
            // Producer, SHA-256 and unknown keys are ignored
            _ => {}
        }
    }

    if block_size == 0 {
        return Err(Error::control("missing or zero Blocksize"));
    }
    if !(1..=2).contains(&seq_matches) {
        return Err(Error::control(format!(
            "seq_matches out of range: {}",
            seq_matches
        )));
    }
    if !(1..=RSUM_SIZE as u8).contains(&rsum_bytes) {
        return Err(Error::control(format!(
            "rsum_bytes out of range: {}",
            rsum_bytes
        )));
    }
    if !(3..=CHECKSUM_SIZE as u8).contains(&checksum_bytes) {
        return Err(Error::control(format!(
            "checksum_bytes out of range: {}",
            checksum_bytes
        )));
    }
    if sha1.is_empty() {
        return Err(Error::control("missing SHA-1 header"));
    }

    let header = Header {
        version,
        filename,
        url,
        mtime: mtime.ok_or_else(|| Error::control("missing MTime header"))?,
        block_size,
        length,
        seq_matches,
        rsum_bytes,
        checksum_bytes,
        sha1,
    };

    Ok((header, pos))
}

fn parse_block_sums(header: &Header, body: &[u8]) -> Result<Vec<BlockSum>> {
    let record_len = header.rsum_bytes as usize + header.checksum_bytes as usize;
    let block_count = header.block_count() as usize;

    if body.len() < record_len * block_count {
        return Err(Error::control(format!(
            "checksum table truncated: need {} bytes, have {}",
            record_len * block_count,
            body.len()
        )));
    }

    let mut block_sums = Vec::with_capacity(block_count);
    for i in 0..block_count {
        let record = &body[i * record_len..(i + 1) * record_len];

        let mut weak: u32 = 0;
        for &byte in &record[..header.rsum_bytes as usize] {
            weak = (weak << 8) | u32::from(byte);
        }

        let mut strong = [0u8; CHECKSUM_SIZE];
        strong[..header.checksum_bytes as usize]
            .copy_from_slice(&record[header.rsum_bytes as usize..]);

        block_sums.push(BlockSum::new(i as u64, weak, strong));
    }

    Ok(block_sums)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::make::{build_control_file_from_bytes, write_control_file_to_bytes};
    use chrono::Utc;

    #[test]
    fn test_roundtrip() {
        let data = b"0123456789abcdefghij";
        let cf = build_control_file_from_bytes(data, 8, "file.bin", None, Utc::now());
        let bytes = write_control_file_to_bytes(&cf);

        let parsed = read_control_file_from_bytes(&bytes).unwrap();
        assert_eq!(parsed.header.block_size, 8);
        assert_eq!(parsed.header.length, 20);
        assert_eq!(parsed.header.sha1, cf.header.sha1);
        assert_eq!(parsed.block_sums, cf.block_sums);
    }

    #[test]
    fn test_missing_blank_line() {
        let result = read_control_file_from_bytes(b"zsync: 0.6.2\nBlocksize: 2048\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_truncated_table() {
        let data = b"0123456789abcdefghij";
        let cf = build_control_file_from_bytes(data, 8, "file.bin", None, Utc::now());
        let mut bytes = write_control_file_to_bytes(&cf);
        bytes.truncate(bytes.len() - 5);

        let result = read_control_file_from_bytes(&bytes);
        assert!(matches!(result, Err(crate::Error::ControlFile { .. })));
    }

    #[test]
    fn test_zero_blocksize_rejected() {
        let doc = b"zsync: 0.6.2\nFilename: f\nMTime: Thu, 01 Jan 1970 00:00:00 +0000\n\
Blocksize: 0\nLength: 10\nHash-Lengths: 1,4,16\nSHA-1: 00\n\n";
        assert!(read_control_file_from_bytes(doc).is_err());
    }
}
