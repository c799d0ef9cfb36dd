//! Block and whole-file checksum primitives
//!
//! The weak checksum is the zsync rsum: two 16-bit accumulators over the
//! block's bytes, packed into a u32 and masked down to the width advertised
//! in the control file header. The strong checksum is MD4, truncated to the
//! configured width. Whole-file verification uses SHA-1 hex.

use crate::error::{Error, Result};
use md4::Md4;
use sha1::{Digest, Sha1};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Width in bytes of a full rsum value
pub const RSUM_SIZE: usize = 4;

/// Width in bytes of a full strong checksum (MD4)
pub const CHECKSUM_SIZE: usize = 16;

/// Compute the rsum of a block, masked to `rsum_bytes` significant bytes
pub fn rsum(block: &[u8], rsum_bytes: u8) -> u32 {
    let mut a: u16 = 0;
    let mut b: u16 = 0;
    let mut rlen = block.len() as u16;

    for &byte in block {
        let c = u16::from(byte);
        a = a.wrapping_add(c);
        b = b.wrapping_add(rlen.wrapping_mul(c));
        rlen = rlen.wrapping_sub(1);
    }

    mask_rsum((u32::from(a) << 16) | u32::from(b), rsum_bytes)
}

/// Mask a full rsum down to its trailing `rsum_bytes` bytes
pub fn mask_rsum(sum: u32, rsum_bytes: u8) -> u32 {
    if (rsum_bytes as usize) < RSUM_SIZE {
        sum & (0xffff_ffff >> (8 * (RSUM_SIZE as u32 - u32::from(rsum_bytes))))
    } else {
        sum
    }
}

/// Compute the strong checksum of a block: MD4 truncated to `checksum_bytes`,
/// zero-padded to the fixed storage width
pub fn strong_sum(block: &[u8], checksum_bytes: u8) -> [u8; CHECKSUM_SIZE] {
    let digest = Md4::digest(block);
    let mut out = [0u8; CHECKSUM_SIZE];
    out.copy_from_slice(&digest);
    for byte in &mut out[checksum_bytes as usize..] {
        *byte = 0;
    }
    out
}

/// SHA-1 of a byte slice as a lowercase hex string
pub fn sha1_hex(data: &[u8]) -> String {
    hex::encode(Sha1::digest(data))
}

/// SHA-1 of a file's contents as a lowercase hex string, computed streaming
pub fn sha1_hex_of_file(path: &Path) -> Result<String> {
    let mut file = File::open(path).map_err(|e| Error::io("opening file for hashing", e))?;
    let mut hasher = Sha1::new();
    let mut buffer = vec![0u8; 64 * 1024];

    loop {
        let read = file
            .read(&mut buffer)
            .map_err(|e| Error::io("reading file for hashing", e))?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    Ok(hex::encode(hasher.finalize()))
}
