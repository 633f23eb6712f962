//! Checksum utilities for feed payload fingerprinting
//!
//! Downloaded feed bytes are fingerprinted with SHA-256 so that runs over
//! an identical feed are recognizable in the logs.

use crate::error::Result;
use sha2::{Digest, Sha256};
use std::io::Read;

/// Compute the SHA-256 checksum of any readable source, hex-encoded
pub fn sha256_hex<R: Read>(reader: &mut R) -> Result<String> {
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];

    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Compute the SHA-256 checksum of an in-memory payload, hex-encoded
pub fn sha256_hex_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
