//! Content digests for staged copies.
//!
//! Two items with the same digest and size are the same logical file no
//! matter what keys their listers assigned them.

use std::io;
use std::path::Path;

use sha2::{Digest, Sha256};
use tokio::io::AsyncReadExt;

/// Read buffer for file digesting.
const DIGEST_BUFFER_SIZE: usize = 64 * 1024;

/// Computes the hex-encoded SHA-256 digest of a byte slice.
pub fn sha256_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Computes the hex-encoded SHA-256 digest of an entire file.
///
/// Streams in 64 KiB chunks so arbitrarily large staged copies never
/// load fully into memory.
pub async fn sha256_file(path: &Path) -> io::Result<String> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; DIGEST_BUFFER_SIZE];

    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}
