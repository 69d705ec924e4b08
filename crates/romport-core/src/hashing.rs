//! Content identity hashing for imported files.
//!
//! The identity of a ROM or skin is the SHA256 of the first
//! [`ImportConfig::IDENTITY_PREFIX_BYTES`] of its content. Only bytes
//! participate, never the path or file name, so the same dump imported from
//! two folders under two names resolves to the same record.

use crate::config::ImportConfig;
use crate::error::{RomportError, Result};
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::Path;

/// Length of a rendered identity (hex-encoded SHA256).
pub const IDENTITY_LEN: usize = 64;

/// Compute the identity hash of a file.
///
/// # Returns
///
/// Lowercase hex string of [`IDENTITY_LEN`] characters.
pub fn content_identity(path: impl AsRef<Path>) -> Result<String> {
    content_identity_with_limit(path, ImportConfig::IDENTITY_PREFIX_BYTES)
}

/// Compute the identity hash over at most `limit` leading bytes.
pub fn content_identity_with_limit(path: impl AsRef<Path>, limit: u64) -> Result<String> {
    let path = path.as_ref();
    let file = std::fs::File::open(path).map_err(|e| RomportError::io_with_path(e, path))?;
    let mut reader = file.take(limit);

    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; ImportConfig::HASH_CHUNK_SIZE];
    loop {
        let bytes_read = reader
            .read(&mut buffer)
            .map_err(|e| RomportError::io_with_path(e, path))?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Compute the identity hash on the blocking pool.
pub async fn content_identity_async(path: impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref().to_path_buf();

    tokio::task::spawn_blocking(move || content_identity(&path))
        .await
        .map_err(|e| RomportError::Other(format!("Hash computation task failed: {}", e)))?
}
