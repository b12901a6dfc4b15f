use crate::libs::error::{Result, UpdateError};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;

/// Read size for streaming digests; memory use does not grow with file size.
pub const HASH_CHUNK_SIZE: usize = 1024 * 1024;

/// Lower-case hex SHA-256 of a file's contents, streamed in
/// [`HASH_CHUNK_SIZE`] reads.
pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file = File::open(path).map_err(|e| UpdateError::io(path, e))?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; HASH_CHUNK_SIZE];

    loop {
        let read = match file.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(UpdateError::io(path, e)),
        };
        hasher.update(&buffer[..read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Digest of an in-memory buffer, same format as [`sha256_file`].
pub fn sha256_bytes(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}
