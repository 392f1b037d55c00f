//! Computes the cryptographic hash of a file using the Blake3 algorithm.
//!
//! The file is streamed through the hasher in fixed-size chunks, so memory use does
//! not depend on file size.
//!
//! # Errors
//!
//! Returns an error if the file cannot be opened or a read fails part-way. Callers
//! treat that as a per-file failure: the record simply stays unhashed.
use crate::error::Result;
use blake3::Hash as Blake3Hash;

use std::{
    fs::File,
    io::{ErrorKind, Read},
    path::Path,
};

/// Read size used when streaming file content
pub const HASH_CHUNK_SIZE: usize = 64 * 1024;

/// Compute the cryptographic hash of a file using the Blake3 algorithm
pub fn compute_cryptographic<P: AsRef<Path>>(path: P) -> Result<Blake3Hash> {
    let mut file = File::open(&path)?;
    hash_reader(&mut file)
}

/// Hash everything a reader yields
pub fn hash_reader<R: Read>(reader: &mut R) -> Result<Blake3Hash> {
    let mut hasher = blake3::Hasher::new();
    let mut buffer = vec![0u8; HASH_CHUNK_SIZE];
    loop {
        let bytes_read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        hasher.update(&buffer[..bytes_read]);
    }
    Ok(hasher.finalize())
}
