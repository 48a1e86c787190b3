//! Content fingerprints for dedup and download verification.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use modkit_schema::Sha256Digest;
use sha2::{Digest, Sha256};

/// Computes the content digest of a local file.
pub trait ChecksumProvider: Send + Sync {
    /// Digest the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns any I/O error raised while opening or reading the file.
    fn checksum(&self, path: &Path) -> io::Result<Sha256Digest>;
}

/// Streaming SHA-256 over the file contents.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Checksum;

impl ChecksumProvider for Sha256Checksum {
    fn checksum(&self, path: &Path) -> io::Result<Sha256Digest> {
        sha256_file(path)
    }
}

/// Hash a file without loading it into memory.
///
/// # Errors
///
/// Returns any I/O error raised while opening or reading the file.
pub fn sha256_file(path: &Path) -> io::Result<Sha256Digest> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];
    loop {
        let count = file.read(&mut buffer)?;
        if count == 0 {
            break;
        }
        hasher.update(&buffer[..count]);
    }
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&hasher.finalize());
    Ok(Sha256Digest::from_bytes(&bytes))
}
