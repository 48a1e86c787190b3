//! Hash command

use std::path::PathBuf;

use anyhow::{Context, Result};
use modkit_core::checksum::sha256_file;

/// Print the SHA256 of each file
pub fn hash(files: &[PathBuf]) -> Result<()> {
    for file in files {
        let digest =
            sha256_file(file).with_context(|| format!("Failed to read {}", file.display()))?;
        println!("{digest}  {}", file.display());
    }
    Ok(())
}
