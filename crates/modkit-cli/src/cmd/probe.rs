//! Probe command

use std::path::Path;

use anyhow::{Result, bail};

/// Report whether `path` is an archive the extraction tool can read
pub fn probe(path: &Path) -> Result<()> {
    let extractor = super::extractor()?;
    if !extractor.tool_available() {
        bail!(
            "Extraction tool '{}' not found",
            extractor.tool().display()
        );
    }

    if extractor.is_archive(path) {
        println!("{}: archive", path.display());
        Ok(())
    } else {
        bail!("{} is not a readable archive", path.display())
    }
}
