//! Extract command

use std::path::Path;

use anyhow::{Context, Result};
use modkit_core::io::extract::ExtractOptions;

use crate::ui;

/// Unpack `archive` into `out`, optionally only the listed entries
pub fn extract(archive: &Path, out: &Path, overwrite: bool, entries: Vec<String>) -> Result<()> {
    let extractor = super::extractor()?;
    let opts = ExtractOptions {
        overwrite,
        entries: (!entries.is_empty()).then_some(entries),
    };

    extractor
        .extract(archive, out, &opts)
        .with_context(|| format!("Failed to extract {}", archive.display()))?;

    ui::success(&format!("Extracted into {}", out.display()));
    Ok(())
}
