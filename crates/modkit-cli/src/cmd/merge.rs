//! Merge command

use std::path::Path;

use anyhow::{Context, Result, bail};
use modkit_core::config::Config;
use modkit_core::tree::{CaseFix, movetree};

use crate::ui;

/// Move the tree at `src` into `dest`
pub fn merge(src: &Path, dest: &Path, case_fix: Option<CaseFix>) -> Result<()> {
    if !src.is_dir() {
        bail!("{} is not a directory", src.display());
    }

    let case_fix = match case_fix {
        Some(policy) => policy,
        None => Config::load()
            .context("Failed to load configuration")?
            .case_policy(),
    };

    let report = movetree(src, dest, case_fix)
        .with_context(|| format!("Failed to merge {} into {}", src.display(), dest.display()))?;

    for collision in &report.collisions {
        ui::warning(&format!(
            "{} -> {}",
            collision.requested.display(),
            collision.resolved.display()
        ));
    }
    ui::success(&format!("Moved {} files", report.files_moved));
    Ok(())
}
