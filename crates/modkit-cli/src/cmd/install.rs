//! Install command

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use modkit_core::install::{InstallRequest, install_archive};
use modkit_core::tree::CaseFix;
use modkit_schema::Sha256Digest;

use crate::ui;

/// Arguments of `modkit install`
#[derive(Debug)]
pub struct InstallArgs {
    pub urls: Vec<String>,
    pub dest: PathBuf,
    pub checksum: Option<String>,
    pub filename: Option<String>,
    pub required: Vec<String>,
    /// Overrides the configured policy
    pub case_fix: Option<CaseFix>,
}

/// Download an archive and merge its contents into `dest`
pub async fn install(args: InstallArgs, quiet: bool) -> Result<()> {
    let checksum = args
        .checksum
        .map(Sha256Digest::new)
        .transpose()
        .context("Invalid --checksum")?;

    let mut ctx = super::context(quiet)?;
    if let Some(policy) = args.case_fix {
        ctx.case_fix = policy;
    }
    if !ctx.extractor.tool_available() {
        anyhow::bail!(
            "Extraction tool '{}' not found. Install 7-Zip or set MODKIT_7Z.",
            ctx.extractor.tool().display()
        );
    }

    let request = InstallRequest {
        urls: args.urls,
        filename: args.filename,
        checksum,
        required: args.required,
        dest: args.dest,
    };

    let report = install_archive(&ctx, &request)
        .await
        .with_context(|| format!("Failed to install into {}", request.dest.display()))?;

    for collision in &report.collisions {
        ui::warning(&format!(
            "{} was installed as {}",
            collision.requested.display(),
            collision.resolved.display()
        ));
    }
    ui::success(&format!(
        "Installed {} files into {}",
        report.files_moved,
        request.dest.display()
    ));
    Ok(())
}
