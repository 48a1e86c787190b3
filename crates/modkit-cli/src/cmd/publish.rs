//! Publish command

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use modkit_core::checksum::Sha256Checksum;
use modkit_core::io::upload::UploadOutcome;
use modkit_core::remote::RemoteError;

use crate::ui;

/// Upload artifacts and create the release described by `release`
pub async fn publish(release: &Path, artifacts: &[String], quiet: bool) -> Result<()> {
    let raw = std::fs::read_to_string(release)
        .with_context(|| format!("Failed to read {}", release.display()))?;
    let body: serde_json::Value =
        serde_json::from_str(&raw).with_context(|| format!("Invalid JSON in {}", release.display()))?;
    let artifacts = artifacts
        .iter()
        .map(String::as_str)
        .map(parse_artifact)
        .collect::<Result<Vec<_>>>()?;

    let ctx = super::context(quiet)?;
    let reports = match modkit_core::install::publish(&ctx, &Sha256Checksum, &artifacts, &body).await {
        Ok(reports) => reports,
        Err(RemoteError::AccessDenied) => {
            bail!("Access denied. Log in again or set MODKIT_TOKEN.")
        }
        Err(e) => return Err(e).context("Publish failed"),
    };

    for ((field, _), report) in artifacts.iter().zip(&reports) {
        match report.outcome {
            UploadOutcome::AlreadyPresent => println!("{field}: already uploaded"),
            UploadOutcome::Uploaded { bytes } => println!("{field}: uploaded {bytes} bytes"),
        }
    }
    ui::success("Release created");
    Ok(())
}

/// Split `field=path`.
pub(crate) fn parse_artifact(arg: &str) -> Result<(String, PathBuf)> {
    match arg.split_once('=') {
        Some((field, path)) if !field.is_empty() && !path.is_empty() => {
            Ok((field.to_string(), PathBuf::from(path)))
        }
        _ => bail!("Expected field=path, got '{arg}'"),
    }
}
