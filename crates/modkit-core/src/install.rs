//! Install and publish pipelines.
//!
//! Install: download the archive from one of its mirrors, verify it,
//! extract it into a scratch directory and fold the result into the
//! destination. Publish: upload every artifact (skipping what the server
//! already has) and create the release.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use modkit_schema::{Sha256Digest, url_basename};
use rand::seq::SliceRandom;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::checksum::{ChecksumProvider, sha256_file};
use crate::config::Config;
use crate::io::download::download;
use crate::io::extract::{ArchiveExtractor, CommandRunner, ExtractError, ExtractOptions, SystemRunner};
use crate::io::upload::{UploadReport, upload_file};
use crate::remote::{RemoteClient, RemoteError};
use crate::reporter::Scaled;
use crate::tree::{CaseFix, MergeReport, ipath, movetree};
use crate::{ProgressSink, paths};

/// Rounds over the mirror list before giving up on an archive.
pub const DOWNLOAD_ROUNDS: usize = 3;

/// Share of the progress bar given to the download itself.
const DOWNLOAD_SPAN: f64 = 0.97;

#[derive(Error, Debug)]
pub enum InstallError {
    /// Every mirror failed or delivered a corrupted copy.
    #[error("Missing file \"{0}\": no mirror delivered a valid copy")]
    Missing(String),

    /// Extraction succeeded but a file the package needs is absent.
    #[error("Archive \"{archive}\" does not contain \"{entry}\"")]
    MissingEntry { archive: String, entry: String },

    #[error("No download URLs given for \"{0}\"")]
    NoSources(String),

    #[error("Extraction failed: {0}")]
    Extract(#[from] ExtractError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Groups common state used by the pipelines.
#[derive(Clone)]
pub struct Context<R: CommandRunner + 'static = SystemRunner> {
    pub remote: RemoteClient,
    pub extractor: Arc<ArchiveExtractor<R>>,
    pub progress: Arc<dyn ProgressSink>,
    pub case_fix: CaseFix,
    /// Parent directory for per-install scratch directories.
    pub scratch_root: PathBuf,
}

impl<R: CommandRunner + 'static> fmt::Debug for Context<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("remote", &self.remote)
            .field("case_fix", &self.case_fix)
            .field("scratch_root", &self.scratch_root)
            .finish_non_exhaustive()
    }
}

impl Context<SystemRunner> {
    /// Build a context from user configuration.
    pub fn from_config(config: &Config, client: reqwest::Client, progress: Arc<dyn ProgressSink>) -> Self {
        Self {
            remote: RemoteClient::new(client, config.api_url.clone(), config.token.clone()),
            extractor: Arc::new(ArchiveExtractor::new(config.seven_zip.clone())),
            progress,
            case_fix: config.case_policy(),
            scratch_root: paths::tmp_path(),
        }
    }
}

/// One archive to install.
#[derive(Debug, Clone, Default)]
pub struct InstallRequest {
    /// Mirrors serving the same archive.
    pub urls: Vec<String>,
    /// Local file name for the archive; derived from the first URL if unset.
    /// The name decides whether extraction takes two passes.
    pub filename: Option<String>,
    /// Expected content checksum, verified after each download.
    pub checksum: Option<Sha256Digest>,
    /// Paths (relative to the archive root) that must exist after extraction.
    pub required: Vec<String>,
    /// Where the archive's contents end up.
    pub dest: PathBuf,
}

impl InstallRequest {
    fn archive_name(&self) -> String {
        self.filename
            .clone()
            .or_else(|| {
                self.urls
                    .first()
                    .map(|u| url_basename(u).to_string())
            })
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| "archive".to_string())
    }
}

/// Download, verify, extract and merge one archive into `request.dest`.
///
/// # Errors
///
/// See [`InstallError`]. A failed install leaves the destination with
/// whatever was merged before the failure; the scratch directory is removed.
pub async fn install_archive<R>(
    ctx: &Context<R>,
    request: &InstallRequest,
) -> Result<MergeReport, InstallError>
where
    R: CommandRunner + 'static,
{
    let name = request.archive_name();
    if request.urls.is_empty() {
        return Err(InstallError::NoSources(name));
    }

    tokio::fs::create_dir_all(&ctx.scratch_root).await?;
    let scratch = tempfile::Builder::new()
        .prefix("modkit-")
        .tempdir_in(&ctx.scratch_root)?;
    let archive = scratch.path().join(&name);

    fetch_verified(ctx, request, &name, &archive).await?;

    ctx.progress.report(0.98, "Extracting...");
    let content = scratch.path().join("content");
    tokio::fs::create_dir_all(&content).await?;

    let report = {
        let extractor = Arc::clone(&ctx.extractor);
        let archive = archive.clone();
        let content = content.clone();
        let dest = request.dest.clone();
        let required = request.required.clone();
        let case_fix = ctx.case_fix;
        let name = name.clone();

        tokio::task::spawn_blocking(move || -> Result<MergeReport, InstallError> {
            debug!("Extracting {name} into {}", dest.display());
            extractor.extract(&archive, &content, &ExtractOptions::default())?;
            check_required(&content, &required, &name)?;
            Ok(movetree(&content, &dest, case_fix)?)
        })
        .await??
    };

    info!(
        "Installed {name} into {} ({} files, {} case fixes)",
        request.dest.display(),
        report.files_moved,
        report.collisions.len()
    );
    ctx.progress.report(1.0, "Done.");
    Ok(report)
}

/// Try the mirrors in random order, several rounds, until a download passes
/// the checksum.
async fn fetch_verified<R>(
    ctx: &Context<R>,
    request: &InstallRequest,
    name: &str,
    archive: &Path,
) -> Result<(), InstallError>
where
    R: CommandRunner + 'static,
{
    let mut urls = request.urls.clone();
    urls.shuffle(&mut rand::rng());

    for round in 1..=DOWNLOAD_ROUNDS {
        for url in &urls {
            ctx.progress.report(0.0, "Ready");

            let mut file = tokio::fs::File::create(archive).await?;
            let scaled = Scaled::new(&*ctx.progress, 0.0, DOWNLOAD_SPAN);
            if let Err(e) = download(ctx.remote.http(), url, &mut file, &scaled).await {
                error!("Download of \"{url}\" failed (round {round}): {e}");
                continue;
            }
            drop(file);

            let Some(expected) = &request.checksum else {
                return Ok(());
            };

            ctx.progress
                .report(DOWNLOAD_SPAN, &format!("Checking \"{name}\"..."));
            let path = archive.to_path_buf();
            let actual = tokio::task::spawn_blocking(move || sha256_file(&path)).await??;
            if &actual == expected {
                return Ok(());
            }
            error!("File \"{url}\" is corrupted! Expected {expected}, got {actual}");
        }
    }

    error!("Missing file \"{name}\"!");
    Err(InstallError::Missing(name.to_string()))
}

fn check_required(content: &Path, required: &[String], archive: &str) -> Result<(), InstallError> {
    for entry in required {
        if !ipath(&content.join(entry)).is_file() {
            warn!("Missing file \"{entry}\" from archive \"{archive}\"");
            return Err(InstallError::MissingEntry {
                archive: archive.to_string(),
                entry: entry.clone(),
            });
        }
    }
    Ok(())
}

/// Upload every `(field, path)` artifact, then create the release.
///
/// # Errors
///
/// Stops at the first failed upload. [`RemoteError::AccessDenied`] is
/// passed through untouched so callers can ask for new credentials.
pub async fn publish<R, C, T>(
    ctx: &Context<R>,
    checksums: &C,
    artifacts: &[(String, PathBuf)],
    release: &T,
) -> Result<Vec<UploadReport>, RemoteError>
where
    R: CommandRunner + 'static,
    C: ChecksumProvider + ?Sized,
    T: Serialize + ?Sized,
{
    let mut reports = Vec::with_capacity(artifacts.len());
    for (field, path) in artifacts {
        let report = upload_file(&ctx.remote, checksums, field, path, &*ctx.progress).await?;
        reports.push(report);
    }

    info!("Creating release ({} artifacts)", reports.len());
    ctx.remote.create_release(release).await?;
    Ok(reports)
}
