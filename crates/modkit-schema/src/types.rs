//! Transfer, archive and progress data plus the server response bodies.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Marker embedded in the file name of a two-layer archive (`pkg.tar.gz`).
pub const COMPOUND_MARKER: &str = ".tar.";

/// Byte accounting for one download or upload.
///
/// Lives for the duration of a single transfer call. `transferred` only
/// grows and never exceeds `expected_size` once that is known, even if the
/// peer sends more than it announced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferTask {
    /// Where the bytes come from (URL or local path).
    pub source: String,
    /// Total size announced up front, if any.
    pub expected_size: Option<u64>,
    /// Bytes moved so far.
    pub transferred: u64,
}

impl TransferTask {
    /// Start accounting for a transfer of `expected_size` bytes from `source`.
    pub fn new(source: impl Into<String>, expected_size: Option<u64>) -> Self {
        Self {
            source: source.into(),
            expected_size,
            transferred: 0,
        }
    }

    /// Record `n` more bytes, capped at the expected size.
    pub fn advance(&mut self, n: u64) {
        let next = self.transferred.saturating_add(n);
        self.transferred = match self.expected_size {
            Some(total) => next.min(total),
            None => next,
        };
    }

    /// Completion in `[0, 1]`, or `None` when the total is unknown.
    pub fn fraction(&self) -> Option<f64> {
        let total = self.expected_size.filter(|&t| t > 0)?;
        Some((self.transferred as f64 / total as f64).min(1.0))
    }

    /// Integer percent, truncated like the fraction it derives from.
    pub fn percent(&self) -> Option<u64> {
        self.fraction().map(|f| (f * 100.0) as u64)
    }

    /// Last path segment of the source, used in progress labels.
    pub fn base_name(&self) -> &str {
        url_basename(&self.source)
    }
}

/// Last path segment of a URL or path, ignoring query, fragment and a
/// trailing `/`.
pub fn url_basename(url: &str) -> &str {
    let trimmed = url.split(['?', '#']).next().unwrap_or("");
    trimmed
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(trimmed)
}

/// An archive on disk and whether it needs two extraction passes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveHandle {
    path: PathBuf,
    compound: bool,
}

impl ArchiveHandle {
    /// Classify the archive at `path` by its file name.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let compound = path
            .file_name()
            .is_some_and(|n| n.to_string_lossy().contains(COMPOUND_MARKER));
        Self { path, compound }
    }

    /// Location of the archive.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True for `name.tar.<ext>` style archives.
    pub fn is_compound(&self) -> bool {
        self.compound
    }

    /// The inner container produced by the first pass: the same path with
    /// the outermost extension removed (`pkg.tar.gz` -> `pkg.tar`).
    pub fn intermediate(&self) -> PathBuf {
        self.path.with_extension("")
    }

    /// Directory the archive lives in; stage one unpacks here.
    pub fn parent(&self) -> PathBuf {
        self.path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
    }
}

/// A single progress update. Sinks only care about the latest one.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEvent {
    /// Completion in `[0, 1]`.
    pub fraction: f64,
    /// Human readable description of the step.
    pub label: String,
}

impl ProgressEvent {
    /// Build an event, clamping `fraction` into `[0, 1]` (NaN becomes 0).
    pub fn new(fraction: f64, label: impl Into<String>) -> Self {
        let fraction = if fraction.is_nan() {
            0.0
        } else {
            fraction.clamp(0.0, 1.0)
        };
        Self {
            fraction,
            label: label.into(),
        }
    }
}

/// Response body of `upload/check`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckResponse {
    /// True when the server already stores a file with the checksum.
    #[serde(default)]
    pub result: bool,
}

/// Reason string the server uses when it refuses a request for lack of rights.
pub const REASON_UNAUTHORIZED: &str = "unauthorized";

/// Response body of `mod/release` and similar mutation calls.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReleaseResponse {
    /// Whether the call succeeded.
    #[serde(default)]
    pub result: bool,
    /// Failure reason, if the server gave one.
    #[serde(default)]
    pub reason: Option<String>,
}

impl ReleaseResponse {
    /// True when the failure reason is an authorization refusal.
    pub fn is_unauthorized(&self) -> bool {
        !self.result && self.reason.as_deref() == Some(REASON_UNAUTHORIZED)
    }
}
