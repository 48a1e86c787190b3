//! Checksum-deduplicated streaming uploads.
//!
//! A file is fingerprinted first; if the server already stores that
//! checksum nothing is sent. Otherwise the file is streamed as the `file`
//! part of a `multipart/form-data` form, and progress is reported as the
//! fraction of the file's bytes handed to the connection.

use std::path::Path;

use futures::TryStreamExt;
use modkit_schema::{Sha256Digest, TransferTask};
use reqwest::Body;
use reqwest::multipart::{Form, Part};
use tokio::sync::mpsc;
use tokio_util::io::ReaderStream;
use tracing::info;

use crate::ProgressSink;
use crate::checksum::ChecksumProvider;
use crate::remote::{RemoteClient, RemoteError};

/// Read size for the file part of an upload.
const UPLOAD_CHUNK: usize = 64 * 1024;

/// Whether bytes actually went over the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOutcome {
    /// The server already had the checksum; nothing was sent.
    AlreadyPresent,
    /// The file was sent.
    Uploaded {
        /// Size of the file sent.
        bytes: u64,
    },
}

/// Result of [`upload_file`].
#[derive(Debug, Clone)]
pub struct UploadReport {
    /// Checksum the server now holds.
    pub checksum: Sha256Digest,
    /// What happened.
    pub outcome: UploadOutcome,
}

/// Make sure the server holds the contents of `path`, uploading only if needed.
///
/// `name` is the logical field the file belongs to (`logo`, `tile`, an
/// archive name) and only appears in progress labels.
///
/// # Errors
///
/// Returns [`RemoteError::AccessDenied`] if the server refuses
/// authorization, [`RemoteError::RequestFailed`] if it does not acknowledge
/// the upload, and I/O or transport errors otherwise.
pub async fn upload_file<C, S>(
    remote: &RemoteClient,
    checksums: &C,
    name: &str,
    path: &Path,
    progress: &S,
) -> Result<UploadReport, RemoteError>
where
    C: ChecksumProvider + ?Sized,
    S: ProgressSink + ?Sized,
{
    let checksum = checksums.checksum(path)?;

    if remote.check_upload(&checksum).await? {
        info!("{name} ({checksum}) already uploaded");
        return Ok(UploadReport {
            checksum,
            outcome: UploadOutcome::AlreadyPresent,
        });
    }

    let file = tokio::fs::File::open(path).await?;
    let file_len = file.metadata().await?.len();

    info!("Uploading {name} from {} ({file_len} bytes)", path.display());

    // The body stream must be 'static, so it reports sent sizes over a
    // channel and this task turns them into progress events.
    let (tx, mut rx) = mpsc::unbounded_channel::<u64>();
    let file_stream = ReaderStream::with_capacity(file, UPLOAD_CHUNK).inspect_ok(move |chunk| {
        let _ = tx.send(chunk.len() as u64);
    });
    let file_part = Part::stream_with_length(Body::wrap_stream(file_stream), file_len)
        .file_name("upload")
        .mime_str("application/octet-stream")?;
    let form = Form::new()
        .text("checksum", checksum.to_string())
        .part("file", file_part);

    let mut task = TransferTask::new(path.display().to_string(), Some(file_len));
    let label = format!("Uploading {name}...");
    let report = |sent: u64, task: &mut TransferTask| {
        task.advance(sent);
        if let Some(fraction) = task.fraction() {
            progress.report(fraction, &label);
        }
    };

    let send = remote.send_upload(form);
    tokio::pin!(send);

    let result = loop {
        tokio::select! {
            res = &mut send => break res,
            Some(sent) = rx.recv() => report(sent, &mut task),
        }
    };
    while let Ok(sent) = rx.try_recv() {
        report(sent, &mut task);
    }
    result?;

    Ok(UploadReport {
        checksum,
        outcome: UploadOutcome::Uploaded { bytes: file_len },
    })
}
