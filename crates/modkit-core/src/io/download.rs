//! Streaming download module with progress reporting.
//!
//! Bytes are appended to a caller-supplied destination at its current
//! position, in fixed 50 KiB chunks, with one progress event per chunk.
//! There is no resume and no retry here; callers decide what to do with a
//! failed transfer. Bytes already written are not rolled back.

use std::io;

use futures::TryStreamExt;
use modkit_schema::TransferTask;
use reqwest::{Client, Response, StatusCode};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeek, AsyncSeekExt, AsyncWrite, AsyncWriteExt};
use tokio_util::io::StreamReader;
use tracing::{debug, error, info, warn};

use crate::ProgressSink;

/// Read size for streaming downloads.
pub const CHUNK_SIZE: usize = 50 * 1024;

#[derive(Error, Debug)]
pub enum TransferError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Unexpected status {status} from {url}")]
    Status { status: u16, url: String },
}

/// GET `url` and hand back the response only if the server answered 200.
pub async fn fetch(client: &Client, url: &str) -> Option<Response> {
    info!("Retrieving \"{url}\"...");
    match client
        .get(url)
        .header(reqwest::header::USER_AGENT, crate::USER_AGENT)
        .send()
        .await
    {
        Ok(resp) if resp.status() == StatusCode::OK => Some(resp),
        Ok(resp) => {
            warn!("Request for \"{url}\" returned {}", resp.status());
            None
        }
        Err(e) => {
            error!("Failed to load \"{url}\": {e}");
            None
        }
    }
}

/// Stream `url` into `dest`, starting at the destination's current position.
///
/// Progress fractions are relative to the bytes this call writes, so they
/// reach exactly 1.0 when the announced `Content-Length` has arrived, even
/// when appending to a non-empty destination. Without a length header no
/// progress is reported.
///
/// # Errors
///
/// Returns [`TransferError::Status`] for anything but 200 and
/// [`TransferError::Http`] / [`TransferError::Io`] for faults mid-stream.
pub async fn download<W, S>(
    client: &Client,
    url: &str,
    dest: &mut W,
    progress: &S,
) -> Result<TransferTask, TransferError>
where
    W: AsyncWrite + AsyncSeek + Unpin,
    S: ProgressSink + ?Sized,
{
    info!("Downloading \"{url}\"...");
    let result = stream_into(client, url, dest, progress).await;
    if let Err(e) = &result {
        error!("Failed to load \"{url}\": {e}");
    }
    result
}

async fn stream_into<W, S>(
    client: &Client,
    url: &str,
    dest: &mut W,
    progress: &S,
) -> Result<TransferTask, TransferError>
where
    W: AsyncWrite + AsyncSeek + Unpin,
    S: ProgressSink + ?Sized,
{
    let response = client
        .get(url)
        .header(reqwest::header::USER_AGENT, crate::USER_AGENT)
        .send()
        .await?;

    if response.status() != StatusCode::OK {
        return Err(TransferError::Status {
            status: response.status().as_u16(),
            url: url.to_string(),
        });
    }

    let mut task = TransferTask::new(url, response.content_length());
    if task.expected_size.is_none() {
        debug!("No Content-Length for \"{url}\", progress unavailable");
    }

    let start = dest.stream_position().await?;
    let mut reader = StreamReader::new(response.bytes_stream().map_err(io::Error::other));
    let mut buf = vec![0u8; CHUNK_SIZE];

    loop {
        let n = read_chunk(&mut reader, &mut buf).await?;
        if n == 0 {
            break;
        }

        dest.write_all(&buf[..n]).await?;
        let written = dest.stream_position().await?.saturating_sub(start);
        task.advance(written.saturating_sub(task.transferred));

        if let (Some(fraction), Some(percent)) = (task.fraction(), task.percent()) {
            progress.report(fraction, &format!("{}: {percent}%", task.base_name()));
        }
    }

    dest.flush().await?;
    Ok(task)
}

/// Fill `buf` unless the stream ends first. Returns the bytes read.
async fn read_chunk<R: AsyncRead + Unpin>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporter::testing::RecordingProgress;
    use mockito::Server;
    use std::io::{Cursor, Write as _};

    fn body(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    #[tokio::test]
    async fn test_download_reports_monotonic_progress() {
        let mut server = Server::new_async().await;
        let payload = body(2 * CHUNK_SIZE + 20 * 1024);
        let _m = server
            .mock("GET", "/mods/pkg.7z")
            .with_status(200)
            .with_body(&payload)
            .create_async()
            .await;

        let client = Client::new();
        let progress = RecordingProgress::default();
        let mut dest = Cursor::new(Vec::new());
        let url = format!("{}/mods/pkg.7z", server.url());

        let task = download(&client, &url, &mut dest, &progress).await.unwrap();

        assert_eq!(dest.into_inner(), payload);
        assert_eq!(task.transferred, payload.len() as u64);
        assert_eq!(task.expected_size, Some(payload.len() as u64));

        let fractions = progress.fractions();
        assert_eq!(fractions.len(), 3);
        assert!(fractions.windows(2).all(|w| w[0] <= w[1]));
        assert!(fractions.iter().all(|&f| f <= 1.0));
        assert_eq!(*fractions.last().unwrap(), 1.0);
        assert_eq!(progress.events().last().unwrap().label, "pkg.7z: 100%");
    }

    #[tokio::test]
    async fn test_download_appends_at_current_position() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/part.bin")
            .with_status(200)
            .with_body("tail")
            .create_async()
            .await;

        let client = Client::new();
        let progress = RecordingProgress::default();
        let mut dest = Cursor::new(b"head-".to_vec());
        dest.set_position(5);

        download(&client, &format!("{}/part.bin", server.url()), &mut dest, &progress)
            .await
            .unwrap();

        assert_eq!(dest.into_inner(), b"head-tail");
        assert_eq!(progress.fractions(), vec![1.0]);
    }

    #[tokio::test]
    async fn test_download_rejects_non_ok_status() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/missing.zip")
            .with_status(404)
            .create_async()
            .await;

        let client = Client::new();
        let mut dest = Cursor::new(Vec::new());
        let err = download(
            &client,
            &format!("{}/missing.zip", server.url()),
            &mut dest,
            &crate::NullProgress,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, TransferError::Status { status: 404, .. }));
        assert!(dest.into_inner().is_empty());
    }

    #[tokio::test]
    async fn test_download_without_length_reports_nothing() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/stream.bin")
            .with_status(200)
            .with_chunked_body(|w| w.write_all(b"streamed bytes"))
            .create_async()
            .await;

        let client = Client::new();
        let progress = RecordingProgress::default();
        let mut dest = Cursor::new(Vec::new());

        let task = download(
            &client,
            &format!("{}/stream.bin", server.url()),
            &mut dest,
            &progress,
        )
        .await
        .unwrap();

        assert_eq!(dest.into_inner(), b"streamed bytes");
        assert_eq!(task.expected_size, None);
        assert!(progress.events().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_only_returns_ok_responses() {
        let mut server = Server::new_async().await;
        let _ok = server
            .mock("GET", "/repo.json")
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;
        let _err = server
            .mock("GET", "/broken.json")
            .with_status(500)
            .create_async()
            .await;

        let client = Client::new();
        let resp = fetch(&client, &format!("{}/repo.json", server.url())).await;
        assert_eq!(resp.unwrap().text().await.unwrap(), "{}");
        assert!(fetch(&client, &format!("{}/broken.json", server.url())).await.is_none());
    }
}
