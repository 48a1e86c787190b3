//! Client for the mod repository's transfer endpoints.
//!
//! Only the calls the transfer pipeline relies on live here: the upload
//! dedup check, the upload itself, and release creation. Authentication is
//! handled elsewhere; a token, if configured, is attached to every request.

use std::io;

use modkit_schema::{CheckResponse, ReleaseResponse, Sha256Digest};
use reqwest::multipart::Form;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error};

use crate::io::download::TransferError;

/// Header carrying the session token.
pub const TOKEN_HEADER: &str = "X-KN-TOKEN";

#[derive(Error, Debug)]
pub enum RemoteError {
    /// The server did not acknowledge success and gave no actionable reason.
    #[error("Request failed: {}", .0.as_deref().unwrap_or("no reason given"))]
    RequestFailed(Option<String>),

    /// The server refused the request for lack of authorization.
    #[error("Access denied")]
    AccessDenied,

    #[error(transparent)]
    Transfer(#[from] TransferError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transfer(TransferError::Http(err))
    }
}

/// Thin wrapper around the repository API.
#[derive(Debug, Clone)]
pub struct RemoteClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl RemoteClient {
    /// Talk to the API rooted at `base_url` (`https://host/api/1/`).
    pub fn new(client: Client, base_url: impl Into<String>, token: Option<String>) -> Self {
        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        Self {
            client,
            base_url,
            token,
        }
    }

    /// The underlying HTTP client, shared with downloads.
    pub fn http(&self) -> &Client {
        &self.client
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{path}", self.base_url);
        let mut builder = self
            .client
            .request(method, url)
            .header(reqwest::header::USER_AGENT, crate::USER_AGENT);
        if let Some(token) = &self.token {
            builder = builder.header(TOKEN_HEADER, token);
        }
        builder
    }

    /// Send and require a 200 response.
    async fn send_checked(&self, builder: RequestBuilder, path: &str) -> Result<Response, RemoteError> {
        let response = builder.send().await.map_err(|e| {
            error!("Failed to send request to {path}: {e}");
            RemoteError::from(e)
        })?;

        match response.status() {
            StatusCode::OK => Ok(response),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(RemoteError::AccessDenied),
            status => {
                debug!("{path} returned {status}");
                Err(RemoteError::RequestFailed(None))
            }
        }
    }

    /// Ask whether the server already stores content with `checksum`.
    ///
    /// # Errors
    ///
    /// Fails on transport errors and non-200 responses.
    pub async fn check_upload(&self, checksum: &Sha256Digest) -> Result<bool, RemoteError> {
        let builder = self
            .request(Method::POST, "upload/check")
            .form(&[("checksum", checksum.as_str())]);
        let response = self.send_checked(builder, "upload/check").await?;
        let data: CheckResponse = response.json().await?;
        Ok(data.result)
    }

    /// POST a multipart form to `upload/file`.
    ///
    /// # Errors
    ///
    /// Fails on transport errors and non-200 responses.
    pub async fn send_upload(&self, form: Form) -> Result<(), RemoteError> {
        let builder = self.request(Method::POST, "upload/file").multipart(form);
        self.send_checked(builder, "upload/file").await?;
        Ok(())
    }

    /// Publish a release described by `release`.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::AccessDenied`] when the server answers
    /// `{"result": false, "reason": "unauthorized"}` and
    /// [`RemoteError::RequestFailed`] for any other failure, including an
    /// empty response.
    pub async fn create_release<T: Serialize + ?Sized>(&self, release: &T) -> Result<(), RemoteError> {
        let builder = self.request(Method::POST, "mod/release").json(release);
        let response = self.send_checked(builder, "mod/release").await?;
        let text = response.text().await?;

        let data: Option<ReleaseResponse> = if text.trim().is_empty() {
            None
        } else {
            serde_json::from_str(&text)
                .map_err(|e| RemoteError::RequestFailed(Some(format!("invalid response: {e}"))))?
        };

        match data {
            None => Err(RemoteError::RequestFailed(None)),
            Some(data) if data.result => Ok(()),
            Some(data) if data.is_unauthorized() => Err(RemoteError::AccessDenied),
            Some(data) => Err(RemoteError::RequestFailed(data.reason)),
        }
    }
}
