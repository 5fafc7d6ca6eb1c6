use std::io;
use std::path::Path;

use futures_util::StreamExt;
use md5::Context;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio_util::io::ReaderStream;
use tokio_util::sync::CancellationToken;
use url::Url;

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("upload rejected with status {0}")]
    Status(StatusCode),
    #[error("upload cancelled")]
    Cancelled,
}

#[derive(Clone)]
pub struct TransferClient {
    http: Client,
}

impl TransferClient {
    pub fn new() -> Self {
        Self {
            http: Client::new(),
        }
    }

    pub fn with_http(http: Client) -> Self {
        Self { http }
    }

    pub async fn content_md5(&self, source: &Path) -> Result<String, TransferError> {
        let mut file = tokio::fs::File::open(source).await?;
        let mut ctx = Context::new();
        let mut buf = vec![0u8; 64 * 1024];
        loop {
            let read = file.read(&mut buf).await?;
            if read == 0 {
                break;
            }
            ctx.consume(&buf[..read]);
        }
        Ok(format!("{:x}", ctx.compute()))
    }

    pub async fn upload_from_path<F>(
        &self,
        href: &Url,
        source: &Path,
        content_type: &str,
        on_progress: F,
        cancel: CancellationToken,
    ) -> Result<(), TransferError>
    where
        F: Fn(u64) + Send + Sync + 'static,
    {
        let total = tokio::fs::metadata(source).await?.len();
        let file = tokio::fs::File::open(source).await?;
        let mut sent: u64 = 0;
        let stream = ReaderStream::new(file).inspect(move |chunk| {
            if let Ok(chunk) = chunk {
                sent += chunk.len() as u64;
                on_progress(sent);
            }
        });

        let send = self
            .http
            .put(href.clone())
            .header(CONTENT_TYPE, content_type)
            .header(CONTENT_LENGTH, total)
            .body(reqwest::Body::wrap_stream(stream))
            .send();

        // Cancelling drops the in-flight request; the server-side write may still land.
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(TransferError::Cancelled),
            result = send => result?,
        };

        if !response.status().is_success() {
            return Err(TransferError::Status(response.status()));
        }
        Ok(())
    }
}

impl Default for TransferClient {
    fn default() -> Self {
        Self::new()
    }
}
