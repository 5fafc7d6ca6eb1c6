use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

const DEFAULT_BASE_URL: &str = "https://api.stowage.io";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
    #[error("api returned {status}: {body}")]
    Api { status: StatusCode, body: String },
}

#[derive(Clone)]
pub struct StorageClient {
    http: Client,
    base_url: Url,
    token: String,
}

impl StorageClient {
    pub fn new(token: impl Into<String>) -> Result<Self, StorageError> {
        Self::with_base_url(DEFAULT_BASE_URL, token)
    }

    pub fn with_base_url(base_url: &str, token: impl Into<String>) -> Result<Self, StorageError> {
        Ok(Self {
            http: Client::new(),
            base_url: Url::parse(base_url)?,
            token: token.into(),
        })
    }

    pub async fn resolve_destination(
        &self,
        path: &str,
    ) -> Result<Option<Destination>, StorageError> {
        let mut url = self.endpoint("/v1/storage/destinations")?;
        url.query_pairs_mut().append_pair("path", path);
        let response = self
            .http
            .get(url)
            .header("Authorization", self.auth_header_value())
            .send()
            .await?;
        // 404 means uploads into this destination are not allowed.
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(Some(Self::handle_response(response).await?))
    }

    pub async fn create_upload_url(
        &self,
        request: &UploadRequest,
    ) -> Result<UploadTicket, StorageError> {
        let url = self.endpoint("/v1/storage/uploads")?;
        let response = self
            .http
            .post(url)
            .header("Authorization", self.auth_header_value())
            .json(request)
            .send()
            .await?;
        Self::handle_response(response).await
    }

    fn auth_header_value(&self) -> String {
        format!("Bearer {}", self.token)
    }

    fn endpoint(&self, path: &str) -> Result<Url, StorageError> {
        Ok(self.base_url.join(path)?)
    }

    async fn handle_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, StorageError> {
        if response.status().is_success() {
            Ok(response.json::<T>().await?)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(StorageError::Api { status, body })
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Destination {
    pub id: String,
    pub root: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UploadRequest {
    pub destination: String,
    pub path: String,
    pub content_type: String,
    pub size: u64,
    pub content_md5: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct UploadTicket {
    pub href: Url,
    pub method: String,
    #[serde(default)]
    pub expires_at: Option<String>,
}
