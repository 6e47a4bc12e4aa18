use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::model::{PageRequest, PostDto};
use crate::API_BASE_URL;

/// Transport-facing error taxonomy. Display strings are user-facing.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NetworkError {
    /// Non-2xx status or a malformed response envelope.
    #[error("Invalid response from the server")]
    InvalidResponse,

    /// Payload did not match the expected schema.
    #[error("The data received from the server could not be decoded")]
    InvalidDecode,

    /// Transport-level failure: timeout, DNS, connection reset.
    #[error("Unable to complete request")]
    UnableToComplete,

    /// Empty or unreadable body, or a malformed caller-supplied URL.
    #[error("Invalid data received from the server")]
    InvalidData,
}

/// Read capability over the remote feed API. No retries live at this
/// layer; retry policy belongs to the caller.
#[async_trait]
pub trait RemoteSource: Send + Sync {
    async fn fetch_posts(&self, request: PageRequest) -> Result<Vec<PostDto>, NetworkError>;
    async fn fetch_image(&self, url: &str) -> Result<Bytes, NetworkError>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApiConfig {
    pub base_url: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: API_BASE_URL.to_string(),
        }
    }
}

/// HTTP implementation of [`RemoteSource`] against the JSON placeholder
/// API: `GET <base>/posts?_page=<n>&_limit=<n>` plus plain byte fetches
/// for avatar images. Timeouts are whatever the transport enforces.
pub struct JsonPlaceholderClient {
    client: reqwest::Client,
    base_url: Url,
}

impl JsonPlaceholderClient {
    pub fn new(config: ApiConfig) -> Result<Self, NetworkError> {
        let base_url = Url::parse(&config.base_url).map_err(|_| NetworkError::InvalidData)?;
        Ok(Self {
            client: reqwest::Client::new(),
            base_url,
        })
    }

    fn posts_url(&self, request: PageRequest) -> Result<Url, NetworkError> {
        let mut url = self
            .base_url
            .join("/posts")
            .map_err(|_| NetworkError::InvalidData)?;
        url.query_pairs_mut()
            .append_pair("_page", &request.page().to_string())
            .append_pair("_limit", &request.limit().to_string());
        Ok(url)
    }

    async fn get_bytes(&self, url: Url) -> Result<Bytes, NetworkError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(map_transport_error)?;

        if !response.status().is_success() {
            debug!(status = %response.status(), "remote returned non-success status");
            return Err(NetworkError::InvalidResponse);
        }

        response
            .bytes()
            .await
            .map_err(|_| NetworkError::InvalidData)
    }
}

#[async_trait]
impl RemoteSource for JsonPlaceholderClient {
    async fn fetch_posts(&self, request: PageRequest) -> Result<Vec<PostDto>, NetworkError> {
        let url = self.posts_url(request)?;
        let body = self.get_bytes(url).await?;
        decode_posts(&body)
    }

    async fn fetch_image(&self, url: &str) -> Result<Bytes, NetworkError> {
        let url = Url::parse(url).map_err(|_| NetworkError::InvalidData)?;
        let body = self.get_bytes(url).await?;
        if body.is_empty() {
            return Err(NetworkError::InvalidData);
        }
        Ok(body)
    }
}

/// Pure payload decode, kept separate from I/O so it can be tested alone.
fn decode_posts(body: &[u8]) -> Result<Vec<PostDto>, NetworkError> {
    if body.is_empty() {
        return Err(NetworkError::InvalidData);
    }
    serde_json::from_slice(body).map_err(|_| NetworkError::InvalidDecode)
}

fn map_transport_error(error: reqwest::Error) -> NetworkError {
    debug!(error = %error, "transport failure");
    NetworkError::UnableToComplete
}
