//! Subtitle server HTTP client

use std::time::Duration;

use reqwest::{Client, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use super::types::*;
use crate::config::ApiConfig;

/// Upper bound the server accepts for the recent-progress listing
pub const MAX_RECENT_LIMIT: u32 = 50;

/// Default size of the recent-progress listing
pub const DEFAULT_RECENT_LIMIT: u32 = 10;

/// Errors that can occur when talking to the subtitle server
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Server is not reachable: {0}")]
    Unreachable(String),

    #[error("Not authorized")]
    Unauthorized,

    #[error("Unexpected response (HTTP {status}): {body}")]
    Status { status: u16, body: String },

    #[error("Malformed response (HTTP {status}): {message}")]
    Decode { status: u16, message: String },

    #[error("Invalid server URL: {0}")]
    InvalidUrl(String),
}

impl ApiError {
    /// Whether the failure means the server could not be reached at all
    pub fn is_unreachable(&self) -> bool {
        match self {
            ApiError::Unreachable(_) => true,
            ApiError::Http(e) => e.is_connect() || e.is_timeout(),
            _ => false,
        }
    }

    fn from_transport(e: reqwest::Error) -> Self {
        if e.is_connect() {
            ApiError::Unreachable(format!("Connection refused ({})", e))
        } else if e.is_timeout() {
            ApiError::Unreachable("Connection timed out".to_string())
        } else {
            ApiError::Http(e)
        }
    }
}

/// Client for the subtitle server's REST API
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    api_token: Option<String>,
}

impl ApiClient {
    /// Create a client from the API section of the engine config
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let base_url = config.base_url.trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(ApiError::InvalidUrl("URL cannot be empty".into()));
        }
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ApiError::InvalidUrl(format!(
                "{} must start with http:// or https://",
                base_url
            )));
        }

        let http = Client::builder()
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .pool_max_idle_per_host(2)
            .pool_idle_timeout(Duration::from_secs(30))
            .user_agent(format!("sublink/{}", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url,
            api_token: config.token.clone(),
        })
    }

    /// Set the bearer token sent with every request
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(token.into());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build a request with optional authentication
    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let mut req = self.http.request(method, &url);

        if let Some(token) = &self.api_token {
            req = req.bearer_auth(token);
        }

        req
    }

    async fn send(&self, req: reqwest::RequestBuilder) -> Result<Response, ApiError> {
        req.send().await.map_err(|e| {
            warn!("Connection error: {:?}", e);
            ApiError::from_transport(e)
        })
    }

    /// Turn a non-success response into a typed error, keeping the body
    async fn check_status(resp: Response) -> Result<Response, ApiError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ApiError::Unauthorized);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(ApiError::Status {
            status: status.as_u16(),
            body,
        })
    }

    async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T, ApiError> {
        let status = resp.status().as_u16();
        let bytes = resp.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| ApiError::Decode {
            status,
            message: e.to_string(),
        })
    }

    /// Check the server health endpoint
    #[instrument(skip(self), fields(base_url = %self.base_url))]
    pub async fn health(&self) -> Result<(), ApiError> {
        let resp = self.send(self.request(Method::GET, "/health")).await?;
        debug!("Health status: {}", resp.status());
        Self::check_status(resp).await?;
        Ok(())
    }

    /// Fetch a window of aligned subtitle pairs
    #[instrument(skip(self), fields(base_url = %self.base_url))]
    pub async fn fetch_alignments(
        &self,
        content_id: &ContentId,
        start_index: u64,
        limit: u32,
    ) -> Result<AlignmentPageResponse, ApiError> {
        let path = format!("/api/subtitles/{}", content_id);
        let req = self
            .request(Method::GET, &path)
            .query(&[("start_index", start_index), ("limit", u64::from(limit))]);

        let resp = Self::check_status(self.send(req).await?).await?;
        let page: AlignmentPageResponse = Self::decode(resp).await?;

        debug!(
            "Fetched {} alignments (total {})",
            page.alignments.len(),
            page.pagination.total_alignments
        );
        Ok(page)
    }

    /// Get the progress record, `None` when the server has none yet
    #[instrument(skip(self), fields(base_url = %self.base_url))]
    pub async fn get_progress(
        &self,
        content_id: &ContentId,
    ) -> Result<Option<ProgressRecord>, ApiError> {
        let path = format!("/api/progress/{}", content_id);
        let resp = self.send(self.request(Method::GET, &path)).await?;

        // No record yet is a normal state for new content
        if resp.status() == StatusCode::NOT_FOUND {
            debug!("No progress record yet");
            return Ok(None);
        }

        let resp = Self::check_status(resp).await?;
        let body: ProgressResponse = Self::decode(resp).await?;
        Ok(Some(body.progress))
    }

    /// Write the current position
    #[instrument(skip(self, update), fields(base_url = %self.base_url, index = update.current_alignment_index))]
    pub async fn put_progress(
        &self,
        content_id: &ContentId,
        update: &ProgressUpdate,
    ) -> Result<ProgressRecord, ApiError> {
        let path = format!("/api/progress/{}", content_id);
        let req = self
            .request(Method::PUT, &path)
            .json(&UpdateProgressRequest::from(update));

        let resp = Self::check_status(self.send(req).await?).await?;
        let body: ProgressResponse = Self::decode(resp).await?;
        Ok(body.progress)
    }

    /// List recently studied content, most recent first
    ///
    /// `limit` is capped at 50; `None` or zero uses the server default of 10.
    pub async fn recent_progress(&self, limit: Option<u32>) -> Result<Vec<ProgressRecord>, ApiError> {
        let limit = match limit {
            Some(n) if n > 0 => n.min(MAX_RECENT_LIMIT),
            _ => DEFAULT_RECENT_LIMIT,
        };
        let req = self
            .request(Method::GET, "/api/progress/recent")
            .query(&[("limit", limit)]);

        let resp = Self::check_status(self.send(req).await?).await?;
        let body: RecentProgressResponse = Self::decode(resp).await?;
        Ok(body.recent_progress)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(url: &str) -> ApiConfig {
        ApiConfig {
            base_url: url.to_string(),
            ..ApiConfig::default()
        }
    }

    #[test]
    fn test_client_creation() {
        let client = ApiClient::new(&config("http://localhost:5000/")).unwrap();
        assert_eq!(client.base_url(), "http://localhost:5000");

        let client_with_token = client.with_token("test-token");
        assert_eq!(client_with_token.api_token, Some("test-token".to_string()));
    }

    #[test]
    fn test_rejects_bad_urls() {
        assert!(matches!(ApiClient::new(&config("")), Err(ApiError::InvalidUrl(_))));
        assert!(matches!(
            ApiClient::new(&config("ftp://example.com")),
            Err(ApiError::InvalidUrl(_))
        ));
    }
}
