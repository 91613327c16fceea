//! reqwest-backed client for the conversion service
//!
//! Talks to two endpoints under the configured base address:
//! - `POST /api/info` with `{"url"}` returning [`VideoInfo`]
//! - `POST /api/download` with `{"url","format","quality"}` returning the media bytes

use crate::service::models::{DownloadBody, TransferRequest, VideoInfo};
use crate::service::traits::{DownloadResponse, MediaService};
use crate::utils::error::MediagrabError;
use async_trait::async_trait;
use futures::TryStreamExt;
use reqwest::header::CONTENT_LENGTH;
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, error};

/// Message surfaced for any metadata failure
pub const METADATA_ERROR: &str = "Could not fetch video details. Please check the URL.";

#[derive(Serialize)]
struct InfoBody<'a> {
    url: &'a str,
}

/// HTTP implementation of [`MediaService`]
#[derive(Debug, Clone)]
pub struct HttpMediaService {
    client: Client,
    base_url: String,
}

impl HttpMediaService {
    /// Create a client for the service at `base_url`.
    ///
    /// No overall request timeout is set: a download may legitimately stream
    /// for a long time, and stalls are handled by the orchestrator.
    pub fn new(base_url: &str) -> Result<Self, MediagrabError> {
        let client = Client::builder()
            .user_agent(concat!("mediagrab/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl MediaService for HttpMediaService {
    fn id(&self) -> &'static str {
        "http"
    }

    async fn fetch_info(&self, url: &str) -> Result<VideoInfo, MediagrabError> {
        debug!("Fetching video info for URL: {}", url);

        let response = self
            .client
            .post(self.endpoint("/api/info"))
            .json(&InfoBody { url })
            .send()
            .await
            .map_err(|e| {
                error!("Metadata request failed: {}", e);
                MediagrabError::MetadataUnavailable(METADATA_ERROR.to_string())
            })?;

        if !response.status().is_success() {
            error!("Metadata endpoint returned {}", response.status());
            return Err(MediagrabError::MetadataUnavailable(METADATA_ERROR.to_string()));
        }

        response.json::<VideoInfo>().await.map_err(|e| {
            error!("Failed to parse video info: {}", e);
            MediagrabError::MetadataUnavailable(METADATA_ERROR.to_string())
        })
    }

    async fn open_download(
        &self,
        request: &TransferRequest,
    ) -> Result<DownloadResponse, MediagrabError> {
        debug!(
            "Requesting {} ({}) for URL: {}",
            request.format(),
            request.quality().token(),
            request.url()
        );

        let response = self
            .client
            .post(self.endpoint("/api/download"))
            .json(&DownloadBody::from(request))
            .send()
            .await?;

        let status = response.status().as_u16();
        let declared_size = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body = response.bytes_stream().map_err(std::io::Error::other);

        Ok(DownloadResponse {
            status,
            declared_size,
            body: Some(Box::pin(body)),
        })
    }
}
