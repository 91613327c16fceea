use crate::service::models::{TransferRequest, VideoInfo};
use crate::utils::error::MediagrabError;
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;

/// Incremental response body, one item per received chunk
pub type ByteStream = BoxStream<'static, std::io::Result<Bytes>>;

/// Raw answer of the download endpoint, before the orchestrator interprets it
pub struct DownloadResponse {
    /// HTTP status code
    pub status: u16,
    /// Declared size header, verbatim. Parsing is left to the caller so an
    /// unparsable value can be treated as "unknown".
    pub declared_size: Option<String>,
    /// Incremental body reader, `None` when the transport cannot provide one
    pub body: Option<ByteStream>,
}

impl DownloadResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

impl std::fmt::Debug for DownloadResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadResponse")
            .field("status", &self.status)
            .field("declared_size", &self.declared_size)
            .field("body", &self.body.as_ref().map(|_| "<stream>"))
            .finish()
    }
}

/// Client-side contract of the conversion service
///
/// This trait isolates the orchestrator from the transport, so transfers can
/// be driven by the HTTP client or by an in-memory source.
#[async_trait]
pub trait MediaService: Send + Sync {
    /// Returns a unique identifier for this service (e.g., "http")
    fn id(&self) -> &'static str;

    /// Fetches video metadata for a source URL
    async fn fetch_info(&self, url: &str) -> Result<VideoInfo, MediagrabError>;

    /// Issues a download request. Must resolve as soon as the response
    /// headers are available; the body is consumed later through
    /// [`DownloadResponse::body`].
    async fn open_download(
        &self,
        request: &TransferRequest,
    ) -> Result<DownloadResponse, MediagrabError>;
}
