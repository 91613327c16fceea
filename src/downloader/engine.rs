//! Streamed download orchestration
//!
//! [`DownloadEngine`] drives one transfer at a time: it issues the request,
//! interprets the response, hands the body to the [`ByteAccumulator`], and
//! materializes the [`Artifact`]. Live state is published on a watch channel
//! so any number of observers can poll or await changes.

use crate::downloader::accumulator::{ByteAccumulator, DrainOutcome};
use crate::downloader::artifact::{Artifact, ArtifactSink};
use crate::downloader::cancel::CancelHandle;
use crate::downloader::progress::{ProgressSnapshot, TransferState};
use crate::service::models::{TransferRequest, VideoInfo};
use crate::service::traits::{ByteStream, MediaService};
use crate::utils::error::MediagrabError;
use futures::StreamExt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Reason reported when a rejected request carries no usable detail
pub const GENERIC_REJECTION: &str = "Download failed";

/// Error bodies larger than this are not worth parsing
const MAX_ERROR_BODY: usize = 64 * 1024;

/// Download configuration
#[derive(Debug, Clone, Default)]
pub struct DownloadConfig {
    /// Fail the transfer when no chunk arrives for this long (default: wait forever)
    pub stall_timeout: Option<Duration>,
}

/// How a transfer ended when it did not fail
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    Completed {
        artifact: Artifact,
        /// Where the sink stored it
        path: PathBuf,
    },
    /// Stopped by the user; not an error
    Cancelled,
}

/// Single-flight download orchestrator
pub struct DownloadEngine {
    service: Arc<dyn MediaService>,
    sink: Arc<dyn ArtifactSink>,
    config: DownloadConfig,
    canceller: CancelHandle,
    state: watch::Sender<TransferState>,
}

impl DownloadEngine {
    pub fn new(
        service: Arc<dyn MediaService>,
        sink: Arc<dyn ArtifactSink>,
        config: DownloadConfig,
    ) -> Self {
        let (state, _) = watch::channel(TransferState::default());
        Self {
            service,
            sink,
            config,
            canceller: CancelHandle::new(),
            state,
        }
    }

    /// Handle for stopping the active transfer from elsewhere
    pub fn cancel_handle(&self) -> CancelHandle {
        self.canceller.clone()
    }

    /// Stop the active transfer. No-op when nothing is running.
    pub fn cancel(&self) -> bool {
        self.canceller.cancel()
    }

    /// Receive every state change
    pub fn subscribe(&self) -> watch::Receiver<TransferState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> TransferState {
        self.state.borrow().clone()
    }

    /// Current percentage, ETA and byte counts
    pub fn snapshot(&self) -> ProgressSnapshot {
        self.state.borrow().snapshot(Instant::now())
    }

    /// Message of the last failed transfer, cleared when a new one starts
    pub fn last_error(&self) -> Option<String> {
        self.state.borrow().error.clone()
    }

    /// Return a finished transfer to `Idle`, clearing its error.
    ///
    /// The terminal phase stays observable until this is called or the next
    /// transfer begins. Returns `false` while a transfer is active.
    pub fn dismiss(&self) -> bool {
        let mut dismissed = false;
        self.state.send_if_modified(|s| {
            dismissed = s.reset();
            dismissed
        });
        dismissed
    }

    /// Fetch metadata. Failures here never touch the transfer state.
    pub async fn fetch_info(&self, url: &str) -> Result<VideoInfo, MediagrabError> {
        let info = self.service.fetch_info(url).await;
        if let Err(e) = &info {
            warn!("Metadata unavailable via {}: {}", self.service.id(), e);
        }
        info
    }

    /// Run one transfer to completion, cancellation, or failure.
    ///
    /// `title` names the artifact; `None` falls back to a generic name.
    /// Refuses to start while another transfer is active.
    pub async fn start_transfer(
        &self,
        request: &TransferRequest,
        title: Option<&str>,
    ) -> Result<TransferOutcome, MediagrabError> {
        let token = self.canceller.arm()?;
        let _guard = ActiveTransfer { engine: self };

        self.state.send_modify(TransferState::begin);
        info!(
            "Starting {} transfer ({}) for {}",
            request.format(),
            request.quality().label(),
            request.url()
        );

        match self.run(request, title, &token).await {
            Ok(Some((artifact, path))) => {
                info!("Transfer completed: {:?} ({} bytes)", path, artifact.len());
                self.state.send_modify(TransferState::complete);
                Ok(TransferOutcome::Completed { artifact, path })
            }
            Ok(None) => {
                info!("Transfer cancelled by user");
                self.state.send_modify(TransferState::cancel);
                Ok(TransferOutcome::Cancelled)
            }
            Err(e) => {
                error!("Transfer failed: {}", e);
                self.state.send_modify(|s| s.fail(e.to_string()));
                Err(e)
            }
        }
    }

    /// `Ok(None)` means the token fired.
    async fn run(
        &self,
        request: &TransferRequest,
        title: Option<&str>,
        token: &CancellationToken,
    ) -> Result<Option<(Artifact, PathBuf)>, MediagrabError> {
        let response = tokio::select! {
            biased;
            _ = token.cancelled() => return Ok(None),
            response = self.service.open_download(request) => {
                response.map_err(MediagrabError::into_transfer)?
            }
        };

        if !response.is_success() {
            let reason = tokio::select! {
                biased;
                _ = token.cancelled() => return Ok(None),
                reason = rejection_reason(response.body) => reason,
            };
            warn!("Download rejected with status {}: {}", response.status, reason);
            return Err(MediagrabError::RequestRejected {
                status: response.status,
                reason,
            });
        }

        let body = response.body.ok_or(MediagrabError::StreamUnsupported)?;
        let total = parse_declared_size(response.declared_size.as_deref());
        debug!("Server finished processing, streaming {} declared bytes", total);
        self.state.send_modify(|s| s.start_streaming(total));

        let mut accumulator = ByteAccumulator::new();
        let outcome = accumulator
            .drain(body, token, self.config.stall_timeout, |received| {
                self.state
                    .send_modify(|s| s.record_bytes(received, Instant::now()));
            })
            .await?;

        if outcome == DrainOutcome::Cancelled {
            debug!(
                "Discarding {} bytes from cancelled transfer",
                accumulator.bytes_received()
            );
            return Ok(None);
        }

        if total > 0 && accumulator.bytes_received() != total {
            warn!(
                "Received {} bytes but {} were declared",
                accumulator.bytes_received(),
                total
            );
        }

        let artifact = Artifact::new(accumulator.into_payload(), title, request.format());
        let path = tokio::select! {
            biased;
            _ = token.cancelled() => {
                debug!("Cancelled while saving {}", artifact.filename);
                return Ok(None);
            }
            saved = self.sink.save(&artifact) => saved.map_err(MediagrabError::into_transfer)?,
        };

        Ok(Some((artifact, path)))
    }
}

/// Releases the cancellation token on every exit path, including the caller
/// dropping the transfer future mid-flight.
struct ActiveTransfer<'a> {
    engine: &'a DownloadEngine,
}

impl Drop for ActiveTransfer<'_> {
    fn drop(&mut self) {
        self.engine.state.send_if_modified(|s| {
            if s.phase.is_active() {
                s.cancel();
                true
            } else {
                false
            }
        });
        self.engine.canceller.release();
    }
}

/// Declared size header value; absent or unparsable means unknown (0).
pub fn parse_declared_size(raw: Option<&str>) -> u64 {
    raw.and_then(|v| v.trim().parse::<u64>().ok()).unwrap_or(0)
}

/// The `detail` string of a JSON error body, or the generic reason.
pub fn parse_rejection_reason(raw: &[u8]) -> String {
    serde_json::from_slice::<serde_json::Value>(raw)
        .ok()
        .and_then(|body| {
            body.get("detail")
                .and_then(|detail| detail.as_str())
                .map(str::trim)
                .filter(|detail| !detail.is_empty())
                .map(str::to_string)
        })
        .unwrap_or_else(|| GENERIC_REJECTION.to_string())
}

async fn rejection_reason(body: Option<ByteStream>) -> String {
    let Some(mut body) = body else {
        return GENERIC_REJECTION.to_string();
    };

    let mut raw = Vec::new();
    while let Some(chunk) = body.next().await {
        match chunk {
            Ok(chunk) => {
                raw.extend_from_slice(&chunk);
                if raw.len() > MAX_ERROR_BODY {
                    return GENERIC_REJECTION.to_string();
                }
            }
            Err(e) => {
                debug!("Could not read error body: {}", e);
                return GENERIC_REJECTION.to_string();
            }
        }
    }
    parse_rejection_reason(&raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declared_size_parsing() {
        assert_eq!(parse_declared_size(Some("1048576")), 1_048_576);
        assert_eq!(parse_declared_size(Some(" 42 ")), 42);
        assert_eq!(parse_declared_size(Some("lots")), 0);
        assert_eq!(parse_declared_size(Some("-5")), 0);
        assert_eq!(parse_declared_size(None), 0);
    }

    #[test]
    fn test_rejection_reason_from_detail() {
        assert_eq!(
            parse_rejection_reason(br#"{"detail":"quota exceeded"}"#),
            "quota exceeded"
        );
    }

    #[test]
    fn test_rejection_reason_fallbacks() {
        assert_eq!(parse_rejection_reason(b"<html>502</html>"), GENERIC_REJECTION);
        assert_eq!(parse_rejection_reason(b""), GENERIC_REJECTION);
        assert_eq!(parse_rejection_reason(br#"{"error":"x"}"#), GENERIC_REJECTION);
        assert_eq!(parse_rejection_reason(br#"{"detail":""}"#), GENERIC_REJECTION);
        // Validation errors carry a list, not a message
        assert_eq!(
            parse_rejection_reason(br#"{"detail":[{"msg":"field required"}]}"#),
            GENERIC_REJECTION
        );
    }

    #[tokio::test]
    async fn test_rejection_reason_reads_chunked_body() {
        let body: ByteStream = Box::pin(futures::stream::iter(vec![
            Ok::<_, std::io::Error>(bytes::Bytes::from_static(br#"{"detail":"#)),
            Ok(bytes::Bytes::from_static(br#""too long"}"#)),
        ]));
        assert_eq!(rejection_reason(Some(body)).await, "too long");
        assert_eq!(rejection_reason(None).await, GENERIC_REJECTION);
    }
}
