//! mediagrab library

pub mod downloader;
pub mod service;
pub mod utils;

// Re-export main types for easier use
pub use downloader::{
    Artifact, ArtifactSink, CancelHandle, DirectorySink, DownloadConfig, DownloadEngine,
    ProgressSnapshot, TransferOutcome, TransferPhase, TransferState,
};
pub use service::{HttpMediaService, MediaFormat, MediaService, Quality, TransferRequest, VideoInfo};
pub use utils::{AppSettings, MediagrabError};
