//! Streamed download engine

pub mod accumulator;
pub mod artifact;
pub mod cancel;
pub mod engine;
pub mod progress;

// Re-export for convenience
pub use accumulator::{ByteAccumulator, DrainOutcome};
pub use artifact::{artifact_filename, Artifact, ArtifactSink, DirectorySink};
pub use cancel::CancelHandle;
pub use engine::{DownloadConfig, DownloadEngine, TransferOutcome};
pub use progress::{
    estimate, format_bytes, Estimate, Eta, ProgressSnapshot, TransferPhase, TransferState,
};
