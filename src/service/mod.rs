pub mod http;
pub mod models;
pub mod traits;

pub use http::HttpMediaService;
pub use models::{MediaDuration, MediaFormat, Quality, TransferRequest, VideoInfo};
pub use traits::{ByteStream, DownloadResponse, MediaService};
