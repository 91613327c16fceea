//! Finished transfers and where they are persisted

use crate::service::models::MediaFormat;
use crate::utils::error::MediagrabError;
use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// Base name used when no title is known
pub const FALLBACK_TITLE: &str = "download";

const MAX_NAME_LEN: usize = 200;

/// Assembled payload of a completed transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub filename: String,
    pub payload: Bytes,
}

impl Artifact {
    pub fn new(payload: Bytes, title: Option<&str>, format: MediaFormat) -> Self {
        Self {
            filename: artifact_filename(title, format),
            payload,
        }
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

/// `<title>.<ext>`, or `download.<ext>` when the title is missing or blank
pub fn artifact_filename(title: Option<&str>, format: MediaFormat) -> String {
    let title = title
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or(FALLBACK_TITLE);
    format!("{}.{}", title, format.extension())
}

/// Receives each completed artifact exactly once
#[async_trait]
pub trait ArtifactSink: Send + Sync {
    /// Persist the artifact and return where it ended up. The location may
    /// differ from `artifact.filename` when the sink has to adjust the name.
    async fn save(&self, artifact: &Artifact) -> Result<PathBuf, MediagrabError>;
}

/// Writes artifacts into a directory, never overwriting an existing file
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl ArtifactSink for DirectorySink {
    async fn save(&self, artifact: &Artifact) -> Result<PathBuf, MediagrabError> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let name = sanitize_filename(&artifact.filename);
        let (stem, ext) = split_extension(&name);

        let mut attempt = 0u32;
        let (mut file, pending) = loop {
            let candidate = if attempt == 0 {
                name.clone()
            } else {
                format!("{} ({}){}", stem, attempt, ext)
            };
            let path = self.dir.join(&candidate);
            match OpenOptions::new().write(true).create_new(true).open(&path).await {
                Ok(file) => break (file, PendingFile::new(path)),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    debug!("{:?} exists, trying next name", path);
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        };

        let written = async {
            file.write_all(&artifact.payload).await?;
            file.flush().await
        }
        .await;
        // Close before a failed write removes the file
        drop(file);
        written?;

        let path = pending.commit();
        info!("Saved {} bytes to {:?}", artifact.len(), path);
        Ok(path)
    }
}

/// A file created for an artifact that is not fully written yet.
///
/// Removed on drop unless committed, so a failed or abandoned write never
/// leaves a truncated file under the artifact's name.
struct PendingFile {
    path: Option<PathBuf>,
}

impl PendingFile {
    fn new(path: PathBuf) -> Self {
        Self { path: Some(path) }
    }

    fn commit(mut self) -> PathBuf {
        self.path.take().unwrap_or_default()
    }
}

impl Drop for PendingFile {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            warn!("Removing incomplete file {:?}", path);
            if let Err(e) = std::fs::remove_file(&path) {
                warn!("Failed to remove {:?}: {}", path, e);
            }
        }
    }
}

/// Make a filename safe for common filesystems.
///
/// Only the stem is rewritten; a short extension is kept as is so dots at
/// the end of a title never merge into it.
pub fn sanitize_filename(name: &str) -> String {
    let (stem, ext) = split_extension(name.trim());

    let mut stem = replace_invalid(stem)
        .trim()
        .trim_start_matches('.')
        .to_string();
    if ext.is_empty() {
        stem = stem.trim_end_matches(['.', ' ']).to_string();
    }
    if stem.is_empty() {
        stem = FALLBACK_TITLE.to_string();
    }
    let ext = replace_invalid(ext);

    let keep = MAX_NAME_LEN.saturating_sub(ext.chars().count());
    if stem.chars().count() > keep {
        stem = stem.chars().take(keep).collect();
    }

    format!("{}{}", stem, ext)
}

fn replace_invalid(part: &str) -> String {
    const INVALID: [char; 10] = ['/', '\\', ':', '*', '?', '"', '<', '>', '|', '\0'];

    let mut sanitized: String = part
        .chars()
        .map(|c| if INVALID.contains(&c) || c.is_control() { '_' } else { c })
        .collect();

    while sanitized.contains("__") {
        sanitized = sanitized.replace("__", "_");
    }

    sanitized
}

/// Split `name.ext` into (`name`, `.ext`); extension is empty when absent.
fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(pos) if pos > 0 && (2..=10).contains(&(name.len() - pos)) => name.split_at(pos),
        _ => (name, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_filename_from_title() {
        assert_eq!(artifact_filename(Some("My Song"), MediaFormat::Audio), "My Song.mp3");
        assert_eq!(artifact_filename(Some("Clip"), MediaFormat::Video), "Clip.mp4");
    }

    #[test]
    fn test_filename_fallback() {
        assert_eq!(artifact_filename(None, MediaFormat::Video), "download.mp4");
        assert_eq!(artifact_filename(Some("   "), MediaFormat::Audio), "download.mp3");
    }

    #[test]
    fn test_sanitize_strips_path_characters() {
        assert_eq!(sanitize_filename("AC/DC: Live?.mp4"), "AC_DC_ Live_.mp4");
        assert_eq!(sanitize_filename("../../etc/passwd"), "_.._etc_passwd");
        assert_eq!(sanitize_filename("..."), "download");
    }

    #[test]
    fn test_sanitize_keeps_extension_after_trailing_dots() {
        let name = artifact_filename(Some("Wait for it..."), MediaFormat::Audio);
        assert_eq!(sanitize_filename(&name), "Wait for it....mp3");
        assert_eq!(sanitize_filename("Intro. .mp4"), "Intro..mp4");
    }

    #[test]
    fn test_sanitize_limits_length_keeping_extension() {
        let long = format!("{}.mp3", "é".repeat(300));
        let sanitized = sanitize_filename(&long);
        assert_eq!(sanitized.chars().count(), MAX_NAME_LEN);
        assert!(sanitized.ends_with(".mp3"));
    }

    #[tokio::test]
    async fn test_directory_sink_writes_payload() {
        let temp = TempDir::new().expect("temp dir");
        let sink = DirectorySink::new(temp.path().join("out"));
        let artifact = Artifact::new(Bytes::from_static(b"abc"), Some("Song"), MediaFormat::Audio);

        let path = sink.save(&artifact).await.expect("save");
        assert_eq!(path, temp.path().join("out/Song.mp3"));

        let written = tokio::fs::read(&path)
            .await
            .expect("read back");
        assert_eq!(written, b"abc");
    }

    #[tokio::test]
    async fn test_directory_sink_does_not_overwrite() {
        let temp = TempDir::new().expect("temp dir");
        let sink = DirectorySink::new(temp.path());
        let first = Artifact::new(Bytes::from_static(b"one"), None, MediaFormat::Video);
        let second = Artifact::new(Bytes::from_static(b"two"), None, MediaFormat::Video);

        let first_path = sink.save(&first).await.expect("first");
        let second_path = sink.save(&second).await.expect("second");
        assert_eq!(first_path, temp.path().join("download.mp4"));
        assert_eq!(second_path, temp.path().join("download (1).mp4"));

        let a = tokio::fs::read(temp.path().join("download.mp4")).await.expect("a");
        let b = tokio::fs::read(temp.path().join("download (1).mp4"))
            .await
            .expect("b");
        assert_eq!(a, b"one");
        assert_eq!(b, b"two");
    }

    #[tokio::test]
    async fn test_directory_sink_reports_sanitized_path() {
        let temp = TempDir::new().expect("temp dir");
        let sink = DirectorySink::new(temp.path());
        let artifact = Artifact::new(Bytes::from_static(b"x"), Some("AC/DC: Live?"), MediaFormat::Video);

        let path = sink.save(&artifact).await.expect("save");

        assert_eq!(path, temp.path().join("AC_DC_ Live_.mp4"));
        assert!(path.exists());
    }

    #[test]
    fn test_pending_file_removed_unless_committed() {
        let temp = TempDir::new().expect("temp dir");
        let abandoned = temp.path().join("half.mp4");
        let kept = temp.path().join("full.mp4");
        std::fs::write(&abandoned, b"par").expect("write");
        std::fs::write(&kept, b"full").expect("write");

        drop(PendingFile::new(abandoned.clone()));
        let committed = PendingFile::new(kept.clone()).commit();

        assert!(!abandoned.exists());
        assert_eq!(committed, kept);
        assert!(kept.exists());
    }
}
