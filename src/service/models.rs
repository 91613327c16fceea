//! Data structures exchanged with the conversion service

use crate::utils::error::MediagrabError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Video information returned by the metadata endpoint
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VideoInfo {
    pub title: String,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub duration: Option<MediaDuration>,
    #[serde(default)]
    pub uploader: Option<String>,
}

/// The service reports duration either as seconds or as a preformatted string
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MediaDuration {
    Seconds(f64),
    Text(String),
}

impl fmt::Display for MediaDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaDuration::Text(text) => f.write_str(text),
            MediaDuration::Seconds(secs) => {
                let total = secs.max(0.0).round() as u64;
                let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);
                if hours > 0 {
                    write!(f, "{}:{:02}:{:02}", hours, minutes, seconds)
                } else {
                    write!(f, "{}:{:02}", minutes, seconds)
                }
            }
        }
    }
}

/// Output container family requested from the service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaFormat {
    Video,
    Audio,
}

impl MediaFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaFormat::Video => "video",
            MediaFormat::Audio => "audio",
        }
    }

    /// File extension of the artifact the service produces for this format
    pub fn extension(&self) -> &'static str {
        match self {
            MediaFormat::Video => "mp4",
            MediaFormat::Audio => "mp3",
        }
    }

    /// Quality tokens the service accepts for this format, best first
    pub fn qualities(&self) -> &'static [Quality] {
        match self {
            MediaFormat::Video => &[Quality::P2160, Quality::P1080, Quality::P720],
            MediaFormat::Audio => &[Quality::Kbps320, Quality::Kbps128, Quality::Kbps64],
        }
    }

    pub fn default_quality(&self) -> Quality {
        match self {
            MediaFormat::Video => Quality::P1080,
            MediaFormat::Audio => Quality::Kbps128,
        }
    }
}

impl fmt::Display for MediaFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MediaFormat {
    type Err = MediagrabError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "video" => Ok(MediaFormat::Video),
            "audio" => Ok(MediaFormat::Audio),
            other => Err(MediagrabError::InvalidFormat(other.to_string())),
        }
    }
}

/// Closed set of quality tokens advertised by the service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Quality {
    P2160,
    P1080,
    P720,
    Kbps320,
    Kbps128,
    Kbps64,
}

impl Quality {
    /// Wire token sent to the service
    pub fn token(&self) -> &'static str {
        match self {
            Quality::P2160 => "2160",
            Quality::P1080 => "1080",
            Quality::P720 => "720",
            Quality::Kbps320 => "320",
            Quality::Kbps128 => "128",
            Quality::Kbps64 => "64",
        }
    }

    /// Human readable label
    pub fn label(&self) -> &'static str {
        match self {
            Quality::P2160 => "4K",
            Quality::P1080 => "1080p",
            Quality::P720 => "720p",
            Quality::Kbps320 => "320 kbps (High)",
            Quality::Kbps128 => "128 kbps (Medium)",
            Quality::Kbps64 => "64 kbps (Low)",
        }
    }

    /// Resolve a token against the set allowed for `format`
    pub fn parse(format: MediaFormat, token: &str) -> Result<Self, MediagrabError> {
        let token = token.trim();
        format
            .qualities()
            .iter()
            .copied()
            .find(|q| q.token() == token)
            .ok_or_else(|| MediagrabError::InvalidQuality {
                format: format.to_string(),
                quality: token.to_string(),
            })
    }
}

/// One download request. Validated on construction and immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    url: String,
    format: MediaFormat,
    quality: Quality,
}

impl TransferRequest {
    /// Build a request, rejecting an unusable URL or a quality the format does not offer.
    pub fn new(url: &str, format: MediaFormat, quality: &str) -> Result<Self, MediagrabError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(MediagrabError::InvalidUrl("URL is empty".to_string()));
        }
        let parsed =
            reqwest::Url::parse(url).map_err(|e| MediagrabError::InvalidUrl(format!("{}: {}", url, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(MediagrabError::InvalidUrl(format!(
                "unsupported scheme '{}'",
                parsed.scheme()
            )));
        }

        let quality = Quality::parse(format, quality)?;
        Ok(Self {
            url: url.to_string(),
            format,
            quality,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn format(&self) -> MediaFormat {
        self.format
    }

    pub fn quality(&self) -> Quality {
        self.quality
    }
}

/// JSON body of a download request
#[derive(Debug, Serialize)]
pub(crate) struct DownloadBody<'a> {
    pub url: &'a str,
    pub format: MediaFormat,
    pub quality: &'static str,
}

impl<'a> From<&'a TransferRequest> for DownloadBody<'a> {
    fn from(request: &'a TransferRequest) -> Self {
        Self {
            url: request.url(),
            format: request.format(),
            quality: request.quality().token(),
        }
    }
}
