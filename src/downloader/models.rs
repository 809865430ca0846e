// Common data models for downloader

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::errors::DownloadError;

/// Requested media category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputKind {
    /// MP3 audio
    Audio,
    /// MP4 video
    Video,
}

impl OutputKind {
    /// `"mp3"` selects audio, anything else selects video.
    pub fn from_format(format: &str) -> Self {
        if format.trim().eq_ignore_ascii_case("mp3") {
            Self::Audio
        } else {
            Self::Video
        }
    }

    /// Container extension produced for this kind
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Audio => "mp3",
            Self::Video => "mp4",
        }
    }

    /// Extensions the resolver accepts for this kind
    pub fn accepted_extensions(&self) -> &'static [&'static str] {
        match self {
            Self::Audio => &["mp3"],
            Self::Video => &["mp4"],
        }
    }

    /// Whether `path` carries an extension accepted for this kind
    pub fn accepts(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map_or(false, |ext| {
                self.accepted_extensions()
                    .iter()
                    .any(|a| a.eq_ignore_ascii_case(ext))
            })
    }
}

impl fmt::Display for OutputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Captured outcome of one yt-dlp process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionResult {
    /// Exit code; `None` when the process was terminated by a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ExecutionResult {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// stdout followed by stderr, the text the resolver scans
    pub fn combined_output(&self) -> String {
        let mut text = String::with_capacity(self.stdout.len() + self.stderr.len() + 1);
        text.push_str(&self.stdout);
        if !text.is_empty() && !text.ends_with('\n') {
            text.push('\n');
        }
        text.push_str(&self.stderr);
        text
    }

    /// Classify by exit status: zero is success, anything else a tool failure.
    pub fn into_success(self) -> Result<Self, DownloadError> {
        if self.success() {
            Ok(self)
        } else {
            Err(DownloadError::ToolFailure {
                code: self.code,
                stderr: self.stderr,
            })
        }
    }
}

/// Which step of the resolver cascade produced an artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionSource {
    DestinationLine,
    AlternateDestination,
    CompletionLine,
    DirectoryScan,
}

/// File produced by a successful download
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedArtifact {
    pub path: PathBuf,
    pub extension: String,
    pub source: ResolutionSource,
}

impl ResolvedArtifact {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}

/// Search hit returned by the search provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoSummary {
    pub id: String,
    pub title: String,
    pub url: String,
    /// Display duration, `m:ss` or `h:mm:ss`
    pub duration: Option<String>,
    #[serde(rename = "durationSeconds")]
    pub duration_seconds: Option<u64>,
    pub channel: String,
    pub views: Option<u64>,
    pub thumbnail: Option<String>,
}

/// Download progress information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadProgress {
    pub percent: f32,
    pub status: String,
}

/// Network configuration passed to yt-dlp and the HTTP client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkConfig {
    /// SOCKS5/HTTP proxy URL (e.g., "socks5://127.0.0.1:1080")
    pub proxy: Option<String>,

    /// Socket timeout in seconds
    pub timeout: Option<u32>,

    /// cookies.txt handed to yt-dlp
    pub cookies_path: Option<PathBuf>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            proxy: None,
            timeout: Some(30),
            cookies_path: None,
        }
    }
}
