// Error types for the download orchestrator

use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by the orchestrator and the collaborators around it.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Input is neither a recognized YouTube URL nor a bare video id
    #[error("Invalid YouTube URL or video id: {0}")]
    InvalidLocator(String),

    /// yt-dlp could not be started at all
    #[error("yt-dlp is not available: {0}")]
    ToolUnavailable(String),

    /// yt-dlp ran but exited with a nonzero status
    #[error("yt-dlp exited with {}: {}", exit_label(.code), last_line(.stderr))]
    ToolFailure { code: Option<i32>, stderr: String },

    /// yt-dlp reported success but no output file could be located
    #[error("No downloaded file found in {}: {detail}", .dir.display())]
    ArtifactNotFound { dir: PathBuf, detail: String },

    /// Every planned strategy failed
    #[error("All {attempts} download strategies failed; last error: {last}")]
    AllStrategiesExhausted {
        attempts: usize,
        last: Box<DownloadError>,
    },

    /// Lyrics or other optional metadata could not be fetched
    #[error("Metadata lookup failed: {0}")]
    MetadataFetch(String),

    /// The search provider failed
    #[error("Search failed: {0}")]
    Search(String),

    /// Failed to parse yt-dlp JSON output
    #[error("Parse error: {0}")]
    Parse(String),

    /// The caller abandoned the operation
    #[error("Download cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DownloadError {
    /// Short machine-checkable kind, stable across releases.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidLocator(_) => "invalid_locator",
            Self::ToolUnavailable(_) => "tool_unavailable",
            Self::ToolFailure { .. } => "tool_failure",
            Self::ArtifactNotFound { .. } => "artifact_not_found",
            Self::AllStrategiesExhausted { .. } => "all_strategies_exhausted",
            Self::MetadataFetch(_) => "metadata_fetch_failure",
            Self::Search(_) => "search_failure",
            Self::Parse(_) => "parse_error",
            Self::Cancelled => "cancelled",
            Self::Io(_) => "io_error",
        }
    }

    /// Message that is safe to hand to remote callers.
    ///
    /// Command lines, stderr and filesystem paths stay in the local logs.
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidLocator(_) => "Invalid YouTube URL".to_string(),
            Self::ToolUnavailable(_) => "yt-dlp is not installed on the server. \
                 Install it with `brew install yt-dlp` or `pip install yt-dlp`."
                .to_string(),
            Self::ToolFailure { .. } => "yt-dlp failed to download the video".to_string(),
            Self::ArtifactNotFound { .. } => {
                "The download finished but the file could not be located".to_string()
            }
            Self::AllStrategiesExhausted { attempts, last } => format!(
                "Download failed after {} attempts ({})",
                attempts,
                last.kind()
            ),
            Self::MetadataFetch(_) => "Lyrics lookup failed".to_string(),
            Self::Search(_) => "Search failed".to_string(),
            Self::Parse(_) => "Unexpected response from yt-dlp".to_string(),
            Self::Cancelled => "Download cancelled".to_string(),
            Self::Io(_) => "Server storage error".to_string(),
        }
    }

    /// Errors that end the whole invocation instead of advancing to the next strategy.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::ToolUnavailable(_) | Self::Cancelled)
    }

    /// Text that diagnostics can inspect (stderr for tool failures).
    pub fn diagnostic_text(&self) -> String {
        match self {
            Self::ToolFailure { stderr, .. } => stderr.clone(),
            Self::AllStrategiesExhausted { last, .. } => last.diagnostic_text(),
            other => other.to_string(),
        }
    }
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("code {}", code),
        None => "signal".to_string(),
    }
}

fn last_line(stderr: &str) -> &str {
    stderr
        .lines()
        .rev()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("no error output")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_failure_display_uses_last_stderr_line() {
        let err = DownloadError::ToolFailure {
            code: Some(1),
            stderr: "WARNING: something\nERROR: HTTP Error 403: Forbidden\n\n".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "yt-dlp exited with code 1: ERROR: HTTP Error 403: Forbidden"
        );
    }

    #[test]
    fn user_message_hides_stderr() {
        let err = DownloadError::AllStrategiesExhausted {
            attempts: 3,
            last: Box::new(DownloadError::ToolFailure {
                code: Some(1),
                stderr: "ERROR: /home/me/secret/path".to_string(),
            }),
        };
        let message = err.user_message();
        assert!(!message.contains("secret"));
        assert!(message.contains("tool_failure"));
        assert_eq!(err.kind(), "all_strategies_exhausted");
    }

    #[test]
    fn fatal_errors() {
        assert!(DownloadError::ToolUnavailable("yt-dlp".into()).is_fatal());
        assert!(DownloadError::Cancelled.is_fatal());
        assert!(!DownloadError::ToolFailure {
            code: Some(2),
            stderr: String::new()
        }
        .is_fatal());
    }
}
