// Source locator validation

use std::fmt;

use regex::Regex;

use super::errors::DownloadError;

lazy_static::lazy_static! {
    static ref WATCH_RE: Regex = Regex::new(
        r"^(?:https?://)?(?:www\.|m\.|music\.)?youtube\.com/watch\?(?:[^#]*&)?v=([A-Za-z0-9_-]{11})(?:[&#].*)?$"
    ).unwrap();
    static ref PATH_RE: Regex = Regex::new(
        r"^(?:https?://)?(?:www\.|m\.|music\.)?youtube\.com/(?:shorts|embed|v|live)/([A-Za-z0-9_-]{11})(?:[/?#].*)?$"
    ).unwrap();
    static ref SHORT_RE: Regex = Regex::new(
        r"^(?:https?://)?youtu\.be/([A-Za-z0-9_-]{11})(?:[/?#].*)?$"
    ).unwrap();
    // A dash only appears inside full-length YouTube ids, which keeps the
    // `<id>-<title>` file prefix unambiguous
    static ref BARE_ID_RE: Regex =
        Regex::new(r"^(?:[A-Za-z0-9_-]{11}|[A-Za-z0-9_]{1,64})$").unwrap();
}

/// A validated reference to one YouTube video.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocator {
    url: String,
    video_id: String,
}

impl SourceLocator {
    /// Accepts a YouTube watch/short/embed URL or a bare video id.
    pub fn parse(input: &str) -> Result<Self, DownloadError> {
        let trimmed = input.trim();

        for re in [&*WATCH_RE, &*PATH_RE, &*SHORT_RE] {
            if let Some(caps) = re.captures(trimmed) {
                return Ok(Self {
                    url: trimmed.to_string(),
                    video_id: caps[1].to_string(),
                });
            }
        }

        if BARE_ID_RE.is_match(trimmed) {
            return Ok(Self::from_video_id_unchecked(trimmed));
        }

        Err(DownloadError::InvalidLocator(trimmed.to_string()))
    }

    fn from_video_id_unchecked(id: &str) -> Self {
        Self {
            url: format!("https://www.youtube.com/watch?v={}", id),
            video_id: id.to_string(),
        }
    }

    /// True when the input looks like a URL rather than a search term or id.
    pub fn looks_like_url(input: &str) -> bool {
        let lower = input.trim().to_lowercase();
        lower.starts_with("http://")
            || lower.starts_with("https://")
            || lower.contains("youtube.com")
            || lower.contains("youtu.be")
    }

    /// URL handed to yt-dlp
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Disambiguating identifier embedded in output filenames
    pub fn video_id(&self) -> &str {
        &self.video_id
    }
}

impl fmt::Display for SourceLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_watch_urls() {
        let loc = SourceLocator::parse("https://www.youtube.com/watch?v=dQw4w9WgXcQ").unwrap();
        assert_eq!(loc.video_id(), "dQw4w9WgXcQ");
        assert_eq!(loc.url(), "https://www.youtube.com/watch?v=dQw4w9WgXcQ");

        let loc = SourceLocator::parse("https://music.youtube.com/watch?list=PL1&v=dQw4w9WgXcQ&t=42")
            .unwrap();
        assert_eq!(loc.video_id(), "dQw4w9WgXcQ");

        let loc = SourceLocator::parse("youtube.com/watch?v=dQw4w9WgXcQ").unwrap();
        assert_eq!(loc.video_id(), "dQw4w9WgXcQ");
    }

    #[test]
    fn accepts_short_and_path_forms() {
        for input in [
            "https://youtu.be/dQw4w9WgXcQ",
            "https://youtu.be/dQw4w9WgXcQ?si=abc",
            "https://www.youtube.com/shorts/dQw4w9WgXcQ",
            "https://www.youtube.com/embed/dQw4w9WgXcQ",
            "https://m.youtube.com/live/dQw4w9WgXcQ?feature=share",
        ] {
            let loc = SourceLocator::parse(input).unwrap();
            assert_eq!(loc.video_id(), "dQw4w9WgXcQ", "input: {}", input);
        }
    }

    #[test]
    fn bare_id_becomes_canonical_url() {
        let loc = SourceLocator::parse("abc123").unwrap();
        assert_eq!(loc.video_id(), "abc123");
        assert_eq!(loc.url(), "https://www.youtube.com/watch?v=abc123");
    }

    #[test]
    fn dashed_bare_ids_must_be_full_length() {
        assert_eq!(SourceLocator::parse("a-b_c-d-e-f").unwrap().video_id(), "a-b_c-d-e-f");
        assert_eq!(SourceLocator::parse("42").unwrap().video_id(), "42");
        assert!(SourceLocator::parse("ab-cd").is_err());
    }

    #[test]
    fn rejects_other_input() {
        for input in [
            "",
            "   ",
            "not a url",
            "https://example.com/watch?v=dQw4w9WgXcQ",
            "https://www.youtube.com/watch?v=short",
            "https://vimeo.com/12345",
            "../../etc/passwd",
        ] {
            match SourceLocator::parse(input) {
                Err(DownloadError::InvalidLocator(_)) => {}
                other => panic!("{:?} should be rejected, got {:?}", input, other),
            }
        }
    }

    #[test]
    fn url_detection() {
        assert!(SourceLocator::looks_like_url("https://youtu.be/x"));
        assert!(SourceLocator::looks_like_url("www.youtube.com/watch?v=x"));
        assert!(!SourceLocator::looks_like_url("daft punk get lucky"));
    }
}
