// Lyrics lookup - LRCLib search keyed by a parsed video title

use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::errors::DownloadError;

pub const DEFAULT_LRCLIB_URL: &str = "https://lrclib.net/api/search";

lazy_static::lazy_static! {
    static ref NOISE_RE: Regex =
        Regex::new(r"(?i)\s*[(\[]*\b(official|music|video|lyrics|audio|hd|4k)\b[)\]]*\s*").unwrap();
    static ref EMPTY_BRACKETS_RE: Regex = Regex::new(r"\(\s*\)|\[\s*\]").unwrap();
    static ref SPACES_RE: Regex = Regex::new(r"\s+").unwrap();
}

/// Artist and song guessed from a YouTube title
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackTitle {
    pub artist: String,
    pub song: String,
}

impl TrackTitle {
    pub fn query(&self) -> String {
        format!("{} {}", self.artist, self.song).trim().to_string()
    }
}

/// Split a title into artist and song.
///
/// Handles `Artist - Song`, `Artist: Song` and `Song by Artist`; otherwise the
/// first half of the words is taken as the artist.
pub fn parse_video_title(title: &str) -> TrackTitle {
    let cleaned = NOISE_RE.replace_all(title, " ");
    let cleaned = EMPTY_BRACKETS_RE.replace_all(&cleaned, " ");
    let cleaned = SPACES_RE.replace_all(&cleaned, " ");
    let cleaned = cleaned.trim_matches(|c: char| c.is_whitespace() || c == '-');

    let pair = |artist: &str, song: &str| TrackTitle {
        artist: artist.trim().to_string(),
        song: song.trim().to_string(),
    };

    if let Some((artist, song)) = cleaned.split_once(" - ") {
        return pair(artist, song);
    }
    if let Some((artist, song)) = cleaned.split_once(": ") {
        return pair(artist, song);
    }
    // ASCII lowering keeps byte offsets valid for the original string
    if let Some(idx) = cleaned.to_ascii_lowercase().find(" by ") {
        return pair(&cleaned[idx + 4..], &cleaned[..idx]);
    }

    let words: Vec<&str> = cleaned.split(' ').filter(|w| !w.is_empty()).collect();
    if words.len() > 2 {
        let split = (words.len() + 1) / 2;
        pair(&words[..split].join(" "), &words[split..].join(" "))
    } else {
        pair("", cleaned)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lyrics {
    pub artist: String,
    pub song: String,
    pub album: Option<String>,
    /// Track length in seconds
    pub duration: Option<f64>,
    pub plain_lyrics: Option<String>,
    /// LRC formatted, `[mm:ss.xx] line`
    pub synced_lyrics: Option<String>,
    pub has_timestamps: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LrcLibRecord {
    #[serde(default)]
    artist_name: String,
    #[serde(default)]
    track_name: String,
    album_name: Option<String>,
    duration: Option<f64>,
    plain_lyrics: Option<String>,
    synced_lyrics: Option<String>,
}

impl From<LrcLibRecord> for Lyrics {
    fn from(record: LrcLibRecord) -> Self {
        let synced_lyrics = record.synced_lyrics.filter(|s| !s.trim().is_empty());
        Self {
            artist: record.artist_name,
            song: record.track_name,
            album: record.album_name,
            duration: record.duration,
            plain_lyrics: record.plain_lyrics,
            has_timestamps: synced_lyrics.is_some(),
            synced_lyrics,
        }
    }
}

/// First match of an LRCLib search response, if any
pub fn first_match(body: &str) -> Result<Option<Lyrics>, DownloadError> {
    let records: Vec<LrcLibRecord> = serde_json::from_str(body)
        .map_err(|e| DownloadError::MetadataFetch(format!("Unexpected LRCLib response: {}", e)))?;
    Ok(records.into_iter().next().map(Lyrics::from))
}

#[async_trait]
pub trait LyricsProvider: Send + Sync {
    async fn lookup(&self, track: &TrackTitle) -> Result<Option<Lyrics>, DownloadError>;

    async fn lookup_title(&self, title: &str) -> Result<Option<Lyrics>, DownloadError> {
        let track = parse_video_title(title);
        if track.query().is_empty() {
            return Ok(None);
        }
        self.lookup(&track).await
    }
}

pub struct LrcLibClient {
    client: reqwest::Client,
    base_url: String,
}

impl LrcLibClient {
    /// Build a client that honors the configured proxy.
    ///
    /// An unusable proxy URL is logged and the client connects directly.
    pub fn new(base_url: impl Into<String>, proxy: Option<&str>) -> Result<Self, DownloadError> {
        let mut builder = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent(concat!("visualizer-downloader/", env!("CARGO_PKG_VERSION")));

        if let Some(proxy_url) = proxy {
            match reqwest::Proxy::all(proxy_url) {
                Ok(proxy) => builder = builder.proxy(proxy),
                Err(e) => tracing::warn!("[Lyrics] Invalid proxy URL {}: {}", proxy_url, e),
            }
        }

        let client = builder
            .build()
            .map_err(|e| DownloadError::MetadataFetch(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }
}

#[async_trait]
impl LyricsProvider for LrcLibClient {
    async fn lookup(&self, track: &TrackTitle) -> Result<Option<Lyrics>, DownloadError> {
        let query = track.query();
        tracing::info!("[Lyrics] Searching LRCLib for \"{} - {}\"", track.artist, track.song);

        let response = self
            .client
            .get(&self.base_url)
            .query(&[("q", query.as_str())])
            .send()
            .await
            .map_err(|e| DownloadError::MetadataFetch(e.to_string()))?;

        if !response.status().is_success() {
            return Err(DownloadError::MetadataFetch(format!(
                "LRCLib returned {}",
                response.status()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| DownloadError::MetadataFetch(e.to_string()))?;
        let lyrics = first_match(&body)?;

        match &lyrics {
            Some(l) => tracing::info!(
                "[Lyrics] Found {} - {} (synced: {})",
                l.artist,
                l.song,
                l.has_timestamps
            ),
            None => tracing::info!("[Lyrics] No lyrics found"),
        }
        Ok(lyrics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(artist: &str, song: &str) -> TrackTitle {
        TrackTitle {
            artist: artist.to_string(),
            song: song.to_string(),
        }
    }

    #[test]
    fn splits_on_dash_and_strips_noise() {
        assert_eq!(
            parse_video_title("Rick Astley - Never Gonna Give You Up (Official Music Video)"),
            track("Rick Astley", "Never Gonna Give You Up")
        );
        assert_eq!(
            parse_video_title("Daft Punk - Get Lucky [4K] (Audio)"),
            track("Daft Punk", "Get Lucky")
        );
    }

    #[test]
    fn colon_and_by_forms() {
        assert_eq!(parse_video_title("Queen: Bohemian Rhapsody"), track("Queen", "Bohemian Rhapsody"));
        assert_eq!(
            parse_video_title("Yesterday by The Beatles"),
            track("The Beatles", "Yesterday")
        );
    }

    #[test]
    fn noise_words_only_match_whole_words() {
        let parsed = parse_video_title("Hdmi Musicians Anthem");
        assert_eq!(parsed.query(), "Hdmi Musicians Anthem");
    }

    #[test]
    fn falls_back_to_halving_words() {
        assert_eq!(
            parse_video_title("Coldplay Yellow Live Session"),
            track("Coldplay Yellow", "Live Session")
        );
        assert_eq!(parse_video_title("Yellow"), track("", "Yellow"));
        assert_eq!(parse_video_title("Official Video").query(), "");
    }

    #[test]
    fn maps_first_lrclib_record() {
        let body = r#"[
            {"id": 1, "trackName": "Get Lucky", "artistName": "Daft Punk", "albumName": "Random Access Memories",
             "duration": 248.0, "instrumental": false, "plainLyrics": "Like the legend of the phoenix",
             "syncedLyrics": "[00:00.50] Like the legend of the phoenix"},
            {"id": 2, "trackName": "Other", "artistName": "Else"}
        ]"#;
        let lyrics = first_match(body).unwrap().unwrap();
        assert_eq!(lyrics.artist, "Daft Punk");
        assert_eq!(lyrics.song, "Get Lucky");
        assert_eq!(lyrics.album.as_deref(), Some("Random Access Memories"));
        assert!(lyrics.has_timestamps);

        let json = serde_json::to_value(&lyrics).unwrap();
        assert_eq!(json["hasTimestamps"], true);
        assert_eq!(json["syncedLyrics"], "[00:00.50] Like the legend of the phoenix");
    }

    #[test]
    fn empty_and_plain_only_responses() {
        assert!(first_match("[]").unwrap().is_none());

        let lyrics = first_match(r#"[{"trackName": "A", "artistName": "B", "plainLyrics": "la", "syncedLyrics": null}]"#)
            .unwrap()
            .unwrap();
        assert!(!lyrics.has_timestamps);
        assert_eq!(lyrics.plain_lyrics.as_deref(), Some("la"));

        let err = first_match("<html>").unwrap_err();
        assert_eq!(err.kind(), "metadata_fetch_failure");
    }
}
