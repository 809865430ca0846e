// Failure diagnostics - identifies why yt-dlp failed
//
// Analyzes stderr to determine:
// - Type of blocking (403, SABR, PO Token, etc.)
// - Whether the extractor itself is out of date
// - A suggestion for the local log

use serde::{Deserialize, Serialize};

/// Reasons why a yt-dlp run might fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockingReason {
    /// HTTP 403 Forbidden - general access denied
    Http403Forbidden,

    /// SABR (Segmented Adaptive Bitrate Restreaming) protection
    SabrStreaming,

    /// PO Token (Proof of Origin) required
    PoTokenRequired,

    /// Age-restricted content requiring login
    AgeRestricted,

    /// Geographic restriction
    GeoBlocked,

    /// Network timeout (soft IP block)
    NetworkTimeout,

    /// Rate limiting (429 or similar)
    RateLimited,

    /// Bot detection triggered
    BotDetection,

    /// Private video requiring authorization
    PrivateVideo,

    /// Video deleted or unavailable
    VideoUnavailable,

    /// DRM-protected content
    DrmProtected,

    /// YouTube changed something the installed yt-dlp cannot parse
    OutdatedExtractor,

    /// Generic/unknown failure
    Unknown,
}

impl BlockingReason {
    /// Human-readable description
    pub fn description(&self) -> &'static str {
        match self {
            Self::Http403Forbidden => "Access denied (HTTP 403)",
            Self::SabrStreaming => "SABR streaming protection active",
            Self::PoTokenRequired => "Proof of Origin token required",
            Self::AgeRestricted => "Age-restricted content",
            Self::GeoBlocked => "Geographic restriction",
            Self::NetworkTimeout => "Network timeout (possible IP throttling)",
            Self::RateLimited => "Rate limited by YouTube",
            Self::BotDetection => "Bot detection triggered",
            Self::PrivateVideo => "Private video",
            Self::VideoUnavailable => "Video unavailable",
            Self::DrmProtected => "DRM-protected content",
            Self::OutdatedExtractor => "yt-dlp extractor is out of date",
            Self::Unknown => "Unknown failure",
        }
    }

    /// What the operator can do about it
    pub fn suggestion(&self) -> &'static str {
        match self {
            Self::Http403Forbidden => "Use a proxy (YTDLP_PROXY) or refresh cookies (YTDLP_COOKIES)",
            Self::SabrStreaming => "Update yt-dlp and try a different player client",
            Self::PoTokenRequired => {
                "Use cookies from a logged-in browser, see github.com/yt-dlp/yt-dlp/wiki/PO-Token-Guide"
            }
            Self::AgeRestricted => "Export cookies.txt from a logged-in browser (YTDLP_COOKIES)",
            Self::GeoBlocked => "Use a proxy in an allowed region",
            Self::NetworkTimeout => "Check the connection or configure a proxy",
            Self::RateLimited => "Wait 10-15 minutes or switch IP",
            Self::BotDetection => "Use cookies or a fresh proxy",
            Self::PrivateVideo => "Cookies from an authorized account are required",
            Self::VideoUnavailable => "The video was removed or made private",
            Self::DrmProtected => "DRM-protected content cannot be downloaded",
            Self::OutdatedExtractor => "Run `yt-dlp -U` or `ytdl update`",
            Self::Unknown => "Check the URL and try again later",
        }
    }
}

/// Analyze error output and return the most specific reason
pub fn diagnose_error(error: &str) -> Option<BlockingReason> {
    let lower = error.to_lowercase();

    if lower.contains("drm")
        || lower.contains("widevine")
        || lower.contains("playready")
        || lower.contains("requires purchase")
    {
        return Some(BlockingReason::DrmProtected);
    }

    if suggests_outdated_tool(&lower) {
        return Some(BlockingReason::OutdatedExtractor);
    }

    if lower.contains("sabr") {
        return Some(BlockingReason::SabrStreaming);
    }

    if lower.contains("po token") || lower.contains("proof of origin") {
        return Some(BlockingReason::PoTokenRequired);
    }

    if lower.contains("age-restricted") || lower.contains("sign in to confirm your age") {
        return Some(BlockingReason::AgeRestricted);
    }

    if lower.contains("private video") || lower.contains("video is private") {
        return Some(BlockingReason::PrivateVideo);
    }

    if lower.contains("video unavailable")
        || lower.contains("video has been removed")
        || lower.contains("no longer available")
    {
        return Some(BlockingReason::VideoUnavailable);
    }

    if lower.contains("not available in your country") || lower.contains("blocked in your country") {
        return Some(BlockingReason::GeoBlocked);
    }

    if lower.contains("429") || lower.contains("rate limit") || lower.contains("too many requests") {
        return Some(BlockingReason::RateLimited);
    }

    if lower.contains("not a bot") || lower.contains("captcha") || lower.contains("unusual traffic") {
        return Some(BlockingReason::BotDetection);
    }

    if lower.contains("403") || lower.contains("forbidden") {
        return Some(BlockingReason::Http403Forbidden);
    }

    if lower.contains("timeout") || lower.contains("timed out") || lower.contains("network unreachable") {
        return Some(BlockingReason::NetworkTimeout);
    }

    if !error.trim().is_empty() {
        return Some(BlockingReason::Unknown);
    }

    None
}

/// yt-dlp phrases that mean the extractor no longer matches YouTube.
fn suggests_outdated_tool(lower: &str) -> bool {
    const MARKERS: [&str; 6] = [
        "nsig extraction failed",
        "signature extraction failed",
        "unable to extract",
        "confirm you are on the latest version",
        "precondition check failed",
        "please report this issue",
    ];
    MARKERS.iter().any(|m| lower.contains(m))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_403_detection() {
        let error = "ERROR: HTTP Error 403: Forbidden";
        assert_eq!(diagnose_error(error), Some(BlockingReason::Http403Forbidden));
    }

    #[test]
    fn test_sabr_detection() {
        let error = "YouTube is forcing SABR streaming for this client";
        assert_eq!(diagnose_error(error), Some(BlockingReason::SabrStreaming));
    }

    #[test]
    fn test_outdated_detection() {
        let error = "ERROR: [youtube] abc: Unable to extract uploader id; please report this issue \
                     on https://github.com/yt-dlp/yt-dlp/issues. Confirm you are on the latest version using yt-dlp -U";
        assert_eq!(diagnose_error(error), Some(BlockingReason::OutdatedExtractor));

        let error = "WARNING: [youtube] nsig extraction failed: You may experience throttling";
        assert_eq!(diagnose_error(error), Some(BlockingReason::OutdatedExtractor));
    }

    #[test]
    fn test_bot_detection() {
        let error = "ERROR: [youtube] abc: Sign in to confirm you're not a bot";
        assert_eq!(diagnose_error(error), Some(BlockingReason::BotDetection));
    }

    #[test]
    fn test_timeout_detection() {
        let error = "Timed out after 30s";
        assert_eq!(diagnose_error(error), Some(BlockingReason::NetworkTimeout));
    }

    #[test]
    fn test_unavailable_detection() {
        let error = "ERROR: [youtube] abc: Video unavailable";
        assert_eq!(diagnose_error(error), Some(BlockingReason::VideoUnavailable));
    }

    #[test]
    fn test_empty_is_none() {
        assert_eq!(diagnose_error("   "), None);
        assert_eq!(diagnose_error("exit 1"), Some(BlockingReason::Unknown));
    }
}
