// Strategy planner - ordered yt-dlp tactics per output kind
//
// Strategy order:
// 1. Highest quality with the primary player client (web)
// 2. Reduced quality with the secondary player client (android)
// 3. Best available, ignore errors, no forced client

use std::fmt;
use std::path::Path;

use super::locator::SourceLocator;
use super::models::{NetworkConfig, OutputKind};
use super::utils::{get_cookie_args, get_proxy_args, get_timeout_args};

/// YouTube player client identity presented by yt-dlp
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerClient {
    /// Primary identity
    Web,
    /// Secondary identity, often allowed when web is throttled
    Android,
    /// Let yt-dlp pick
    Default,
}

impl PlayerClient {
    pub fn as_arg(&self) -> Option<&'static str> {
        match self {
            Self::Web => Some("web"),
            Self::Android => Some("android"),
            Self::Default => None,
        }
    }
}

impl fmt::Display for PlayerClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_arg().unwrap_or("default"))
    }
}

/// Quality preference of a strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualityTier {
    /// MP3 at a fixed bitrate in kbps
    AudioBitrate(u32),
    /// Whatever audio is available
    AudioBest,
    /// Best stream up to a height ceiling
    VideoCeiling(u32),
    /// Whatever video is available
    VideoBest,
}

impl QualityTier {
    pub fn kind(&self) -> OutputKind {
        match self {
            Self::AudioBitrate(_) | Self::AudioBest => OutputKind::Audio,
            Self::VideoCeiling(_) | Self::VideoBest => OutputKind::Video,
        }
    }
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AudioBitrate(kbps) => write!(f, "mp3 {}k", kbps),
            Self::AudioBest => f.write_str("best audio"),
            Self::VideoCeiling(height) => write!(f, "mp4 <={}p", height),
            Self::VideoBest => f.write_str("best video"),
        }
    }
}

/// One fully-parameterized yt-dlp tactic, not yet bound to a target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadStrategy {
    /// 1-based priority; lower runs first
    pub rank: usize,
    pub tier: QualityTier,
    pub client: PlayerClient,
    pub ignore_errors: bool,
    /// Format/extraction arguments
    pub args: Vec<String>,
}

impl DownloadStrategy {
    fn new(rank: usize, tier: QualityTier, client: PlayerClient, ignore_errors: bool) -> Self {
        let mut args = match tier {
            QualityTier::AudioBitrate(kbps) => audio_args(&format!("{}K", kbps)),
            QualityTier::AudioBest => audio_args("0"),
            QualityTier::VideoCeiling(height) => video_args(&format!(
                "bv*[height<={h}][ext=mp4]+ba[ext=m4a]/b[height<={h}][ext=mp4]/bv*[height<={h}]+ba/b[height<={h}]",
                h = height
            )),
            QualityTier::VideoBest => {
                let mut args = video_args("b[ext=mp4]/bv*+ba/b");
                args.extend(["--remux-video".to_string(), "mp4".to_string()]);
                args
            }
        };

        if let Some(client) = client.as_arg() {
            args.push("--extractor-args".to_string());
            args.push(format!("youtube:player_client={}", client));
        }

        if ignore_errors {
            args.push("--ignore-errors".to_string());
        }

        Self {
            rank,
            tier,
            client,
            ignore_errors,
            args,
        }
    }

    pub fn kind(&self) -> OutputKind {
        self.tier.kind()
    }

    pub fn label(&self) -> String {
        format!("#{} {} client={}", self.rank, self.tier, self.client)
    }

    /// Bind the template to a target and output directory.
    ///
    /// Output files are named `<video id>-<title>.<ext>` so the resolver's
    /// directory scan can tell this download apart from older ones.
    pub fn bind(
        &self,
        locator: &SourceLocator,
        output_dir: &Path,
        network: &NetworkConfig,
    ) -> Invocation {
        let template = output_dir.join(format!("{}-%(title)s.%(ext)s", locator.video_id()));

        let mut args = self.args.clone();
        args.extend([
            "--no-playlist".to_string(),
            "--newline".to_string(),
            "--no-update".to_string(),
            "--restrict-filenames".to_string(),
            "-o".to_string(),
            template.to_string_lossy().to_string(),
        ]);
        args.extend(get_timeout_args(network));
        args.extend(get_proxy_args(network));
        args.extend(get_cookie_args(network));
        args.push(locator.url().to_string());

        Invocation {
            rank: self.rank,
            label: self.label(),
            output_dir: output_dir.to_path_buf(),
            args,
        }
    }
}

/// A strategy bound to a concrete target, ready to run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub rank: usize,
    pub label: String,
    pub output_dir: std::path::PathBuf,
    pub args: Vec<String>,
}

fn audio_args(quality: &str) -> Vec<String> {
    vec![
        "-f".to_string(),
        "bestaudio/best".to_string(),
        "-x".to_string(),
        "--audio-format".to_string(),
        "mp3".to_string(),
        "--audio-quality".to_string(),
        quality.to_string(),
    ]
}

fn video_args(format: &str) -> Vec<String> {
    vec![
        "-f".to_string(),
        format.to_string(),
        "--merge-output-format".to_string(),
        "mp4".to_string(),
    ]
}

/// Ordered strategies for `kind`, highest quality first.
pub fn plan(kind: OutputKind) -> Vec<DownloadStrategy> {
    match kind {
        OutputKind::Audio => vec![
            DownloadStrategy::new(1, QualityTier::AudioBitrate(320), PlayerClient::Web, false),
            DownloadStrategy::new(2, QualityTier::AudioBitrate(192), PlayerClient::Android, false),
            DownloadStrategy::new(3, QualityTier::AudioBest, PlayerClient::Default, true),
        ],
        OutputKind::Video => vec![
            DownloadStrategy::new(1, QualityTier::VideoCeiling(1080), PlayerClient::Web, false),
            DownloadStrategy::new(2, QualityTier::VideoCeiling(720), PlayerClient::Android, false),
            DownloadStrategy::new(3, QualityTier::VideoBest, PlayerClient::Default, true),
        ],
    }
}
