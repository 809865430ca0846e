// Downloader module - yt-dlp orchestration and the lookups around it

pub mod diagnostics;
pub mod errors;
pub mod locator;
pub mod lyrics;
pub mod models;
pub mod orchestrator;
pub mod planner;
pub mod resolver;
pub mod runner;
pub mod search;
pub mod tools;
pub mod utils;

pub use errors::DownloadError;
pub use locator::SourceLocator;
pub use lyrics::{LrcLibClient, Lyrics, LyricsProvider};
pub use models::{
    DownloadProgress, ExecutionResult, NetworkConfig, OutputKind, ResolutionSource, ResolvedArtifact,
    VideoSummary,
};
pub use orchestrator::Downloader;
pub use planner::{plan, DownloadStrategy, Invocation};
pub use runner::{ProcessRunner, ProgressEmitter, YtDlpRunner};
pub use search::{SearchProvider, YtDlpSearch};
