// Orchestrator with fallback logic
//
// validate locator -> ensure output dir -> plan -> run/resolve each strategy
// in order -> first success wins. When the first strategy fails like an
// outdated extractor, update yt-dlp once and make one more pass.

use std::path::Path;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::diagnostics::{diagnose_error, BlockingReason};
use super::errors::DownloadError;
use super::locator::SourceLocator;
use super::models::{ExecutionResult, NetworkConfig, OutputKind, ResolvedArtifact};
use super::planner::{plan, DownloadStrategy};
use super::resolver::resolve;
use super::runner::ProcessRunner;

pub struct Downloader {
    runner: Arc<dyn ProcessRunner>,
    network: NetworkConfig,
    auto_update: bool,
}

/// How a full pass over the plan ended without a file
enum PassFailure {
    /// Stop immediately, no further passes
    Fatal(DownloadError),
    Exhausted {
        attempts: usize,
        last: DownloadError,
        outdated: bool,
    },
}

impl Downloader {
    pub fn new(runner: Arc<dyn ProcessRunner>) -> Self {
        Self {
            runner,
            network: NetworkConfig::default(),
            auto_update: false,
        }
    }

    pub fn with_network(mut self, network: NetworkConfig) -> Self {
        self.network = network;
        self
    }

    /// Allow one `self_update()` and a second pass when the first strategy
    /// fails because yt-dlp looks outdated.
    pub fn with_auto_update(mut self, enabled: bool) -> Self {
        self.auto_update = enabled;
        self
    }

    pub async fn download(
        &self,
        locator: &str,
        kind: OutputKind,
        output_dir: &Path,
    ) -> Result<ResolvedArtifact, DownloadError> {
        self.download_with_cancel(locator, kind, output_dir, &CancellationToken::new())
            .await
    }

    pub async fn download_with_cancel(
        &self,
        locator: &str,
        kind: OutputKind,
        output_dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<ResolvedArtifact, DownloadError> {
        let locator = SourceLocator::parse(locator)?;
        self.download_locator(&locator, kind, output_dir, cancel).await
    }

    /// Same as [`Downloader::download_with_cancel`] for an already validated locator.
    pub async fn download_locator(
        &self,
        locator: &SourceLocator,
        kind: OutputKind,
        output_dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<ResolvedArtifact, DownloadError> {
        tokio::fs::create_dir_all(output_dir).await?;

        let strategies = plan(kind);
        tracing::info!(
            "[Downloader] {} as {} into {} ({} strategies)",
            locator,
            kind,
            output_dir.display(),
            strategies.len()
        );

        let first = match self.run_pass(&strategies, locator, kind, output_dir, cancel).await {
            Ok(artifact) => return Ok(artifact),
            Err(PassFailure::Fatal(e)) => return Err(e),
            Err(PassFailure::Exhausted {
                attempts,
                last,
                outdated,
            }) => {
                if !(outdated && self.auto_update) {
                    return Err(exhausted(attempts, last));
                }
                (attempts, last)
            }
        };

        tracing::info!("[Downloader] yt-dlp looks outdated, updating before one more pass");
        match self.runner.self_update().await {
            Ok(summary) => tracing::info!("[Downloader] {}", summary),
            Err(e) => {
                tracing::warn!("[Downloader] Self-update failed: {}", e);
                return Err(exhausted(first.0, first.1));
            }
        }

        match self.run_pass(&strategies, locator, kind, output_dir, cancel).await {
            Ok(artifact) => Ok(artifact),
            Err(PassFailure::Fatal(e)) => Err(e),
            Err(PassFailure::Exhausted { attempts, last, .. }) => {
                Err(exhausted(first.0 + attempts, last))
            }
        }
    }

    async fn run_pass(
        &self,
        strategies: &[DownloadStrategy],
        locator: &SourceLocator,
        kind: OutputKind,
        output_dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<ResolvedArtifact, PassFailure> {
        let mut last = None;
        let mut outdated = false;

        for (idx, strategy) in strategies.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(PassFailure::Fatal(DownloadError::Cancelled));
            }

            let invocation = strategy.bind(locator, output_dir, &self.network);
            tracing::info!("[Downloader] Trying strategy {}", invocation.label);

            let error = match self.runner.run(&invocation, cancel).await {
                Ok(result) => match resolve_blocking(result, output_dir, locator.video_id(), kind).await {
                    Ok(artifact) => {
                        tracing::info!(
                            "[Downloader] ✓ {} produced {} ({:?})",
                            invocation.label,
                            artifact.path.display(),
                            artifact.source
                        );
                        return Ok(artifact);
                    }
                    Err(e) => e,
                },
                Err(e) if e.is_fatal() => {
                    tracing::error!("[Downloader] ✗ {}: {}", invocation.label, e);
                    return Err(PassFailure::Fatal(e));
                }
                Err(e) => e,
            };

            match diagnose_error(&error.diagnostic_text()) {
                Some(reason) => {
                    if idx == 0 {
                        outdated = reason == BlockingReason::OutdatedExtractor;
                    }
                    tracing::warn!(
                        "[Downloader] ✗ {} failed: {} [{}; {}]",
                        invocation.label,
                        error,
                        reason.description(),
                        reason.suggestion()
                    );
                }
                None => tracing::warn!("[Downloader] ✗ {} failed: {}", invocation.label, error),
            }
            last = Some(error);
        }

        match last {
            Some(last) => Err(PassFailure::Exhausted {
                attempts: strategies.len(),
                last,
                outdated,
            }),
            None => Err(PassFailure::Fatal(DownloadError::ArtifactNotFound {
                dir: output_dir.to_path_buf(),
                detail: "no strategies planned".to_string(),
            })),
        }
    }
}

/// Resolution touches the filesystem, so it runs off the async workers.
async fn resolve_blocking(
    result: ExecutionResult,
    output_dir: &Path,
    video_id: &str,
    kind: OutputKind,
) -> Result<ResolvedArtifact, DownloadError> {
    let output_dir = output_dir.to_path_buf();
    let video_id = video_id.to_string();
    tokio::task::spawn_blocking(move || resolve(&result, &output_dir, &video_id, kind))
        .await
        .map_err(|e| DownloadError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?
}

fn exhausted(attempts: usize, last: DownloadError) -> DownloadError {
    tracing::error!("[Downloader] All {} attempts failed", attempts);
    DownloadError::AllStrategiesExhausted {
        attempts,
        last: Box::new(last),
    }
}
