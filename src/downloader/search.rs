// Search provider - `yt-dlp ytsearchN:` with flat JSON output

use std::path::PathBuf;

use async_trait::async_trait;

use super::errors::DownloadError;
use super::models::{NetworkConfig, VideoSummary};
use super::utils::{format_duration, get_proxy_args, get_timeout_args, run_output_with_timeout};

pub const MAX_RESULTS: usize = 25;
pub const DEFAULT_RESULTS: usize = 5;

#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<VideoSummary>, DownloadError>;
}

pub struct YtDlpSearch {
    program: PathBuf,
    network: NetworkConfig,
    timeout_secs: u64,
}

impl YtDlpSearch {
    pub fn new(program: impl Into<PathBuf>, network: NetworkConfig) -> Self {
        Self {
            program: program.into(),
            network,
            timeout_secs: 60,
        }
    }

    fn args(&self, query: &str, max_results: usize) -> Vec<String> {
        let mut args = vec![
            "--dump-json".to_string(),
            "--flat-playlist".to_string(),
            "--no-warnings".to_string(),
        ];
        args.extend(get_timeout_args(&self.network));
        args.extend(get_proxy_args(&self.network));
        args.push(format!("ytsearch{}:{}", clamp_results(max_results), query.trim()));
        args
    }
}

#[async_trait]
impl SearchProvider for YtDlpSearch {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<VideoSummary>, DownloadError> {
        if query.trim().is_empty() {
            return Err(DownloadError::Search("query is empty".to_string()));
        }

        tracing::info!("[Search] \"{}\" (max {})", query.trim(), clamp_results(max_results));
        let result = run_output_with_timeout(&self.program, self.args(query, max_results), self.timeout_secs)
            .await?;

        // yt-dlp exits nonzero when some entries fail but still prints the rest
        if !result.success() && result.stdout.trim().is_empty() {
            tracing::warn!("[Search] yt-dlp failed: {}", result.stderr.trim());
            return Err(DownloadError::Search(
                result.stderr.lines().last().unwrap_or("yt-dlp search failed").to_string(),
            ));
        }

        let results = parse_search_output(&result.stdout)?;
        tracing::info!("[Search] {} result(s)", results.len());
        Ok(results)
    }
}

pub fn clamp_results(max_results: usize) -> usize {
    max_results.clamp(1, MAX_RESULTS)
}

/// Parse one JSON object per line. Lines that are not objects are skipped; a
/// malformed object fails the whole batch.
pub fn parse_search_output(stdout: &str) -> Result<Vec<VideoSummary>, DownloadError> {
    let mut results = Vec::new();

    for line in stdout.lines().map(str::trim).filter(|l| l.starts_with('{')) {
        let json: serde_json::Value = serde_json::from_str(line)
            .map_err(|e| DownloadError::Parse(format!("Failed to parse search JSON: {}", e)))?;

        let id = match json["id"].as_str() {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => continue,
        };

        let duration_seconds = json["duration"].as_f64().map(|d| d.max(0.0).round() as u64);
        let url = json["webpage_url"]
            .as_str()
            .or_else(|| json["url"].as_str())
            .filter(|u| u.starts_with("http"))
            .map(str::to_string)
            .unwrap_or_else(|| format!("https://www.youtube.com/watch?v={}", id));

        // Flat entries carry a thumbnails list; full entries a single thumbnail
        let thumbnail = json["thumbnails"]
            .as_array()
            .and_then(|t| t.last())
            .and_then(|t| t["url"].as_str())
            .or_else(|| json["thumbnail"].as_str())
            .map(str::to_string);

        results.push(VideoSummary {
            title: json["title"].as_str().unwrap_or("Unknown").to_string(),
            url,
            duration: duration_seconds.map(format_duration),
            duration_seconds,
            channel: json["channel"]
                .as_str()
                .or_else(|| json["uploader"].as_str())
                .unwrap_or("Unknown")
                .to_string(),
            views: json["view_count"].as_u64(),
            thumbnail,
            id,
        });
    }

    Ok(results)
}
