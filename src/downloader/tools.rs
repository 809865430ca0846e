// Tool management - locating, probing and updating yt-dlp

use std::path::{Path, PathBuf};
use std::process::Command;

use serde::{Deserialize, Serialize};

use super::errors::DownloadError;
use super::utils::run_output_with_timeout;

const BINARY: &str = "yt-dlp";

/// Where yt-dlp usually lives when installed through Homebrew or a distro
const COMMON_PATHS: [&str; 3] = [
    "/opt/homebrew/bin/yt-dlp", // Homebrew on Apple Silicon
    "/usr/local/bin/yt-dlp",    // Homebrew on Intel Mac, pip --user on Linux
    "/usr/bin/yt-dlp",          // System installation
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInfo {
    pub available: bool,
    pub version: Option<String>,
    pub path: Option<String>,
}

/// Resolve the yt-dlp executable.
///
/// Order: configured path, common install paths, `which yt-dlp`, then the bare
/// name so the OS searches `PATH` at spawn time.
pub fn find_ytdlp(configured: Option<&Path>) -> PathBuf {
    if let Some(path) = configured {
        return path.to_path_buf();
    }

    for path in COMMON_PATHS {
        if Path::new(path).exists() {
            return PathBuf::from(path);
        }
    }

    if let Ok(output) = Command::new("which").arg(BINARY).output() {
        if output.status.success() {
            let found = String::from_utf8_lossy(&output.stdout).trim().to_string();
            if !found.is_empty() {
                return PathBuf::from(found);
            }
        }
    }

    PathBuf::from(BINARY)
}

/// Probe `program --version`. A missing or broken binary reports unavailable.
pub async fn tool_info(program: &Path) -> ToolInfo {
    match run_output_with_timeout(program, vec!["--version".to_string()], 10).await {
        Ok(result) if result.success() => ToolInfo {
            available: true,
            version: Some(result.stdout.trim().to_string()).filter(|v| !v.is_empty()),
            path: Some(program.to_string_lossy().to_string()),
        },
        Ok(result) => {
            tracing::warn!(
                "[Tools] {} --version exited with {:?}",
                program.display(),
                result.code
            );
            ToolInfo {
                available: false,
                version: None,
                path: Some(program.to_string_lossy().to_string()),
            }
        }
        Err(e) => {
            tracing::warn!("[Tools] {} not usable: {}", program.display(), e);
            ToolInfo {
                available: false,
                version: None,
                path: None,
            }
        }
    }
}

/// Package-manager command that upgrades yt-dlp on this machine
fn package_manager_update() -> (PathBuf, Vec<String>) {
    if Path::new("/opt/homebrew/bin/brew").exists() {
        (
            PathBuf::from("/opt/homebrew/bin/brew"),
            vec!["upgrade".to_string(), BINARY.to_string()],
        )
    } else {
        (
            PathBuf::from("pip3"),
            vec!["install".to_string(), "-U".to_string(), BINARY.to_string()],
        )
    }
}

/// Update yt-dlp in place.
///
/// Tries the binary's own `-U` first; installs managed by a package manager
/// refuse that, so fall back to brew or pip.
pub async fn update_ytdlp(program: &Path, timeout_secs: u64) -> Result<String, DownloadError> {
    tracing::info!("[Tools] Updating {}", program.display());

    let self_update = run_output_with_timeout(program, vec!["-U".to_string()], timeout_secs).await?;
    if self_update.success() {
        let summary = self_update
            .stdout
            .lines()
            .last()
            .unwrap_or("yt-dlp updated")
            .trim()
            .to_string();
        tracing::info!("[Tools] {}", summary);
        return Ok(summary);
    }

    tracing::warn!(
        "[Tools] yt-dlp -U failed ({}), trying package manager",
        self_update.stderr.lines().last().unwrap_or("no output")
    );

    let (manager, args) = package_manager_update();
    let result = run_output_with_timeout(&manager, args, timeout_secs)
        .await?
        .into_success()?;
    let summary = format!(
        "Updated through {}: {}",
        manager.display(),
        result.stdout.lines().last().unwrap_or("done").trim()
    );
    tracing::info!("[Tools] {}", summary);
    Ok(summary)
}
