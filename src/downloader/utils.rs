// Helper functions shared by the runner, search and tool management

use std::io::ErrorKind;
use std::path::Path;
use std::process::Stdio;

use tokio::io::AsyncReadExt;
use tokio::process::Command as TokioCommand;
use tokio::time::{timeout, Duration as TokioDuration};

use super::errors::DownloadError;
use super::models::{ExecutionResult, NetworkConfig};

/// Run a short-lived command with timeout and capture its output.
///
/// Used for `--version`, `-U` and search calls; long downloads go through the
/// runner, which streams progress instead.
pub async fn run_output_with_timeout(
    program: &Path,
    args: Vec<String>,
    timeout_secs: u64,
) -> Result<ExecutionResult, DownloadError> {
    let mut child = TokioCommand::new(program)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| spawn_error(program, e))?;

    let mut stdout_pipe = child.stdout.take().ok_or_else(|| {
        DownloadError::ToolUnavailable(format!("Failed to capture stdout from {}", program.display()))
    })?;
    let mut stderr_pipe = child.stderr.take().ok_or_else(|| {
        DownloadError::ToolUnavailable(format!("Failed to capture stderr from {}", program.display()))
    })?;

    let collect = async {
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let (_, _, status) = tokio::try_join!(
            stdout_pipe.read_to_end(&mut stdout),
            stderr_pipe.read_to_end(&mut stderr),
            child.wait(),
        )?;
        Ok::<_, std::io::Error>(ExecutionResult {
            code: status.code(),
            stdout: String::from_utf8_lossy(&stdout).to_string(),
            stderr: String::from_utf8_lossy(&stderr).to_string(),
        })
    };

    match timeout(TokioDuration::from_secs(timeout_secs), collect).await {
        Ok(result) => Ok(result?),
        // `child` is dropped on return and kill_on_drop reaps it
        Err(_) => Err(DownloadError::ToolFailure {
            code: None,
            stderr: format!("Timed out after {}s", timeout_secs),
        }),
    }
}

/// Map a spawn error, treating "not found" as a missing tool.
pub fn spawn_error(program: &Path, err: std::io::Error) -> DownloadError {
    if err.kind() == ErrorKind::NotFound {
        DownloadError::ToolUnavailable(format!("{}: {}", program.display(), err))
    } else {
        DownloadError::Io(err)
    }
}

/// Build proxy arguments for yt-dlp
pub fn get_proxy_args(config: &NetworkConfig) -> Vec<String> {
    let mut args = Vec::new();

    if let Some(proxy) = &config.proxy {
        args.push("--proxy".to_string());
        args.push(proxy.clone());
    }

    args
}

/// Build timeout arguments for yt-dlp
pub fn get_timeout_args(config: &NetworkConfig) -> Vec<String> {
    let mut args = Vec::new();

    if let Some(timeout) = config.timeout {
        args.push("--socket-timeout".to_string());
        args.push(timeout.to_string());
    }

    args
}

/// Build cookie arguments for yt-dlp
pub fn get_cookie_args(config: &NetworkConfig) -> Vec<String> {
    match &config.cookies_path {
        Some(path) => vec!["--cookies".to_string(), path.to_string_lossy().to_string()],
        None => Vec::new(),
    }
}

/// `m:ss`, or `h:mm:ss` past the hour
pub fn format_duration(duration_secs: u64) -> String {
    let hours = duration_secs / 3600;
    let minutes = (duration_secs % 3600) / 60;
    let seconds = duration_secs % 60;
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}
