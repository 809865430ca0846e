// Process runner - one yt-dlp process per strategy

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use regex::Regex;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::errors::DownloadError;
use super::models::{DownloadProgress, ExecutionResult};
use super::planner::Invocation;
use super::tools;
use super::utils::spawn_error;

/// Trait for anything that can execute a bound strategy
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Name of the runner (for logging)
    fn name(&self) -> &'static str;

    /// Spawn the process and wait for it, capturing output.
    ///
    /// Returns `Ok` for any exit status; only spawn errors, I/O errors and
    /// cancellation are `Err`.
    async fn execute(
        &self,
        invocation: &Invocation,
        cancel: &CancellationToken,
    ) -> Result<ExecutionResult, DownloadError>;

    /// Execute and classify: exit status zero is success, anything else a tool failure.
    async fn run(
        &self,
        invocation: &Invocation,
        cancel: &CancellationToken,
    ) -> Result<ExecutionResult, DownloadError> {
        self.execute(invocation, cancel).await?.into_success()
    }

    /// Try to bring the underlying tool up to date
    async fn self_update(&self) -> Result<String, DownloadError> {
        Err(DownloadError::ToolUnavailable(format!(
            "{} cannot update itself",
            self.name()
        )))
    }
}

/// Progress side channel: always logged, optionally forwarded
#[derive(Debug, Clone, Default)]
pub struct ProgressEmitter {
    sender: Option<mpsc::UnboundedSender<DownloadProgress>>,
}

impl ProgressEmitter {
    pub fn new(sender: mpsc::UnboundedSender<DownloadProgress>) -> Self {
        Self {
            sender: Some(sender),
        }
    }

    pub fn emit(&self, progress: DownloadProgress) {
        tracing::debug!("[yt-dlp] {:.1}% {}", progress.percent, progress.status);
        if let Some(sender) = &self.sender {
            let _ = sender.send(progress);
        }
    }
}

/// Parse yt-dlp progress line like:
/// [download]   6.2% of ~ 343.72MiB at  420.30KiB/s ETA 12:32 (frag 29/454)
/// Returns (percent, status_string)
pub fn parse_ytdlp_progress(line: &str) -> Option<(f32, String)> {
    lazy_static::lazy_static! {
        static ref PROGRESS_RE: Regex = Regex::new(
            r"\[download\]\s+(\d+\.?\d*)%\s+of\s+~?\s*(\d+\.?\d*\s*\w+)(?:\s+at\s+(\S+(?:\s*\w+/s)?))?(?:\s+ETA\s+(\S+))?"
        ).unwrap();
        static ref MERGE_RE: Regex = Regex::new(r"\[Merger?\]\s+Merging").unwrap();
        static ref EXTRACT_RE: Regex = Regex::new(r"\[ExtractAudio\]\s+Destination").unwrap();
        static ref ALREADY_RE: Regex = Regex::new(r"has already been downloaded").unwrap();
    }

    if let Some(caps) = PROGRESS_RE.captures(line) {
        let percent: f32 = caps.get(1)?.as_str().parse().ok()?;
        let size = caps.get(2).map(|m| m.as_str()).unwrap_or("?");
        let status = match (caps.get(3), caps.get(4)) {
            (Some(speed), Some(eta)) => {
                format!("{:.1}% of {} @ {} ETA {}", percent, size, speed.as_str(), eta.as_str())
            }
            (Some(speed), None) => format!("{:.1}% of {} @ {}", percent, size, speed.as_str()),
            _ => format!("{:.1}% of {}", percent, size),
        };
        return Some((percent, status));
    }

    if MERGE_RE.is_match(line) {
        return Some((99.0, "Merging video and audio...".to_string()));
    }

    if EXTRACT_RE.is_match(line) {
        return Some((99.0, "Converting to mp3...".to_string()));
    }

    if ALREADY_RE.is_match(line) {
        return Some((100.0, "File already downloaded".to_string()));
    }

    None
}

/// Runner backed by the yt-dlp binary
pub struct YtDlpRunner {
    program: PathBuf,
    emitter: ProgressEmitter,
    update_timeout_secs: u64,
}

impl YtDlpRunner {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            emitter: ProgressEmitter::default(),
            update_timeout_secs: 300,
        }
    }

    /// Use the configured path, else look in the usual install locations.
    pub fn locate(configured: Option<&Path>) -> Self {
        Self::new(tools::find_ytdlp(configured))
    }

    pub fn with_progress(mut self, emitter: ProgressEmitter) -> Self {
        self.emitter = emitter;
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

#[async_trait]
impl ProcessRunner for YtDlpRunner {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    async fn execute(
        &self,
        invocation: &Invocation,
        cancel: &CancellationToken,
    ) -> Result<ExecutionResult, DownloadError> {
        tracing::debug!(
            "[Runner] {} {} {}",
            invocation.label,
            self.program.display(),
            invocation.args.join(" ")
        );

        // kill_on_drop releases the process on every exit path: cancellation,
        // a dropped future, or an error while collecting output.
        let mut command = Command::new(&self.program);
        command
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);
        let mut child = command.spawn().map_err(|e| spawn_error(&self.program, e))?;
        // Declared after `child` so it drops first, while the group leader still exists
        let mut group = ProcessGroupGuard::new(child.id());

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| DownloadError::ToolUnavailable("Failed to capture stdout".to_string()))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| DownloadError::ToolUnavailable("Failed to capture stderr".to_string()))?;

        let emitter = &self.emitter;
        let collect = async {
            let read_stderr = async {
                let mut buf = Vec::new();
                stderr.read_to_end(&mut buf).await?;
                Ok::<_, std::io::Error>(String::from_utf8_lossy(&buf).to_string())
            };
            let (stdout_text, stderr_text, status) =
                tokio::try_join!(read_lines(stdout, emitter), read_stderr, child.wait())?;
            Ok::<_, std::io::Error>(ExecutionResult {
                code: status.code(),
                stdout: stdout_text,
                stderr: stderr_text,
            })
        };

        tokio::select! {
            result = collect => {
                let result = result?;
                group.disarm();
                tracing::debug!("[Runner] {} exited with {:?}", invocation.label, result.code);
                Ok(result)
            }
            _ = cancel.cancelled() => {
                tracing::info!("[Runner] {} cancelled, killing yt-dlp", invocation.label);
                Err(DownloadError::Cancelled)
            }
        }
    }

    async fn self_update(&self) -> Result<String, DownloadError> {
        tools::update_ytdlp(&self.program, self.update_timeout_secs).await
    }
}

/// Kills the whole process group of a running yt-dlp when dropped.
///
/// `kill_on_drop` only reaches yt-dlp itself; ffmpeg children spawned for
/// extraction or merging share its group and would otherwise keep running.
struct ProcessGroupGuard {
    pgid: Option<u32>,
}

impl ProcessGroupGuard {
    fn new(pgid: Option<u32>) -> Self {
        Self {
            pgid: if cfg!(unix) { pgid } else { None },
        }
    }

    fn disarm(&mut self) {
        self.pgid = None;
    }
}

impl Drop for ProcessGroupGuard {
    fn drop(&mut self) {
        let Some(pgid) = self.pgid.take() else {
            return;
        };
        tracing::debug!("[Runner] Killing process group {}", pgid);
        let killed = std::process::Command::new("kill")
            .args(["-KILL", "--", &format!("-{}", pgid)])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
        if let Err(e) = killed {
            tracing::warn!("[Runner] Could not kill process group {}: {}", pgid, e);
        }
    }
}

/// Accumulate stdout, relaying progress lines as they arrive.
async fn read_lines<R: AsyncRead + Unpin>(
    reader: R,
    emitter: &ProgressEmitter,
) -> std::io::Result<String> {
    let mut reader = BufReader::new(reader);
    let mut text = String::new();
    let mut line = Vec::new();

    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line).await? == 0 {
            break;
        }
        let decoded = String::from_utf8_lossy(&line);
        if let Some((percent, status)) = parse_ytdlp_progress(decoded.trim_end()) {
            emitter.emit(DownloadProgress { percent, status });
        }
        text.push_str(&decoded);
    }

    Ok(text)
}
