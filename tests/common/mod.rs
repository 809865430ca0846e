#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use visualizer_downloader_lib::downloader::{
    DownloadError, ExecutionResult, Invocation, ProcessRunner,
};

/// What the scripted runner does for one call
pub enum Step {
    /// Exit nonzero with this stderr
    Fail(&'static str),
    /// Exit 0, optionally creating `file` in the output dir. `{dir}` in stdout
    /// is replaced with the output dir.
    Succeed {
        stdout: &'static str,
        file: Option<&'static str>,
    },
    /// Spawning fails
    Unavailable,
    /// Block until cancelled
    Hang,
}

pub struct ScriptedRunner {
    steps: Mutex<VecDeque<Step>>,
    calls: Mutex<Vec<Invocation>>,
    updates: AtomicUsize,
    update_ok: bool,
}

impl ScriptedRunner {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps: Mutex::new(steps.into()),
            calls: Mutex::new(Vec::new()),
            updates: AtomicUsize::new(0),
            update_ok: true,
        }
    }

    pub fn failing_update(mut self) -> Self {
        self.update_ok = false;
        self
    }

    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn updates(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProcessRunner for ScriptedRunner {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn execute(
        &self,
        invocation: &Invocation,
        cancel: &CancellationToken,
    ) -> Result<ExecutionResult, DownloadError> {
        self.calls.lock().unwrap().push(invocation.clone());
        let step = self
            .steps
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Step::Fail("ERROR: script exhausted"));

        match step {
            Step::Fail(stderr) => Ok(ExecutionResult {
                code: Some(1),
                stdout: String::new(),
                stderr: stderr.to_string(),
            }),
            Step::Succeed { stdout, file } => {
                if let Some(file) = file {
                    std::fs::write(invocation.output_dir.join(file), b"media").unwrap();
                }
                Ok(ExecutionResult {
                    code: Some(0),
                    stdout: stdout.replace("{dir}", &invocation.output_dir.to_string_lossy()),
                    stderr: String::new(),
                })
            }
            Step::Unavailable => Err(DownloadError::ToolUnavailable("yt-dlp: not found".to_string())),
            Step::Hang => {
                cancel.cancelled().await;
                Err(DownloadError::Cancelled)
            }
        }
    }

    async fn self_update(&self) -> Result<String, DownloadError> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        if self.update_ok {
            Ok("Updated yt-dlp to stable@2099.01.01".to_string())
        } else {
            Err(DownloadError::ToolFailure {
                code: Some(1),
                stderr: "ERROR: cannot update".to_string(),
            })
        }
    }
}

pub fn touch(path: &Path) {
    std::fs::write(path, b"media").unwrap();
}
