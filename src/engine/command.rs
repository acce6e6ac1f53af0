//! Subprocess execution with hard deadlines.
//!
//! The `CommandRunner` trait enables full testability without ffmpeg
//! installed: production code uses [`ProcessRunner`], tests use
//! [`MockRunner`].

use crate::defaults;
use crate::error::{Result, ScriptvoxError};
use std::path::Path;
use std::process::Stdio;
use std::sync::Mutex;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

/// Raw result of a finished command. Non-zero exits are not errors here.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CommandOutput {
    pub success: bool,
    pub status: String,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl CommandOutput {
    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }

    /// Turns a non-zero exit into [`ScriptvoxError::Engine`].
    pub fn into_checked(self, rendered: &str) -> Result<CommandOutput> {
        if self.success {
            return Ok(self);
        }
        Err(ScriptvoxError::Engine {
            command: rendered.to_string(),
            status: self.status.clone(),
            stderr: self.stderr_text().trim().to_string(),
        })
    }
}

/// Trait for running external programs.
///
/// Object-safe, Send + Sync for use across concurrent pipeline runs.
/// Implementations must enforce `timeout` and must not leave the process
/// running once it expires.
#[async_trait::async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `program` with `args`. `stage` labels timeout errors.
    async fn run(
        &self,
        program: &str,
        args: &[String],
        stage: &str,
        timeout: Duration,
    ) -> Result<CommandOutput>;
}

/// Production runner on top of `tokio::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(
        &self,
        program: &str,
        args: &[String],
        stage: &str,
        timeout: Duration,
    ) -> Result<CommandOutput> {
        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = command.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ScriptvoxError::EngineMissing {
                    command: program.to_string(),
                }
            } else {
                ScriptvoxError::Io(e)
            }
        })?;

        let stdout_task = tokio::spawn(read_pipe(child.stdout.take()));
        let stderr_task = tokio::spawn(read_pipe(child.stderr.take()));

        match tokio::time::timeout(timeout, child.wait()).await {
            Ok(status) => {
                let status = status?;
                let stdout = stdout_task.await.unwrap_or_default();
                let stderr = stderr_task.await.unwrap_or_default();
                Ok(CommandOutput {
                    success: status.success(),
                    status: status.to_string(),
                    stdout,
                    stderr,
                })
            }
            Err(_) => {
                if let Err(e) = child.kill().await {
                    tracing::debug!(program, error = %e, "Failed to kill timed out command");
                }
                stdout_task.abort();
                stderr_task.abort();
                Err(ScriptvoxError::timeout(stage, timeout))
            }
        }
    }
}

async fn read_pipe<R: AsyncRead + Unpin>(pipe: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe
        && let Err(e) = pipe.read_to_end(&mut buf).await
    {
        tracing::debug!(error = %e, "Failed to read command output");
    }
    buf
}

/// Renders a command line for logs and error messages.
pub fn render_command(program: &str, args: &[String]) -> String {
    format!("{} {}", program, args.join(" "))
}

/// Mock command runner for testing.
///
/// Records every invocation. Commands containing `-y` get their last
/// argument written as a short silent WAV, like ffmpeg would. ffprobe calls
/// answer with the configured probe output.
#[derive(Debug, Default)]
pub struct MockRunner {
    calls: Mutex<Vec<Vec<String>>>,
    failures: Mutex<Vec<String>>,
    probe_output: Mutex<Option<String>>,
    delay: Option<Duration>,
}

impl MockRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every command whose rendered line contains `needle`.
    pub fn fail_when(self, needle: &str) -> Self {
        if let Ok(mut failures) = self.failures.lock() {
            failures.push(needle.to_string());
        }
        self
    }

    /// Stdout returned to ffprobe calls.
    pub fn with_probe_output(self, output: &str) -> Self {
        if let Ok(mut probe) = self.probe_output.lock() {
            *probe = Some(output.to_string());
        }
        self
    }

    /// Sleep this long inside every command, subject to the timeout.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Every invocation as `[program, args...]`.
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Number of invocations whose rendered line contains `needle`.
    pub fn count_matching(&self, needle: &str) -> usize {
        self.calls()
            .iter()
            .filter(|call| call.join(" ").contains(needle))
            .count()
    }

    fn write_output(path: &Path) -> Result<()> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: defaults::SAMPLE_RATE,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec)
            .map_err(|e| ScriptvoxError::Other(format!("mock output: {}", e)))?;
        for _ in 0..defaults::SAMPLE_RATE / 10 {
            writer
                .write_sample(0i16)
                .map_err(|e| ScriptvoxError::Other(format!("mock output: {}", e)))?;
        }
        writer
            .finalize()
            .map_err(|e| ScriptvoxError::Other(format!("mock output: {}", e)))
    }
}

#[async_trait::async_trait]
impl CommandRunner for MockRunner {
    async fn run(
        &self,
        program: &str,
        args: &[String],
        stage: &str,
        timeout: Duration,
    ) -> Result<CommandOutput> {
        let mut call = vec![program.to_string()];
        call.extend(args.iter().cloned());
        let rendered = call.join(" ");
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }

        if let Some(delay) = self.delay {
            if delay > timeout {
                tokio::time::sleep(timeout).await;
                return Err(ScriptvoxError::timeout(stage, timeout));
            }
            tokio::time::sleep(delay).await;
        }

        let should_fail = self
            .failures
            .lock()
            .map(|f| f.iter().any(|needle| rendered.contains(needle.as_str())))
            .unwrap_or(false);
        if should_fail {
            return Ok(CommandOutput {
                success: false,
                status: "exit status: 1".to_string(),
                stdout: Vec::new(),
                stderr: b"mock failure".to_vec(),
            });
        }

        if program.ends_with("ffprobe") {
            let stdout = self
                .probe_output
                .lock()
                .ok()
                .and_then(|p| p.clone())
                .unwrap_or_default();
            return Ok(CommandOutput {
                success: true,
                status: "exit status: 0".to_string(),
                stdout: stdout.into_bytes(),
                stderr: Vec::new(),
            });
        }

        if args.iter().any(|a| a == "-y")
            && let Some(out) = args.last()
        {
            Self::write_output(Path::new(out))?;
        }

        Ok(CommandOutput {
            success: true,
            status: "exit status: 0".to_string(),
            stdout: Vec::new(),
            stderr: Vec::new(),
        })
    }
}
