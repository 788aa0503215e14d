//! Subprocess plumbing for the external audio tools.

use std::ffi::OsString;
use std::process::Stdio;

use castkit_common::error::{CastError, CastResult};
use tokio::process::Command;

/// Captured output of a finished tool invocation.
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Run `program` with an explicit argument list and wait for it.
///
/// A non-zero exit is a processing failure carrying the tail of stderr. The
/// child is killed if the returned future is dropped, so an aborted job does
/// not leave ffmpeg running.
pub async fn run_tool(program: &str, args: &[OsString]) -> CastResult<ToolOutput> {
    tracing::debug!(program, args = ?args, "Running external tool");
    let started = std::time::Instant::now();

    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| CastError::processing(format!("Failed to start {program}: {e}")))?;

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

    if !output.status.success() {
        return Err(CastError::processing(format!(
            "{program} failed ({}): {}",
            output.status,
            stderr_tail(&stderr, 20)
        )));
    }

    tracing::debug!(
        program,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "External tool finished"
    );
    Ok(ToolOutput { stdout, stderr })
}

/// Whether `binary` is an executable path or resolves on `PATH`. The name is
/// never handed to a shell.
pub fn command_exists(binary: &str) -> bool {
    !binary.is_empty() && which::which(binary).is_ok()
}

/// Last `lines` non-empty lines of a tool's stderr.
fn stderr_tail(stderr: &str, lines: usize) -> String {
    let kept: Vec<&str> = stderr
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    let start = kept.len().saturating_sub(lines);
    kept[start..].join("\n")
}

/// Small builder so argument lists read like the command line they produce.
#[derive(Debug, Default, Clone)]
pub struct Args(Vec<OsString>);

impl Args {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arg(mut self, value: impl Into<OsString>) -> Self {
        self.0.push(value.into());
        self
    }

    pub fn args<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.0.extend(values.into_iter().map(Into::into));
        self
    }

    pub fn as_slice(&self) -> &[OsString] {
        &self.0
    }
}
