//! The target-environment collaborator.
//!
//! The orchestrator never talks to the operating system directly; it
//! drives a [`Sandbox`], which knows how to execute commands with a
//! timeout, read and write files, and start/stop processes inside the
//! target environment. [`LocalSandbox`] implements the contract
//! against a local directory; remote environments implement the same
//! trait in their own crates.

mod local;

pub use local::LocalSandbox;

use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

/// Transport-level sandbox failure. Anything that happens *inside* a
/// successfully executed command is reported through [`ExecResult`]
/// instead.
#[derive(Error, Debug)]
pub enum SandboxError {
    #[error("sandbox IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("sandbox root not found: {0}")]
    RootNotFound(String),

    #[error("failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Which stream a live output line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputSource {
    Stdout,
    Stderr,
}

/// One line of live subprocess output.
#[derive(Debug, Clone)]
pub struct OutputLine {
    pub source: OutputSource,
    pub text: String,
}

/// Channel for observing output lines while a command runs.
pub type LineSender = mpsc::UnboundedSender<OutputLine>;

/// A command to execute inside the sandbox.
#[derive(Debug, Clone)]
pub struct ExecRequest {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub timeout: Duration,
}

impl ExecRequest {
    pub fn new<S: Into<String>, I: IntoIterator<Item = S>>(program: impl Into<String>, args: I) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            env: Vec::new(),
            timeout: Duration::from_secs(60),
        }
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// The command as a single display string, for logs and status
    /// lines.
    #[must_use]
    pub fn command_line(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

/// Outcome of an executed (possibly timed-out) command.
#[derive(Debug, Clone, Default)]
pub struct ExecResult {
    /// Process exit code; `124` for a timed-out command, `-1` when the
    /// process was terminated by a signal.
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    /// The command exceeded its timeout and was killed.
    pub timed_out: bool,
}

impl ExecResult {
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == 0 && !self.timed_out
    }

    /// Stdout followed by stderr, newline-joined.
    #[must_use]
    pub fn combined(&self) -> String {
        match (self.stdout.is_empty(), self.stderr.is_empty()) {
            (false, false) => format!("{}\n{}", self.stdout.trim_end(), self.stderr.trim_end()),
            (false, true) => self.stdout.trim_end().to_string(),
            (true, _) => self.stderr.trim_end().to_string(),
        }
    }
}

/// Execution-environment contract: run commands with a
/// caller-specified timeout, expose files at known paths, and allow
/// arbitrary process start/stop.
///
/// Relative paths are resolved against the sandbox's application
/// directory; absolute paths are used as-is.
#[async_trait]
pub trait Sandbox: Send + Sync {
    /// Execute a command to completion (or timeout), streaming output
    /// lines to `lines` as they arrive when a sender is given.
    ///
    /// A timeout is not a transport error: it yields an `ExecResult`
    /// with `timed_out` set so the surrounding flow can proceed.
    async fn exec(
        &self,
        req: &ExecRequest,
        lines: Option<LineSender>,
    ) -> Result<ExecResult, SandboxError>;

    async fn read_file(&self, path: &Path) -> Result<String, SandboxError>;

    async fn write_file(&self, path: &Path, contents: &str) -> Result<(), SandboxError>;

    /// Update a file's modification timestamp (creating it if absent),
    /// to nudge file watchers.
    async fn touch(&self, path: &Path) -> Result<(), SandboxError>;

    /// Launch a process detached from the caller's lifetime and return
    /// its pid.
    async fn spawn_detached(&self, req: &ExecRequest) -> Result<u32, SandboxError>;

    /// Ask a process to terminate. "Not found" and "already dead" are
    /// non-errors.
    async fn signal(&self, pid: u32) -> Result<(), SandboxError>;

    /// Forcibly terminate every process matching an invocation
    /// pattern. Matching nothing is a non-error.
    async fn kill_by_pattern(&self, pattern: &str) -> Result<(), SandboxError>;
}
