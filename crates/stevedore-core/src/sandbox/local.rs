//! Sandbox implementation backed by a local directory.
//!
//! Commands run with the application directory as their working
//! directory; stdout and stderr are drained line-by-line on separate
//! tasks so callers observe partial progress before the command exits.

use super::{ExecRequest, ExecResult, LineSender, OutputLine, OutputSource, Sandbox, SandboxError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::SystemTime;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tracing::debug;

/// Exit code reported for commands killed on timeout (shell
/// convention).
const TIMEOUT_EXIT_CODE: i32 = 124;

/// A target environment rooted at a local directory.
#[derive(Debug, Clone)]
pub struct LocalSandbox {
    root: PathBuf,
}

impl LocalSandbox {
    /// Bind to an existing application directory.
    ///
    /// # Errors
    /// Returns `SandboxError::RootNotFound` when the directory does
    /// not exist; an unreachable environment is a pre-flight failure,
    /// not something to recover from mid-stream.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, SandboxError> {
        let root = root.into();
        if !root.is_dir() {
            return Err(SandboxError::RootNotFound(root.display().to_string()));
        }
        Ok(Self { root })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        // Path::join replaces the base when `path` is absolute.
        self.root.join(path)
    }
}

/// Read lines from one child stream, forwarding each to `lines` as it
/// arrives and collecting the full text.
async fn drain<R>(reader: R, source: OutputSource, lines: Option<LineSender>) -> String
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader).lines();
    let mut collected = String::new();
    while let Ok(Some(line)) = reader.next_line().await {
        if let Some(tx) = &lines {
            let _ = tx.send(OutputLine {
                source,
                text: line.clone(),
            });
        }
        collected.push_str(&line);
        collected.push('\n');
    }
    collected
}

#[async_trait]
impl Sandbox for LocalSandbox {
    async fn exec(
        &self,
        req: &ExecRequest,
        lines: Option<LineSender>,
    ) -> Result<ExecResult, SandboxError> {
        let mut command = tokio::process::Command::new(&req.program);
        command
            .args(&req.args)
            .current_dir(&self.root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // If this future is cancelled mid-run, the child must not
            // outlive it and keep mutating the environment.
            .kill_on_drop(true);
        for (key, value) in &req.env {
            command.env(key, value);
        }

        let mut child = command.spawn().map_err(|source| SandboxError::Spawn {
            program: req.program.clone(),
            source,
        })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| SandboxError::Io(std::io::Error::other("child stdout not captured")))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| SandboxError::Io(std::io::Error::other("child stderr not captured")))?;

        let out_task = tokio::spawn(drain(stdout, OutputSource::Stdout, lines.clone()));
        let err_task = tokio::spawn(drain(stderr, OutputSource::Stderr, lines));

        let (exit_code, timed_out) = match tokio::time::timeout(req.timeout, child.wait()).await {
            Ok(Ok(status)) => (status.code().unwrap_or(-1), false),
            Ok(Err(err)) => return Err(SandboxError::Io(err)),
            Err(_) => {
                debug!(command = %req.command_line(), timeout = ?req.timeout, "command timed out, killing");
                let _ = child.start_kill();
                let _ = child.wait().await;
                (TIMEOUT_EXIT_CODE, true)
            }
        };

        // Readers finish at EOF once the child is gone.
        let stdout = out_task.await.unwrap_or_default();
        let stderr = err_task.await.unwrap_or_default();

        Ok(ExecResult {
            exit_code,
            stdout,
            stderr,
            timed_out,
        })
    }

    async fn read_file(&self, path: &Path) -> Result<String, SandboxError> {
        Ok(tokio::fs::read_to_string(self.resolve(path)).await?)
    }

    async fn write_file(&self, path: &Path, contents: &str) -> Result<(), SandboxError> {
        let path = self.resolve(path);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(tokio::fs::write(path, contents).await?)
    }

    async fn touch(&self, path: &Path) -> Result<(), SandboxError> {
        let path = self.resolve(path);
        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        let file = file.into_std().await;
        file.set_modified(SystemTime::now())?;
        Ok(())
    }

    async fn spawn_detached(&self, req: &ExecRequest) -> Result<u32, SandboxError> {
        let mut command = tokio::process::Command::new(&req.program);
        command
            .args(&req.args)
            .current_dir(&self.root)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(false);
        for (key, value) in &req.env {
            command.env(key, value);
        }

        let child = command.spawn().map_err(|source| SandboxError::Spawn {
            program: req.program.clone(),
            source,
        })?;
        let pid = child
            .id()
            .ok_or_else(|| SandboxError::Io(std::io::Error::other("detached child exited before pid was read")))?;
        debug!(command = %req.command_line(), pid, "spawned detached process");
        // Dropping the handle leaves the process running; the runtime
        // reaps it when it exits.
        drop(child);
        Ok(pid)
    }

    async fn signal(&self, pid: u32) -> Result<(), SandboxError> {
        let req = ExecRequest::new("kill", [pid.to_string()]);
        let result = self.exec(&req, None).await?;
        if !result.success() {
            debug!(pid, "kill reported no such process, ignoring");
        }
        Ok(())
    }

    async fn kill_by_pattern(&self, pattern: &str) -> Result<(), SandboxError> {
        let req = ExecRequest::new("pkill", ["-f", pattern]);
        let result = self.exec(&req, None).await?;
        if !result.success() {
            debug!(pattern, "pkill matched nothing, ignoring");
        }
        Ok(())
    }
}
