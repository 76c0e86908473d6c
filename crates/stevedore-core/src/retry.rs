//! The bounded-retry install protocol.
//!
//! One known transient failure is recovered automatically: the package
//! manager refusing to install because its lockfile is out of sync
//! with the manifest. Recovery is a lockfile refresh followed by
//! exactly one re-run of the original command. This is a single-shot
//! retry, never a loop: the worst case stays bounded and a persistent
//! failure is not masked as a transient one.
//!
//! Everything the attempts print flows through the sink as classified
//! events while the commands run. Subprocess stderr is forwarded with
//! the `STDERR:` marker; the controller's own lifecycle lines use the
//! `STATUS:` / `WARNING:` / `ERROR:` markers.

use crate::classify::{
    ERROR_MARKER, OUTDATED_LOCKFILE, PEER_DEP_CONFLICT, RESOLUTION_CONFLICT, STATUS_MARKER,
    STDERR_MARKER, WARNING_MARKER,
};
use crate::config::InstallConfig;
use crate::event::ProgressSink;
use crate::sandbox::{ExecRequest, ExecResult, OutputSource, Sandbox, SandboxError};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Classification tags found in the final stderr. Messaging only;
/// tags never trigger retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictTag {
    PeerDependency,
    Resolution,
}

/// Final outcome of the install protocol.
#[derive(Debug, Clone)]
pub struct InstallRun {
    /// Exit code of the authoritative attempt (the re-run when
    /// recovery succeeded, the first attempt otherwise).
    pub exit_code: i32,
    /// Combined output of the authoritative attempt.
    pub output: String,
    /// Everything, all attempts concatenated in execution order.
    pub transcript: String,
    /// Conflict signatures found in the accumulated stderr.
    pub tags: Vec<ConflictTag>,
}

impl InstallRun {
    /// A run that never got off the ground (the install command could
    /// not be executed at all).
    #[must_use]
    pub fn not_executed() -> Self {
        Self {
            exit_code: -1,
            output: String::new(),
            transcript: String::new(),
            tags: Vec::new(),
        }
    }
}

/// Run the install command for `plan` with single-shot lockfile
/// recovery, streaming classified progress throughout.
///
/// # Errors
/// Returns `SandboxError` only when a command cannot be executed at
/// all; a command that runs and fails is a normal `InstallRun`.
pub async fn run_install(
    sandbox: &dyn Sandbox,
    plan: &[String],
    config: &InstallConfig,
    sink: &ProgressSink,
) -> Result<InstallRun, SandboxError> {
    let install_req = ExecRequest::new(
        &config.package_manager,
        std::iter::once("install".to_string()).chain(plan.iter().cloned()),
    )
    .timeout(config.install_timeout);

    sink.emit_line(&format!(
        "{STATUS_MARKER} Attempt 1: installing {}",
        plan.join(" ")
    ));
    let first = attempt(sandbox, &install_req, sink).await?;

    let mut transcript = first.combined();
    let mut stderr_all = first.stderr.clone();
    let mut authoritative = first;

    if !authoritative.success() && transcript.contains(OUTDATED_LOCKFILE) {
        sink.emit_line(&format!(
            "{WARNING_MARKER} Detected {OUTDATED_LOCKFILE}; refreshing the lockfile and retrying"
        ));

        let refresh_req = ExecRequest::new(&config.package_manager, ["install", "--no-frozen-lockfile"])
            .timeout(config.refresh_timeout);
        let refresh = attempt(sandbox, &refresh_req, sink).await?;
        append(&mut transcript, &refresh.combined());
        append(&mut stderr_all, &refresh.stderr);

        if refresh.success() {
            sink.emit_line(&format!(
                "{STATUS_MARKER} Lockfile refreshed; attempt 2: retrying package installation"
            ));
            let second = attempt(sandbox, &install_req, sink).await?;
            append(&mut transcript, &second.combined());
            append(&mut stderr_all, &second.stderr);
            authoritative = second;
        } else {
            // The original attempt stays the final result; the refresh
            // must not overwrite its exit code or output.
            warn!(exit_code = refresh.exit_code, "lockfile refresh failed");
            sink.emit_line(&format!(
                "{ERROR_MARKER} Lockfile refresh failed; keeping the original install result"
            ));
        }
    }

    let mut tags = Vec::new();
    if stderr_all.contains(PEER_DEP_CONFLICT) {
        tags.push(ConflictTag::PeerDependency);
        sink.emit_line(&format!(
            "{PEER_DEP_CONFLICT}: consider rerunning the install with --force"
        ));
    } else if stderr_all.contains(RESOLUTION_CONFLICT) {
        tags.push(ConflictTag::Resolution);
        sink.emit_line(&format!(
            "{RESOLUTION_CONFLICT}: consider rerunning the install with --legacy-peer-deps"
        ));
    }

    sink.emit_line(&format!(
        "{STATUS_MARKER} Installation completed with code {}",
        authoritative.exit_code
    ));

    Ok(InstallRun {
        exit_code: authoritative.exit_code,
        output: authoritative.combined(),
        transcript,
        tags,
    })
}

/// Execute one command, forwarding its output lines through the sink
/// as they arrive.
async fn attempt(
    sandbox: &dyn Sandbox,
    req: &ExecRequest,
    sink: &ProgressSink,
) -> Result<ExecResult, SandboxError> {
    debug!(command = %req.command_line(), "running install attempt");
    sink.emit_line(&format!("{STATUS_MARKER} Running command: {}", req.command_line()));

    let (tx, mut rx) = mpsc::unbounded_channel();
    let exec = sandbox.exec(req, Some(tx));
    let forward = async {
        while let Some(line) = rx.recv().await {
            match line.source {
                OutputSource::Stdout => sink.emit_line(&line.text),
                OutputSource::Stderr => sink.emit_line(&format!("{STDERR_MARKER} {}", line.text)),
            }
        }
    };
    let (result, ()) = tokio::join!(exec, forward);
    let result = result?;

    if result.timed_out {
        sink.emit_line(&format!(
            "{WARNING_MARKER} Command timed out after {:?}: {}",
            req.timeout,
            req.command_line()
        ));
    }
    Ok(result)
}

fn append(buffer: &mut String, text: &str) {
    if text.is_empty() {
        return;
    }
    if !buffer.is_empty() {
        buffer.push('\n');
    }
    buffer.push_str(text.trim_end());
}
