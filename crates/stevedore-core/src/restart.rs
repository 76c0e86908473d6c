//! Dev-server restart coordination.
//!
//! The restart runs regardless of the install outcome so the
//! environment is left serving. The handshake: stop whatever the
//! process-identity record points at (missing or dead is fine), sweep
//! by invocation pattern, let the port free, launch detached with
//! color disabled, persist the new pid, wait for startup, then touch
//! the manifest and the server's config file so its watcher notices
//! the new dependency set.
//!
//! There is no rollback. A failed launch is surfaced only by the
//! absence of a "restarted" event; callers treat that silence as the
//! failure signal.

use crate::config::DevServerConfig;
use crate::sandbox::{ExecRequest, Sandbox};
use std::path::Path;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Restart the dev server. Returns the new pid, or `None` when the
/// launch failed.
pub async fn restart_dev_server(
    sandbox: &dyn Sandbox,
    manifest_path: &Path,
    config: &DevServerConfig,
) -> Option<u32> {
    stop_tracked(sandbox, config).await;

    if let Err(err) = sandbox.kill_by_pattern(&config.kill_pattern).await {
        debug!(%err, pattern = %config.kill_pattern, "pattern kill failed, continuing");
    }
    sleep(config.settle_delay).await;

    let launch = ExecRequest::new(&config.program, config.args.clone()).env("FORCE_COLOR", "0");
    let pid = match sandbox.spawn_detached(&launch).await {
        Ok(pid) => pid,
        Err(err) => {
            warn!(%err, command = %launch.command_line(), "failed to launch dev server");
            return None;
        }
    };

    // Last writer wins; a stale record from an earlier invocation is
    // simply overwritten.
    if let Err(err) = sandbox.write_file(&config.pid_file, &pid.to_string()).await {
        warn!(%err, pid, "failed to persist dev server pid");
    }
    sleep(config.startup_delay).await;

    for path in [manifest_path, config.config_file.as_path()] {
        if let Err(err) = sandbox.touch(path).await {
            debug!(%err, path = %path.display(), "watcher nudge failed, continuing");
        }
    }

    Some(pid)
}

/// Terminate the process named by the identity record, tolerating a
/// missing record, an unparseable record, and an already-dead process.
async fn stop_tracked(sandbox: &dyn Sandbox, config: &DevServerConfig) {
    match sandbox.read_file(&config.pid_file).await {
        Ok(contents) => match contents.trim().parse::<u32>() {
            Ok(pid) => {
                debug!(pid, "stopping tracked dev server");
                if let Err(err) = sandbox.signal(pid).await {
                    debug!(%err, pid, "signal failed, continuing");
                }
            }
            Err(_) => debug!("pid record is not a number, ignoring"),
        },
        Err(_) => debug!("no dev server pid record"),
    }
}
