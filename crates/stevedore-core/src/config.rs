//! Orchestrator configuration.
//!
//! Timeout values are environment-tuned, not algorithmic, so they live
//! here instead of being hard-coded. `validate` enforces the relative
//! ordering the retry protocol depends on: a single install attempt
//! must be allowed less time than the lockfile refresh, and both must
//! fit inside the overall operation budget.

use crate::error::Error;
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for one install-and-restart invocation.
#[derive(Debug, Clone)]
pub struct InstallConfig {
    /// Package manager binary to drive (treated as a black box).
    pub package_manager: String,
    /// Timeout for a single `install <packages>` attempt.
    pub install_timeout: Duration,
    /// Timeout for the lockfile refresh (`install --no-frozen-lockfile`).
    pub refresh_timeout: Duration,
    /// Budget for the whole install phase, all attempts included.
    pub overall_timeout: Duration,
    /// Dependency manifest path, resolved inside the sandbox.
    pub manifest_path: PathBuf,
    /// Restart the dev server after installing. Callers that own the
    /// server lifecycle themselves turn this off.
    pub restart: bool,
    /// Dev server restart settings.
    pub dev_server: DevServerConfig,
}

/// Dev server restart settings.
#[derive(Debug, Clone)]
pub struct DevServerConfig {
    /// Program used to launch the dev server.
    pub program: String,
    /// Arguments for the dev server launch.
    pub args: Vec<String>,
    /// Well-known location of the process-identity record. Shared
    /// across invocations over time; last writer wins.
    pub pid_file: PathBuf,
    /// Pattern for the belt-and-suspenders `pkill -f` cleanup.
    pub kill_pattern: String,
    /// Dev server config file to touch so its watcher picks up the
    /// new dependency set.
    pub config_file: PathBuf,
    /// Pause after stopping the old server, to let the port free.
    pub settle_delay: Duration,
    /// Pause after launching the new server.
    pub startup_delay: Duration,
}

impl Default for InstallConfig {
    fn default() -> Self {
        Self {
            package_manager: "pnpm".to_string(),
            install_timeout: Duration::from_secs(120),
            refresh_timeout: Duration::from_secs(180),
            overall_timeout: Duration::from_secs(300),
            manifest_path: PathBuf::from("package.json"),
            restart: true,
            dev_server: DevServerConfig::default(),
        }
    }
}

impl Default for DevServerConfig {
    fn default() -> Self {
        Self {
            program: "npm".to_string(),
            args: vec!["run".to_string(), "dev".to_string()],
            pid_file: PathBuf::from("/tmp/stevedore-dev-server.pid"),
            kill_pattern: "vite".to_string(),
            config_file: PathBuf::from("vite.config.js"),
            settle_delay: Duration::from_secs(1),
            startup_delay: Duration::from_secs(3),
        }
    }
}

impl InstallConfig {
    /// Check timeout ordering: install < refresh <= overall, all nonzero.
    ///
    /// # Errors
    /// Returns `Error::Config` when the ordering is violated.
    pub fn validate(&self) -> Result<(), Error> {
        if self.install_timeout.is_zero() {
            return Err(Error::Config("install timeout must be nonzero".into()));
        }
        if self.install_timeout >= self.refresh_timeout {
            return Err(Error::Config(format!(
                "install timeout ({:?}) must be shorter than refresh timeout ({:?})",
                self.install_timeout, self.refresh_timeout
            )));
        }
        if self.refresh_timeout > self.overall_timeout {
            return Err(Error::Config(format!(
                "refresh timeout ({:?}) must fit in the overall budget ({:?})",
                self.refresh_timeout, self.overall_timeout
            )));
        }
        Ok(())
    }
}
