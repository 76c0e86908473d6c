//! Stage sequencing for one install-and-restart invocation.
//!
//! Stages run strictly in order, each one emitting into the progress
//! stream as it executes: validate → resolve → (short-circuit |
//! install with recovery → verify) → restart → complete. After
//! validation nothing raises: install, verification, and restart
//! failures are folded into classified events and the flow continues,
//! so the environment is always left in the most runnable state we
//! could manage and the stream always terminates.

use crate::config::InstallConfig;
use crate::error::Error;
use crate::event::{ProgressEvent, ProgressSink};
use crate::manifest::DependencyManifest;
use crate::plan::InstallPlan;
use crate::request::PackageRequest;
use crate::restart::restart_dev_server;
use crate::retry::{run_install, InstallRun};
use crate::sandbox::Sandbox;
use crate::verify::confirm_installed;
use tracing::{info, warn};

/// Summary of one invocation, for callers that want more than the
/// event stream.
#[derive(Debug, Clone)]
pub struct InstallReport {
    /// The normalized request.
    pub requested: Vec<String>,
    /// Requests the manifest already declared at resolution time.
    pub already_installed: Vec<String>,
    /// What this run tried to install.
    pub plan: Vec<String>,
    /// What verification confirmed, original request strings.
    pub installed: Vec<String>,
    /// Final package-manager exit code; `None` when no install command
    /// ran.
    pub exit_code: Option<i32>,
    /// Pid of the restarted dev server, when the restart ran and the
    /// launch succeeded.
    pub restarted_pid: Option<u32>,
}

impl InstallReport {
    /// Whether the invocation achieved its goal: nothing needed
    /// installing, or at least one package was verified installed.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.plan.is_empty() || !self.installed.is_empty()
    }
}

/// Run the full orchestration for `request` against `sandbox`,
/// streaming progress into `sink`.
///
/// # Errors
/// Returns an error only for pre-flight problems (invalid
/// configuration); every later failure is reported through the stream
/// and folded into the report.
pub async fn install_packages(
    sandbox: &dyn Sandbox,
    request: &PackageRequest,
    config: &InstallConfig,
    sink: &ProgressSink,
) -> Result<InstallReport, Error> {
    config.validate()?;

    let requested = request.packages().to_vec();
    sink.emit(ProgressEvent::Start {
        message: format!(
            "Installing {} package{}...",
            requested.len(),
            if requested.len() == 1 { "" } else { "s" }
        ),
        packages: requested.clone(),
    });

    sink.status("Checking installed packages...");
    let plan = match DependencyManifest::read(sandbox, &config.manifest_path).await {
        Ok(manifest) => InstallPlan::resolve(request, &manifest),
        Err(err) => {
            // Fail open: redundant installs beat silently skipped ones.
            warn!(%err, "manifest read failed, installing the full request");
            sink.info(format!(
                "Could not read dependency manifest ({err}); installing all requested packages: {}",
                requested.join(", ")
            ));
            InstallPlan::fail_open(request)
        }
    };

    if plan.to_install.is_empty() {
        info!(already = plan.already_installed.len(), "nothing to install");
        sink.emit(ProgressEvent::Success {
            message: "All packages are already installed".to_string(),
            installed_packages: Vec::new(),
            already_installed: plan.already_installed.clone(),
        });
        sink.emit(ProgressEvent::Complete {
            message: "Nothing to install; environment unchanged".to_string(),
            installed_packages: Vec::new(),
        });
        return Ok(InstallReport {
            requested,
            already_installed: plan.already_installed,
            plan: Vec::new(),
            installed: Vec::new(),
            exit_code: None,
            restarted_pid: None,
        });
    }

    sink.info(format!(
        "Installing {} new package(s): {}",
        plan.to_install.len(),
        plan.to_install.join(", ")
    ));

    let install = run_install(sandbox, &plan.to_install, config, sink);
    let run = match tokio::time::timeout(config.overall_timeout, install).await {
        Ok(Ok(run)) => run,
        Ok(Err(err)) => {
            warn!(%err, "install command could not be executed");
            sink.error(format!("Install command could not be executed: {err}"));
            InstallRun::not_executed()
        }
        Err(_) => {
            warn!(timeout = ?config.overall_timeout, "install phase exceeded the overall budget");
            sink.error(format!(
                "Install phase exceeded the overall budget ({:?})",
                config.overall_timeout
            ));
            InstallRun::not_executed()
        }
    };
    if run.exit_code != 0 {
        sink.error(format!("Package manager exited with code {}", run.exit_code));
    }

    let installed = confirm_installed(sandbox, &config.manifest_path, &plan.to_install).await;
    if installed.is_empty() {
        // The exit code does not get a vote here; the manifest is the
        // source of truth.
        sink.error("Failed to verify package installation");
    } else {
        sink.emit(ProgressEvent::Success {
            message: format!("Successfully installed: {}", installed.join(", ")),
            installed_packages: installed.clone(),
            already_installed: Vec::new(),
        });
    }

    let restarted_pid = if config.restart {
        sink.status("Restarting development server...");
        let pid = restart_dev_server(sandbox, &config.manifest_path, &config.dev_server).await;
        if let Some(pid) = pid {
            sink.status(format!("Development server restarted (pid {pid})"));
        }
        pid
    } else {
        None
    };

    sink.emit(ProgressEvent::Complete {
        message: "Package installation complete".to_string(),
        installed_packages: installed.clone(),
    });

    Ok(InstallReport {
        requested,
        already_installed: plan.already_installed,
        plan: plan.to_install,
        installed,
        exit_code: Some(run.exit_code),
        restarted_pid,
    })
}
