//! `stevedore install` command implementation.
//!
//! Binds the orchestrator to a local sandbox and renders the progress
//! stream as it arrives: one JSON object per line on stdout under
//! `--json`, `[kind] message` lines otherwise. The stream is drained
//! on its own task so events print while commands are still running.

use miette::{IntoDiagnostic, Result};
use std::path::PathBuf;
use std::time::Duration;
use stevedore_core::{
    install_packages, InstallConfig, LocalSandbox, PackageRequest, ProgressEvent, ProgressSink,
};
use tracing::info;

/// Install command action.
#[derive(Debug)]
pub struct InstallAction {
    pub packages: Vec<String>,
    pub cwd: PathBuf,
    pub json: bool,
    pub package_manager: String,
    pub install_timeout: Duration,
    pub refresh_timeout: Duration,
    pub overall_timeout: Duration,
    /// Dev-server launch command, whitespace-separated.
    pub server_cmd: String,
    pub pid_file: Option<PathBuf>,
    pub kill_pattern: String,
    pub skip_restart: bool,
}

pub fn run(action: InstallAction) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new().into_diagnostic()?;
    let report = runtime.block_on(run_install(action))?;
    drop(runtime);

    if report.succeeded() {
        Ok(())
    } else {
        std::process::exit(1);
    }
}

async fn run_install(action: InstallAction) -> Result<stevedore_core::InstallReport> {
    let request = PackageRequest::parse(&action.packages).into_diagnostic()?;
    let sandbox = LocalSandbox::new(&action.cwd).into_diagnostic()?;
    let config = build_config(&action);
    let json = action.json;

    info!(
        cwd = %action.cwd.display(),
        packages = %request.packages().join(", "),
        "installing packages"
    );

    let (sink, mut rx) = ProgressSink::channel();
    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            render(&event, json);
        }
    });

    let report = install_packages(&sandbox, &request, &config, &sink).await;

    // Close the stream and let the printer finish before the caller
    // judges the outcome, so output ordering stays stable.
    drop(sink);
    let _ = printer.await;

    report.into_diagnostic()
}

fn build_config(action: &InstallAction) -> InstallConfig {
    let mut config = InstallConfig {
        package_manager: action.package_manager.clone(),
        install_timeout: action.install_timeout,
        refresh_timeout: action.refresh_timeout,
        overall_timeout: action.overall_timeout,
        restart: !action.skip_restart,
        ..InstallConfig::default()
    };

    let mut parts = action.server_cmd.split_whitespace();
    if let Some(program) = parts.next() {
        config.dev_server.program = program.to_string();
        config.dev_server.args = parts.map(String::from).collect();
    }
    if let Some(pid_file) = &action.pid_file {
        config.dev_server.pid_file = pid_file.clone();
    }
    config.dev_server.kill_pattern = action.kill_pattern.clone();
    config
}

fn render(event: &ProgressEvent, json: bool) {
    if json {
        if let Ok(line) = serde_json::to_string(event) {
            println!("{line}");
        }
    } else {
        println!("[{}] {}", event.kind(), event.message());
    }
}
