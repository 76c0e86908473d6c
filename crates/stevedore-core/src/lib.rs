#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::return_self_not_must_use)]

//! Install orchestration for sandboxed dev environments.
//!
//! Given a target environment and a list of requested packages, works
//! out which packages are genuinely missing, drives the package
//! manager through a single-shot lockfile-recovery retry, classifies
//! its output into a typed progress stream, verifies the manifest
//! actually changed, and restarts the environment's dev server.

pub mod classify;
pub mod config;
pub mod error;
pub mod event;
pub mod manifest;
pub mod orchestrator;
pub mod plan;
pub mod request;
pub mod restart;
pub mod retry;
pub mod sandbox;
pub mod verify;

#[cfg(test)]
pub(crate) mod testutil;

pub use config::{DevServerConfig, InstallConfig};
pub use error::Error;
pub use event::{ProgressEvent, ProgressSink};
pub use manifest::DependencyManifest;
pub use orchestrator::{install_packages, InstallReport};
pub use plan::InstallPlan;
pub use request::{lookup_key, PackageRequest};
pub use sandbox::{LocalSandbox, Sandbox, SandboxError};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
