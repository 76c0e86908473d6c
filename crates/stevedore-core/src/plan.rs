//! Install-need resolution.
//!
//! Computes the minimal subset of the request that genuinely needs
//! installing, by lookup-key membership in either manifest partition.
//! Original request strings (version suffixes included) are preserved
//! for everything that must be installed.

use crate::manifest::DependencyManifest;
use crate::request::{lookup_key, PackageRequest};

/// The packages this run will actually install, and the ones the
/// manifest already declares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallPlan {
    /// Requests not present in the manifest, verbatim, request order.
    pub to_install: Vec<String>,
    /// Requests already declared, verbatim, request order.
    pub already_installed: Vec<String>,
}

impl InstallPlan {
    /// Split the request against a manifest snapshot.
    #[must_use]
    pub fn resolve(request: &PackageRequest, manifest: &DependencyManifest) -> Self {
        let mut to_install = Vec::new();
        let mut already_installed = Vec::new();
        for pkg in request.packages() {
            if manifest.contains(lookup_key(pkg)) {
                already_installed.push(pkg.clone());
            } else {
                to_install.push(pkg.clone());
            }
        }
        Self {
            to_install,
            already_installed,
        }
    }

    /// Fail-open plan: the manifest could not be read, so treat the
    /// entire request as needing installation. Redundant installs are
    /// safer than silently skipped ones.
    #[must_use]
    pub fn fail_open(request: &PackageRequest) -> Self {
        Self {
            to_install: request.packages().to_vec(),
            already_installed: Vec::new(),
        }
    }
}
