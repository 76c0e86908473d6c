//! Post-install verification.
//!
//! The manifest is the source of truth, not the package manager's exit
//! code: a zero exit with no manifest change is still a failure, and a
//! non-zero exit that nevertheless recorded the packages is a
//! (partial) success.

use crate::manifest::DependencyManifest;
use crate::request::lookup_key;
use crate::sandbox::Sandbox;
use std::path::Path;
use tracing::warn;

/// Re-read the manifest and return the subset of `plan` whose lookup
/// keys are now declared, original request strings preserved.
///
/// A manifest that cannot be read confirms nothing.
pub async fn confirm_installed(
    sandbox: &dyn Sandbox,
    manifest_path: &Path,
    plan: &[String],
) -> Vec<String> {
    match DependencyManifest::read(sandbox, manifest_path).await {
        Ok(manifest) => plan
            .iter()
            .filter(|pkg| manifest.contains(lookup_key(pkg)))
            .cloned()
            .collect(),
        Err(err) => {
            warn!(%err, "could not re-read manifest for verification");
            Vec::new()
        }
    }
}
