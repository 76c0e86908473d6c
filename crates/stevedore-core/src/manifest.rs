//! Dependency manifest snapshots.
//!
//! The manifest (`package.json`) declares two partitions of
//! dependencies: runtime and development. The install command mutates
//! it as a side effect outside this system's control, so every read is
//! an independent snapshot; the resolution-time and verification-time
//! snapshots are never assumed consistent.

use crate::sandbox::{Sandbox, SandboxError};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

/// Why a manifest snapshot could not be taken. Callers fail open on
/// this: a missing or malformed manifest means "install everything".
#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("failed to read manifest: {0}")]
    Read(#[from] SandboxError),

    #[error("failed to parse manifest: {0}")]
    Parse(#[from] serde_json::Error),
}

/// A read-only snapshot of the manifest's dependency partitions.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DependencyManifest {
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
    #[serde(rename = "devDependencies", default)]
    pub dev_dependencies: BTreeMap<String, String>,
}

impl DependencyManifest {
    /// Parse a manifest document.
    ///
    /// # Errors
    /// Returns an error when the document is not a JSON object or a
    /// partition has a non-string version specifier.
    pub fn parse(content: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(content)
    }

    /// Take a fresh snapshot from the sandbox.
    ///
    /// # Errors
    /// Returns `ManifestError` when the file cannot be read or parsed.
    pub async fn read(sandbox: &dyn Sandbox, path: &Path) -> Result<Self, ManifestError> {
        let content = sandbox.read_file(path).await?;
        Ok(Self::parse(&content)?)
    }

    /// Whether `key` is declared in either partition.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.dependencies.contains_key(key) || self.dev_dependencies.contains_key(key)
    }
}
