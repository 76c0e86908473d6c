//! Package request normalization.
//!
//! A request is an ordered, deduplicated set of package identifier
//! strings. Identifiers may carry an inline version suffix
//! (`axios@1.2.0`) or a scope prefix (`@types/node`); both survive
//! normalization untouched. Equality is case-sensitive.

use crate::error::Error;

/// A validated, normalized package request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageRequest {
    packages: Vec<String>,
}

impl PackageRequest {
    /// Normalize raw input: trim each entry, drop blanks, deduplicate
    /// preserving first-seen order.
    ///
    /// # Errors
    /// Returns `Error::EmptyRequest` when nothing survives
    /// normalization.
    pub fn parse<I, S>(raw: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut packages: Vec<String> = Vec::new();
        for entry in raw {
            let entry = entry.as_ref().trim();
            if entry.is_empty() {
                continue;
            }
            if !packages.iter().any(|seen| seen == entry) {
                packages.push(entry.to_string());
            }
        }
        if packages.is_empty() {
            return Err(Error::EmptyRequest);
        }
        Ok(Self { packages })
    }

    /// The normalized identifiers, in request order.
    #[must_use]
    pub fn packages(&self) -> &[String] {
        &self.packages
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.packages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}

/// The manifest lookup key for a requested identifier.
///
/// Scoped names (leading `@`) are used verbatim; otherwise any
/// trailing `@version` suffix is stripped.
#[must_use]
pub fn lookup_key(spec: &str) -> &str {
    if spec.starts_with('@') {
        spec
    } else {
        spec.split('@').next().unwrap_or(spec)
    }
}
