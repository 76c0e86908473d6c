//! Line-oriented output classification.
//!
//! Raw package-manager output is heterogeneous: forwarded stderr,
//! pnpm/npm warnings, conflict signatures, the retry controller's own
//! lifecycle markers, and plain progress text. Classification is an
//! ordered table of (predicate, builder) rules evaluated
//! first-match-wins, so precedence is data, not control flow.
//!
//! The classifier is total: every non-empty line yields exactly one
//! event or is explicitly dropped (blank after a marker, or the
//! `undefined` placeholder), and it is a pure function of the line
//! content.

use crate::event::ProgressEvent;

/// Marker prefixed to forwarded subprocess stderr lines.
pub const STDERR_MARKER: &str = "STDERR:";
/// Retry controller lifecycle marker: stage transitions.
pub const STATUS_MARKER: &str = "STATUS:";
/// Retry controller lifecycle marker: recovery warnings.
pub const WARNING_MARKER: &str = "WARNING:";
/// Retry controller lifecycle marker: recovery errors.
pub const ERROR_MARKER: &str = "ERROR:";

/// pnpm's lockfile-staleness error signature (triggers the retry).
pub const OUTDATED_LOCKFILE: &str = "ERR_PNPM_OUTDATED_LOCKFILE";
/// pnpm's peer-dependency conflict signature (classification only).
pub const PEER_DEP_CONFLICT: &str = "ERR_PNPM_PEER_DEPENDENCY_ISSUES";
/// npm-style generic resolution-conflict signature (classification only).
pub const RESOLUTION_CONFLICT: &str = "ERESOLVE";

/// Placeholder token some tools print for absent values; carries no
/// content and is dropped.
const PLACEHOLDER: &str = "undefined";

struct Rule {
    matches: fn(&str) -> bool,
    build: fn(&str) -> Option<ProgressEvent>,
}

/// The precedence table. Order is the contract: forwarded stderr beats
/// conflict signatures, signatures beat generic warnings, and the
/// catch-all `output` rule comes last.
static RULES: &[Rule] = &[
    Rule {
        matches: |line| line.contains(STDERR_MARKER),
        build: |line| nontrivial(&strip_marker(line, STDERR_MARKER)).map(error),
    },
    Rule {
        matches: |line| line.contains(PEER_DEP_CONFLICT),
        build: |line| {
            Some(warning(format!(
                "Peer dependency issues detected: {line}"
            )))
        },
    },
    Rule {
        matches: |line| line.contains(RESOLUTION_CONFLICT),
        build: |line| Some(warning(format!("Dependency conflict detected: {line}"))),
    },
    Rule {
        matches: |line| line.contains("pnpm WARN") || line.contains("npm WARN"),
        build: |line| Some(warning(line.to_string())),
    },
    Rule {
        matches: |line| line.starts_with(WARNING_MARKER),
        build: |line| nontrivial(&strip_marker(line, WARNING_MARKER)).map(warning),
    },
    Rule {
        matches: |line| line.starts_with(STATUS_MARKER),
        build: |line| {
            nontrivial(&strip_marker(line, STATUS_MARKER))
                .map(|message| ProgressEvent::Status { message })
        },
    },
    Rule {
        matches: |line| line.starts_with(ERROR_MARKER),
        build: |line| nontrivial(&strip_marker(line, ERROR_MARKER)).map(error),
    },
    // Catch-all: informative text is forwarded, never discarded.
    Rule {
        matches: |_| true,
        build: |line| {
            nontrivial(line).map(|message| ProgressEvent::Output { message })
        },
    },
];

/// Classify one raw output line.
///
/// Returns `None` for lines that carry no content: blank lines, bare
/// markers, and placeholder tokens.
#[must_use]
pub fn classify_line(line: &str) -> Option<ProgressEvent> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    RULES
        .iter()
        .find(|rule| (rule.matches)(line))
        .and_then(|rule| (rule.build)(line))
}

/// The line with the first occurrence of `marker` removed; text on
/// both sides of the marker survives.
fn strip_marker(line: &str, marker: &str) -> String {
    match line.find(marker) {
        Some(pos) => {
            let before = line[..pos].trim_end();
            let after = line[pos + marker.len()..].trim_start();
            if before.is_empty() {
                after.to_string()
            } else if after.is_empty() {
                before.to_string()
            } else {
                format!("{before} {after}")
            }
        }
        None => line.trim().to_string(),
    }
}

/// `Some(owned)` when the text is non-blank and not a placeholder.
fn nontrivial(text: &str) -> Option<String> {
    let text = text.trim();
    if text.is_empty() || text == PLACEHOLDER {
        None
    } else {
        Some(text.to_string())
    }
}

fn warning(message: impl Into<String>) -> ProgressEvent {
    ProgressEvent::Warning {
        message: message.into(),
    }
}

fn error(message: impl Into<String>) -> ProgressEvent {
    ProgressEvent::Error {
        message: message.into(),
    }
}
