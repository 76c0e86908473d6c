//! Typed progress events and the sink they flow through.
//!
//! Events form an append-only, ordered stream: the orchestrator emits
//! them in the exact order stages execute, and consumers process them
//! in order. The wire shape is a tagged JSON object with a `type`
//! field, e.g.
//!
//! ```json
//! {"type":"success","message":"Successfully installed: axios@1.2.0","installedPackages":["axios@1.2.0"]}
//! ```

use crate::classify::classify_line;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// A single progress message, tagged by kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProgressEvent {
    /// Operation accepted; lists the full normalized request.
    Start { message: String, packages: Vec<String> },
    /// Stage transition.
    Status { message: String },
    /// Informational note (e.g. the computed install plan).
    Info { message: String },
    Warning { message: String },
    Error { message: String },
    /// Raw subprocess output that matched no other rule but carries
    /// content. Never silently discarded.
    Output { message: String },
    /// Verification confirmed at least one package, or nothing needed
    /// installing in the first place.
    Success {
        message: String,
        #[serde(rename = "installedPackages")]
        installed_packages: Vec<String>,
        #[serde(rename = "alreadyInstalled", default, skip_serializing_if = "Vec::is_empty")]
        already_installed: Vec<String>,
    },
    /// Terminal event; the stream closes after this.
    Complete {
        message: String,
        #[serde(rename = "installedPackages")]
        installed_packages: Vec<String>,
    },
}

impl ProgressEvent {
    /// The event's kind tag, as it appears on the wire.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Start { .. } => "start",
            Self::Status { .. } => "status",
            Self::Info { .. } => "info",
            Self::Warning { .. } => "warning",
            Self::Error { .. } => "error",
            Self::Output { .. } => "output",
            Self::Success { .. } => "success",
            Self::Complete { .. } => "complete",
        }
    }

    /// The human-readable message carried by the event.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Start { message, .. }
            | Self::Status { message }
            | Self::Info { message }
            | Self::Warning { message }
            | Self::Error { message }
            | Self::Output { message }
            | Self::Success { message, .. }
            | Self::Complete { message, .. } => message,
        }
    }
}

/// Sending half of the progress stream.
///
/// Wraps an unbounded channel so emission never blocks a stage. The
/// stream closes when every clone of the sink has dropped, which
/// happens on every exit path of the orchestrator, panics included.
/// A consumer that stopped listening is tolerated: sends to a closed
/// channel are discarded.
#[derive(Debug, Clone)]
pub struct ProgressSink {
    tx: mpsc::UnboundedSender<ProgressEvent>,
}

impl ProgressSink {
    /// Create a sink and the receiver that observes its events.
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Emit one event.
    pub fn emit(&self, event: ProgressEvent) {
        let _ = self.tx.send(event);
    }

    /// Classify a raw output line and emit the resulting event, if the
    /// line carries content.
    pub fn emit_line(&self, line: &str) {
        if let Some(event) = classify_line(line) {
            self.emit(event);
        }
    }

    pub fn status(&self, message: impl Into<String>) {
        self.emit(ProgressEvent::Status {
            message: message.into(),
        });
    }

    pub fn info(&self, message: impl Into<String>) {
        self.emit(ProgressEvent::Info {
            message: message.into(),
        });
    }

    pub fn error(&self, message: impl Into<String>) {
        self.emit(ProgressEvent::Error {
            message: message.into(),
        });
    }
}
