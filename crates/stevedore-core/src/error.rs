use crate::sandbox::SandboxError;
use thiserror::Error;

/// Core error type for stevedore operations.
///
/// Only pre-flight problems surface here: an invalid request or an
/// unreachable sandbox. Everything that happens after validation is
/// folded into classified progress events instead of raised.
#[derive(Error, Debug)]
pub enum Error {
    #[error("no valid package names in request")]
    EmptyRequest,

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Sandbox(#[from] SandboxError),
}
