use std::process::ExitCode;

/// Errors that cause convobot to exit with a specific code.
#[derive(Debug, thiserror::Error)]
pub enum ExitError {
    #[error("config error: {0}")]
    Config(String),

    #[error("transport driver not found: {program}")]
    TransportNotFound { program: String },

    #[error("{program} failed (exit {code}): {message}")]
    TransportFailed {
        program: String,
        code: i32,
        message: String,
    },

    #[error("{program} timed out after {timeout_secs}s")]
    Timeout { program: String, timeout_secs: u64 },

    #[error("{0}")]
    Other(String),
}

impl ExitError {
    pub fn exit_code(&self) -> ExitCode {
        match self {
            ExitError::Config(_) => ExitCode::from(2),
            ExitError::TransportNotFound { .. } => ExitCode::from(3),
            ExitError::TransportFailed { .. } => ExitCode::from(4),
            ExitError::Timeout { .. } => ExitCode::from(5),
            ExitError::Other(_) => ExitCode::from(1),
        }
    }
}

/// Invalid command registrations, reported by `RegistryBuilder::build`.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("command #{index} has no names")]
    NoNames { index: usize },

    #[error("command name {name:?} is empty or contains whitespace")]
    InvalidName { name: String },
}

/// A command callback that did not complete.
#[derive(Debug, thiserror::Error)]
pub enum HandlerFailure {
    #[error("handler returned an error: {0:#}")]
    Error(anyhow::Error),

    #[error("handler panicked: {0}")]
    Panicked(String),
}
