//! Error types for the runbook engine.
//!
//! Uses thiserror for derive macros. Every variant maps to a process exit code
//! so the CLI can surface the outcome of a walk directly.

use crate::exit_codes;
use thiserror::Error;

/// A failure on a single host during a command fan-out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostFailure {
    pub host: String,
    pub message: String,
}

/// Main error type for runbook operations.
#[derive(Error, Debug)]
pub enum RunbookError {
    /// User provided invalid arguments or the environment is unusable.
    #[error("{0}")]
    UserError(String),

    /// The book, an option value or the configuration is malformed.
    #[error("Validation failed: {0}")]
    ValidationError(String),

    /// A statement failed; the walk stops at `position`.
    #[error("Statement at position {position} failed: {message}")]
    StatementFailure { position: String, message: String },

    /// A host could not be reached or a transfer failed.
    #[error("Transport failure on {host}: {message}")]
    TransportFailure { host: String, message: String },

    /// One or more hosts of a wave reported a failure.
    #[error("{}", describe_host_failures(.0))]
    HostFailures(Vec<HostFailure>),

    /// The terminal multiplexer rejected a command.
    #[error("Terminal multiplexer error: {0}")]
    MultiplexerError(String),

    /// The resume store could not be read or written.
    #[error("Resume store error: {0}")]
    StoreError(String),

    /// The operator interrupted the run.
    #[error("Run cancelled")]
    Cancelled,
}

impl RunbookError {
    /// Returns the appropriate exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            RunbookError::UserError(_) => exit_codes::USER_ERROR,
            RunbookError::StoreError(_) => exit_codes::USER_ERROR,
            RunbookError::ValidationError(_) => exit_codes::VALIDATION_FAILURE,
            RunbookError::StatementFailure { .. } => exit_codes::STATEMENT_FAILURE,
            RunbookError::HostFailures(_) => exit_codes::STATEMENT_FAILURE,
            RunbookError::TransportFailure { .. } => exit_codes::TRANSPORT_FAILURE,
            RunbookError::MultiplexerError(_) => exit_codes::TRANSPORT_FAILURE,
            RunbookError::Cancelled => exit_codes::CANCELLED,
        }
    }

    /// Attribute a handler failure to the statement at `position`.
    ///
    /// Validation errors and cancellation are not statement failures and pass
    /// through unchanged.
    pub fn at(self, position: impl Into<String>) -> Self {
        match self {
            RunbookError::ValidationError(_)
            | RunbookError::Cancelled
            | RunbookError::StatementFailure { .. } => self,
            other => RunbookError::StatementFailure {
                position: position.into(),
                message: other.to_string(),
            },
        }
    }
}

fn describe_host_failures(failures: &[HostFailure]) -> String {
    let details: Vec<String> = failures
        .iter()
        .map(|f| format!("{}: {}", f.host, f.message))
        .collect();
    format!(
        "command failed on {} host(s): {}",
        failures.len(),
        details.join("; ")
    )
}

/// Result type alias for runbook operations.
pub type Result<T> = std::result::Result<T, RunbookError>;
