use thiserror::Error;

use crate::models::ObjectId;

/// Failures reported to the scheduler by the reactor entry points.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReactorError {
    /// The caller named an object that is not in the registry.
    #[error("unknown object: {0}")]
    UnknownObject(ObjectId),
}

/// Local failure of a single side effect. Never aborts a transition pass.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HandlerError {
    #[error("command not configured")]
    NotConfigured,

    #[error("command '{name}' is not defined")]
    UndefinedCommand { name: String },

    #[error("command line is empty after macro expansion")]
    EmptyCommandLine,

    #[error("host '{host_name}' not found")]
    HostNotFound { host_name: String },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{field} must be at most {max}, got {value}")]
    OutOfRange {
        field: &'static str,
        value: u64,
        max: u64,
    },
}

/// Rejected input lines on the daemon's intake.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IntakeError {
    #[error("malformed check result: {0}")]
    Malformed(String),

    #[error("invalid return code {code} for {object}")]
    InvalidReturnCode { object: ObjectId, code: i32 },

    #[error("no such object: {0}")]
    UnknownObject(ObjectId),
}
