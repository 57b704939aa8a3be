//! Error types for the synchronization core.

use crate::types::BackendId;
use serde::{Deserialize, Serialize};
use shopsync_codec::CodecError;
use shopsync_storage::StorageError;
use std::fmt;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during synchronization.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SyncError {
    /// Required data is missing or invalid.
    #[error("validation failed on {field}: {message}")]
    Validation {
        /// Offending field or value.
        field: String,
        /// Error message.
        message: String,
    },

    /// A job or synchronizer received an argument it cannot handle.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A mapping could not be computed.
    #[error("mapping error: {0}")]
    Mapping(String),

    /// A dependency chain loops back onto a record already in progress.
    #[error("dependency cycle on {model} {key}")]
    DependencyCycle {
        /// Model being synchronized.
        model: String,
        /// Record key (local or remote id).
        key: String,
    },

    /// The remote side answered with an application fault.
    #[error("remote fault {code}: {message}")]
    RemoteFault {
        /// Remote fault code.
        code: i64,
        /// Remote fault message.
        message: String,
    },

    /// A remote fault whose recovery path failed.
    #[error("unrecoverable remote fault: {0}")]
    UnrecoverableFault(String),

    /// Network or connection error.
    #[error("transport error: {0}")]
    Transport(String),

    /// A local unique constraint failed, usually because of a concurrent job.
    #[error("constraint {constraint} violated on {model}")]
    ConstraintViolation {
        /// Model holding the constraint.
        model: String,
        /// Constraint name.
        constraint: String,
    },

    /// A record does not exist.
    #[error("{model} {id} not found")]
    NotFound {
        /// Model searched.
        model: String,
        /// Missing id.
        id: String,
    },

    /// No connector is registered for a model and backend kind.
    #[error("no connector registered for {model} on {kind}")]
    NotRegistered {
        /// Binding model.
        model: String,
        /// Backend kind.
        kind: String,
    },

    /// The adapter or connector does not support an operation.
    #[error("{operation} is not supported on {model}")]
    Unsupported {
        /// Model.
        model: String,
        /// Operation name.
        operation: String,
    },

    /// The backend id is not configured.
    #[error("unknown backend {0}")]
    UnknownBackend(BackendId),

    /// Local store failure.
    #[error("storage error: {0}")]
    Storage(StorageError),

    /// Codec failure.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Invalid state transition.
    #[error("invalid state transition from {from} to {to}")]
    InvalidStateTransition {
        /// Current state.
        from: String,
        /// Attempted target state.
        to: String,
    },
}

/// Coarse error classification reported to operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Data is missing or invalid.
    Validation,
    /// A dependency was not resolved.
    Mapping,
    /// The remote side refused the call.
    RemoteFault,
    /// The remote side could not be reached.
    Transport,
    /// A local uniqueness race.
    ConstraintViolation,
    /// Programming or configuration error.
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Mapping => "mapping",
            ErrorKind::RemoteFault => "remote_fault",
            ErrorKind::Transport => "transport",
            ErrorKind::ConstraintViolation => "constraint_violation",
            ErrorKind::Internal => "internal",
        };
        f.write_str(name)
    }
}

impl SyncError {
    /// Creates a validation error.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Creates a mapping error.
    pub fn mapping(message: impl Into<String>) -> Self {
        Self::Mapping(message.into())
    }

    /// Creates a remote fault.
    pub fn remote_fault(code: i64, message: impl Into<String>) -> Self {
        Self::RemoteFault {
            code,
            message: message.into(),
        }
    }

    /// Creates a transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    /// Creates a not found error.
    pub fn not_found(model: impl Into<String>, id: impl fmt::Display) -> Self {
        Self::NotFound {
            model: model.into(),
            id: id.to_string(),
        }
    }

    /// Creates an unsupported operation error.
    pub fn unsupported(model: impl Into<String>, operation: impl Into<String>) -> Self {
        Self::Unsupported {
            model: model.into(),
            operation: operation.into(),
        }
    }

    /// Returns the remote fault code, if this is a remote fault.
    pub fn fault_code(&self) -> Option<i64> {
        match self {
            SyncError::RemoteFault { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Classifies the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SyncError::Validation { .. } | SyncError::InvalidArgument(_) => ErrorKind::Validation,
            SyncError::Mapping(_) | SyncError::DependencyCycle { .. } => ErrorKind::Mapping,
            SyncError::RemoteFault { .. } | SyncError::UnrecoverableFault(_) => {
                ErrorKind::RemoteFault
            }
            SyncError::Transport(_) => ErrorKind::Transport,
            SyncError::ConstraintViolation { .. } => ErrorKind::ConstraintViolation,
            SyncError::NotFound { .. }
            | SyncError::NotRegistered { .. }
            | SyncError::Unsupported { .. }
            | SyncError::UnknownBackend(_)
            | SyncError::Storage(_)
            | SyncError::Codec(_)
            | SyncError::Config(_)
            | SyncError::InvalidStateTransition { .. } => ErrorKind::Internal,
        }
    }

    /// Returns true if the job queue may retry the job.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Transport | ErrorKind::ConstraintViolation
        )
    }
}

impl From<StorageError> for SyncError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::UniqueViolation { model, constraint } => {
                SyncError::ConstraintViolation { model, constraint }
            }
            StorageError::NotFound { model, id } => SyncError::not_found(model, id),
            other => SyncError::Storage(other),
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Config(err.to_string())
    }
}
