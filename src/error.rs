use thiserror::Error;

use crate::otg::{FunctionSet, Status};

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Device node access failed [{path}]: {reason}")]
    NodeAccess { path: String, reason: String },

    #[error("Function combination not supported: {0}")]
    UnsupportedCombination(FunctionSet),

    #[error("Verification mismatch: wrote {expected:?}, read back {actual:?}")]
    VerificationMismatch { expected: String, actual: String },

    #[error("Listener transport error: {0}")]
    ListenerTransport(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AppError {
    /// Build a node access error from a path and any displayable cause
    pub fn node(path: &std::path::Path, reason: impl std::fmt::Display) -> Self {
        Self::NodeAccess {
            path: path.display().to_string(),
            reason: reason.to_string(),
        }
    }

    /// Status reported to the policy layer for this error.
    ///
    /// Only an unsupported combination is distinguishable from a generic
    /// hardware fault.
    pub fn status(&self) -> Status {
        match self {
            Self::UnsupportedCombination(_) => Status::ConfigurationNotSupported,
            _ => Status::Error,
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, AppError>;
