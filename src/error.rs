//! Error types for busker.

use std::fmt;
use thiserror::Error;

/// Result type alias using the busker error.
pub type Result<T> = std::result::Result<T, Error>;

/// Why a blob transfer did not produce a reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferErrorKind {
    /// The transport failed before storage acknowledged the blob.
    Network,
    /// Storage refused the blob.
    Rejected,
    /// Storage acknowledged content that differs from what was sent.
    IntegrityMismatch,
    /// The caller cancelled the transfer.
    Cancelled,
}

impl fmt::Display for TransferErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Network => "network",
            Self::Rejected => "rejected",
            Self::IntegrityMismatch => "integrity mismatch",
            Self::Cancelled => "cancelled",
        };
        f.write_str(label)
    }
}

/// Errors surfaced by busker operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A local precondition failed. The backend was never contacted.
    #[error("validation error: {0}")]
    Validation(String),

    /// A blob upload failed; no reference was produced.
    #[error("transfer failed ({0}): {1}")]
    Transfer(TransferErrorKind, String),

    /// The gateway returned a session that cannot be used.
    #[error("checkout session error: {0}")]
    SessionCreation(String),

    /// No backend connection is available, so the operation was not attempted.
    #[error("backend unavailable")]
    BackendUnavailable,

    /// A backend call failed.
    #[error("backend error: {0}")]
    Backend(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Build a transfer error of the given kind.
    pub fn transfer(kind: TransferErrorKind, message: impl Into<String>) -> Self {
        Self::Transfer(kind, message.into())
    }

    /// Returns true if the failure happened before any network call.
    #[must_use]
    pub fn is_local(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::BackendUnavailable)
    }
}
