//! User-facing notices.

use crate::error::{Error, TransferErrorKind};
use crate::payment::PaymentOutcome;
use std::fmt;

/// Severity of a notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    /// The action succeeded.
    Success,
    /// The action failed.
    Error,
}

/// A short message shown to the user after an action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    /// Severity.
    pub level: NoticeLevel,
    /// Headline.
    pub title: String,
    /// Detail line.
    pub message: String,
}

impl Notice {
    /// A success notice.
    pub fn success(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            title: title.into(),
            message: message.into(),
        }
    }

    /// An error notice.
    pub fn error(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            title: title.into(),
            message: message.into(),
        }
    }

    /// The single notice shown for `error`.
    #[must_use]
    pub fn from_error(error: &Error) -> Self {
        match error {
            Error::Validation(msg) => Self::error("Check your input", msg.clone()),
            Error::Transfer(kind, _) => Self::error(
                "Upload failed",
                match kind {
                    TransferErrorKind::Network => "The connection dropped. Please try again.",
                    TransferErrorKind::Rejected => "Storage refused the file.",
                    TransferErrorKind::IntegrityMismatch => {
                        "The stored file did not match. Please try again."
                    }
                    TransferErrorKind::Cancelled => "The upload was cancelled.",
                },
            ),
            Error::SessionCreation(_) => Self::error(
                "Checkout unavailable",
                "Could not start checkout. Please try again.",
            ),
            Error::BackendUnavailable => Self::error(
                "Not connected",
                "The service is not reachable right now.",
            ),
            Error::Backend(msg) => Self::error("Something went wrong", msg.clone()),
            Error::Config(_) | Error::Io(_) | Error::Serialization(_) => {
                Self::error("Something went wrong", error.to_string())
            }
        }
    }

    /// Whether this notice reports a failure.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.level == NoticeLevel::Error
    }
}

impl From<&Error> for Notice {
    fn from(error: &Error) -> Self {
        Self::from_error(error)
    }
}

impl From<&PaymentOutcome> for Notice {
    fn from(outcome: &PaymentOutcome) -> Self {
        match outcome {
            PaymentOutcome::Completed { .. } => Self::success(
                "Payment successful",
                "Thank you for supporting the artist!",
            ),
            PaymentOutcome::Failed { reason } => Self::error("Payment not completed", reason.clone()),
            PaymentOutcome::Pending => Self::success("Payment pending", "No session to look up yet"),
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.title, self.message)
    }
}
