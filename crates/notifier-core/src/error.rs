//! Error types for the notifier system
//!
//! Every fault crossing a component boundary is normalized into one of three
//! operator-facing kinds (see [`ErrorKind`]):
//!
//! - **Connector**: listing/fetch transport or parse failure, retryable next cycle
//! - **Delivery**: an adaptor could not hand a message to its channel, retryable
//! - **Configuration**: missing or invalid subscription/adaptor data, or a
//!   destination the channel permanently refuses; needs a fix
//!
//! Store, I/O and serialization faults are reported as internal errors.

use std::time::Duration;
use thiserror::Error;

/// Result type alias for notifier operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the notifier system
#[derive(Error, Debug)]
pub enum Error {
    /// Listing or fetching from the remote collection failed
    #[error("Connector error: {0}")]
    Connector(String),

    /// A channel transport rejected or failed to deliver a message
    #[error("Delivery failed: {0}")]
    Delivery(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// The channel permanently refused a destination (bad number, unknown mailbox)
    #[error("Rejected with status {status}: {reason}")]
    Rejected { status: u16, reason: String },

    /// Notification store errors
    #[error("Notification store error: {0}")]
    Store(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

/// Operator-facing classification of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Remote listing/fetch failed
    Connector,
    /// Channel delivery failed
    Delivery,
    /// Configuration must be fixed before a retry can succeed
    Configuration,
    /// Local fault (store, I/O, serialization)
    Internal,
}

impl Error {
    /// Create a connector error
    pub fn connector(msg: impl Into<String>) -> Self {
        Self::Connector(msg.into())
    }

    /// Create a delivery error
    pub fn delivery(msg: impl Into<String>) -> Self {
        Self::Delivery(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a permanent rejection carrying the channel's status code
    pub fn rejected(status: u16, reason: impl Into<String>) -> Self {
        Self::Rejected {
            status,
            reason: reason.into(),
        }
    }

    /// Create a notification store error
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// Connector error for an operation that exceeded its deadline
    pub fn timeout(operation: &str, after: Duration) -> Self {
        Self::Connector(format!("{} timed out after {:?}", operation, after))
    }

    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Connector(_) => ErrorKind::Connector,
            Error::Delivery(_) => ErrorKind::Delivery,
            Error::Config(_) | Error::Rejected { .. } => ErrorKind::Configuration,
            Error::Store(_) | Error::Io(_) | Error::Json(_) | Error::Other(_) => {
                ErrorKind::Internal
            }
        }
    }

    /// Whether waiting for the next cycle can resolve this error
    pub fn is_retryable(&self) -> bool {
        !matches!(self.kind(), ErrorKind::Configuration)
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
