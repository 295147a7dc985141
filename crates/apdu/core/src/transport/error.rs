//! Error types specific to card transport

use thiserror::Error;

/// Transport error type
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Error reported by the underlying driver, with its native code
    #[error("Driver error {code:#010X}: {message}")]
    Driver {
        /// Native driver error code
        code: u32,
        /// Human-readable driver message
        message: String,
    },

    /// The transport has no open card connection
    #[error("Not connected to a card")]
    NotConnected,

    /// Timeout error
    #[error("Operation timed out")]
    Timeout,

    /// Cancelled operation
    #[error("Operation cancelled")]
    Cancelled,

    /// Other error with message
    #[error("{0}")]
    Other(String),
}

impl TransportError {
    /// Create a new driver error
    pub fn driver<S: Into<String>>(code: u32, message: S) -> Self {
        Self::Driver {
            code,
            message: message.into(),
        }
    }

    /// Create a general other error
    pub fn other<S: Into<String>>(message: S) -> Self {
        Self::Other(message.into())
    }

    /// Native driver code, if this error came from the driver
    pub const fn code(&self) -> Option<u32> {
        match self {
            Self::Driver { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Human-readable message of a driver error
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Driver { message, .. } => Some(message),
            _ => None,
        }
    }
}
