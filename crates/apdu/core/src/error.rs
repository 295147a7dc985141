//! Core error type for all APDU operations
//!
//! Every fallible operation of the crate returns [`Error`]. Transport
//! failures are wrapped unchanged so callers can still inspect the driver
//! code and message.

use crate::transport::TransportError;

/// Result type used throughout the crate
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Core error type that encompasses all possible errors in the crate
#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum Error {
    /// Transport failure, propagated unchanged
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A precondition of the operation was not met
    #[error(transparent)]
    Precondition(#[from] PreconditionError),

    /// Command data does not fit a short APDU, or a raw command is malformed
    #[error("Invalid command length: {0}")]
    InvalidCommandLength(usize),

    /// Response frame was shorter than a status word
    #[error("Invalid response: frame shorter than two bytes")]
    InvalidResponse,

    /// The card kept signalling more data past the configured limit
    #[error("GET RESPONSE chain limit exceeded after {0} rounds")]
    ChainLimitExceeded(usize),

    /// Context error with message and source error
    #[error("{context}: {source}")]
    Context {
        /// Contextual message
        context: String,
        /// Source error
        source: Box<Self>,
    },

    /// Generic dynamic error with string message
    #[error("{0}")]
    Message(String),
}

/// Preconditions checked before any bytes reach the card
#[derive(Debug, Clone, Copy, Eq, PartialEq, thiserror::Error)]
pub enum PreconditionError {
    /// Reader name was empty
    #[error("Reader name is required")]
    MissingReaderName,

    /// No card connection is open
    #[error("Card is not connected")]
    NotConnected,
}

impl Error {
    /// Create a new error with context information
    pub fn with_context<S: Into<String>>(self, context: S) -> Self {
        Self::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Create a new error with a dynamic message
    pub fn message<S: Into<String>>(message: S) -> Self {
        Self::Message(message.into())
    }

    /// The transport error at the root of this error, if any
    pub fn transport(&self) -> Option<&TransportError> {
        match self {
            Self::Transport(e) => Some(e),
            Self::Context { source, .. } => source.transport(),
            _ => None,
        }
    }
}

/// Extension trait for Result with APDU Errors
pub trait ResultExt<T> {
    /// Add context to an error
    fn context<S: Into<String>>(self, context: S) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context<S: Into<String>>(self, context: S) -> Self {
        self.map_err(|e| e.with_context(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_keeps_transport_error() {
        let err = Error::from(TransportError::driver(0x8010_0069, "SCARD_W_REMOVED_CARD"))
            .with_context("Failed to select applet");

        assert_eq!(
            err.to_string(),
            "Failed to select applet: Driver error 0x80100069: SCARD_W_REMOVED_CARD"
        );
        assert_eq!(err.transport().and_then(TransportError::code), Some(0x8010_0069));
    }

    #[test]
    fn test_precondition_display() {
        let err = Error::from(PreconditionError::MissingReaderName);
        assert_eq!(err.to_string(), "Reader name is required");
        assert!(err.transport().is_none());
    }
}
