//! Error types for PC/SC transport

use cardlink_apdu_core::{Error, PreconditionError, TransportError};

/// PC/SC-specific errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PcscError {
    /// Error reported by the PC/SC service
    #[error("PC/SC error: {0}")]
    Pcsc(#[from] pcsc::Error),

    /// No readers available
    #[error("No readers available")]
    NoReadersAvailable,

    /// Reader not found
    #[error("Reader not found: {0}")]
    ReaderNotFound(String),

    /// Reader name cannot be passed to PC/SC
    #[error("Invalid reader name: {0:?}")]
    InvalidReaderName(String),

    /// Reader name was empty
    #[error("Reader name is required")]
    MissingReaderName,

    /// No card present in reader
    #[error("No card present in reader: {0}")]
    NoCard(String),
}

impl PcscError {
    /// Native `SCARD_*` code of a PC/SC failure
    pub const fn code(&self) -> Option<u32> {
        match self {
            Self::Pcsc(e) => Some(*e as u32),
            _ => None,
        }
    }

    /// Symbolic `SCARD_*` name of a PC/SC failure
    pub const fn code_name(&self) -> Option<&'static str> {
        match self {
            Self::Pcsc(e) => Some(code_name(*e)),
            _ => None,
        }
    }
}

/// Symbolic name of a PC/SC error code
pub const fn code_name(error: pcsc::Error) -> &'static str {
    use pcsc::Error as E;

    match error {
        E::InternalError => "SCARD_F_INTERNAL_ERROR",
        E::Cancelled => "SCARD_E_CANCELLED",
        E::InvalidHandle => "SCARD_E_INVALID_HANDLE",
        E::InvalidParameter => "SCARD_E_INVALID_PARAMETER",
        E::NoMemory => "SCARD_E_NO_MEMORY",
        E::InsufficientBuffer => "SCARD_E_INSUFFICIENT_BUFFER",
        E::UnknownReader => "SCARD_E_UNKNOWN_READER",
        E::Timeout => "SCARD_E_TIMEOUT",
        E::SharingViolation => "SCARD_E_SHARING_VIOLATION",
        E::NoSmartcard => "SCARD_E_NO_SMARTCARD",
        E::UnknownCard => "SCARD_E_UNKNOWN_CARD",
        E::ProtoMismatch => "SCARD_E_PROTO_MISMATCH",
        E::NotReady => "SCARD_E_NOT_READY",
        E::InvalidValue => "SCARD_E_INVALID_VALUE",
        E::SystemCancelled => "SCARD_E_SYSTEM_CANCELLED",
        E::CommError => "SCARD_F_COMM_ERROR",
        E::UnknownError => "SCARD_F_UNKNOWN_ERROR",
        E::InvalidAtr => "SCARD_E_INVALID_ATR",
        E::NotTransacted => "SCARD_E_NOT_TRANSACTED",
        E::ReaderUnavailable => "SCARD_E_READER_UNAVAILABLE",
        E::NoService => "SCARD_E_NO_SERVICE",
        E::ServiceStopped => "SCARD_E_SERVICE_STOPPED",
        E::NoReadersAvailable => "SCARD_E_NO_READERS_AVAILABLE",
        E::UnsupportedCard => "SCARD_W_UNSUPPORTED_CARD",
        E::UnresponsiveCard => "SCARD_W_UNRESPONSIVE_CARD",
        E::UnpoweredCard => "SCARD_W_UNPOWERED_CARD",
        E::ResetCard => "SCARD_W_RESET_CARD",
        E::RemovedCard => "SCARD_W_REMOVED_CARD",
        E::SecurityViolation => "SCARD_W_SECURITY_VIOLATION",
        E::WrongChv => "SCARD_W_WRONG_CHV",
        E::ChvBlocked => "SCARD_W_CHV_BLOCKED",
        _ => "SCARD_E_UNEXPECTED",
    }
}

impl From<PcscError> for TransportError {
    fn from(error: PcscError) -> Self {
        match error {
            PcscError::Pcsc(pcsc::Error::Timeout) => Self::Timeout,
            PcscError::Pcsc(pcsc::Error::Cancelled) => Self::Cancelled,
            PcscError::Pcsc(e) => Self::driver(e as u32, format!("{}: {e}", code_name(e))),
            PcscError::NoCard(_) | PcscError::MissingReaderName => Self::NotConnected,
            other => Self::other(other.to_string()),
        }
    }
}

impl From<PcscError> for Error {
    fn from(error: PcscError) -> Self {
        match error {
            PcscError::MissingReaderName => PreconditionError::MissingReaderName.into(),
            other => Self::Transport(other.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_driver_code_and_name() {
        let err = PcscError::from(pcsc::Error::NoSmartcard);
        assert_eq!(err.code(), Some(0x8010_000C));
        assert_eq!(err.code_name(), Some("SCARD_E_NO_SMARTCARD"));

        let transport = TransportError::from(err);
        assert_eq!(transport.code(), Some(0x8010_000C));
        assert!(transport.message().is_some_and(|m| m.starts_with("SCARD_E_NO_SMARTCARD")));
    }

    #[test]
    fn test_precondition_mapping() {
        assert_eq!(
            Error::from(PcscError::MissingReaderName),
            Error::Precondition(PreconditionError::MissingReaderName)
        );
        assert_eq!(
            Error::from(PcscError::NoCard("ACS ACR122U".into())),
            Error::Transport(TransportError::NotConnected)
        );
        assert_eq!(
            TransportError::from(PcscError::Pcsc(pcsc::Error::Timeout)),
            TransportError::Timeout
        );
    }
}
