//! PIN verification
//!
//! Builds VERIFY commands and classifies the card's answer. Wrong and
//! blocked PINs are ordinary outcomes here, not errors.

use derive_more::Display;
use tracing::debug;

use crate::command::Command;
use crate::executor::Executor;
use crate::response::Response;
use crate::{Error, Result, ResultExt};

/// Instruction byte of VERIFY
pub const INS_VERIFY: u8 = 0x20;

/// Instruction byte of GET DATA
pub const INS_GET_DATA: u8 = 0xCA;

/// Reference control parameter for the global PIN
pub const P2_PIN_REFERENCE: u8 = 0x80;

/// P2 of the retry counter probe
pub const P2_RETRY_COUNTER: u8 = 0xC0;

/// Outcome of a PIN verification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum AuthenticationStatus {
    /// The PIN was accepted
    #[display("PIN verified")]
    Success,
    /// The PIN was rejected, the card still accepts this many attempts
    #[display("Incorrect PIN, {_0} attempts remaining")]
    IncorrectPin(u8),
    /// No attempts remain
    #[display("PIN blocked")]
    PinBlocked,
    /// Any other status word, or an invalid frame
    #[display("PIN verification failed")]
    Failure,
}

impl AuthenticationStatus {
    /// Whether the PIN was accepted
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

/// Build the VERIFY command carrying `pin`
pub fn verify_pin_command(pin: &[u8]) -> Command {
    Command::new_with_data(0x00, INS_VERIFY, 0x00, P2_PIN_REFERENCE, pin.to_vec())
}

/// Build the probe that reports the PIN retry counter
pub const fn pin_retries_command() -> Command {
    Command::new(0x00, INS_GET_DATA, 0x00, P2_RETRY_COUNTER)
}

/// Classify the response to a VERIFY command
pub fn evaluate_pin_response(response: &Response) -> AuthenticationStatus {
    let Some(status) = response.status() else {
        return AuthenticationStatus::Failure;
    };

    if status.is_success() {
        AuthenticationStatus::Success
    } else if let Some(remaining) = status.pin_attempts_remaining() {
        AuthenticationStatus::IncorrectPin(remaining)
    } else if status.is_pin_blocked() {
        AuthenticationStatus::PinBlocked
    } else {
        AuthenticationStatus::Failure
    }
}

/// PIN operations available on every executor
pub trait PinExecutor: Executor {
    /// Send VERIFY for `pin` and return the raw response
    fn verify_pin(&mut self, pin: &[u8]) -> Result<Response> {
        debug!(len = pin.len(), "Verifying PIN");
        self.send(&verify_pin_command(pin)).context("Failed to verify PIN")
    }

    /// Send VERIFY for `pin` and classify the outcome
    fn authenticate(&mut self, pin: &[u8]) -> Result<AuthenticationStatus> {
        let response = self.verify_pin(pin)?;
        Ok(evaluate_pin_response(&response))
    }

    /// Remaining PIN attempts reported by the card, `None` when unknown
    fn remaining_pin_attempts(&mut self) -> Result<Option<u8>> {
        let response = self
            .send(&pin_retries_command())
            .context("Failed to read PIN retry counter")?;
        let status = response.status().ok_or(Error::InvalidResponse)?;
        Ok(status.pin_attempts_remaining())
    }
}

impl<E: Executor + ?Sized> PinExecutor for E {}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::executor::CardExecutor;
    use crate::transport::{MockTransport, TransportError};

    fn response(sw: u16) -> Response {
        Response::new(Bytes::new(), sw)
    }

    #[test]
    fn test_evaluate_pin_response() {
        assert_eq!(evaluate_pin_response(&response(0x9000)), AuthenticationStatus::Success);
        assert_eq!(
            evaluate_pin_response(&response(0x63C3)),
            AuthenticationStatus::IncorrectPin(3)
        );
        assert_eq!(evaluate_pin_response(&response(0x6983)), AuthenticationStatus::PinBlocked);
        assert_eq!(evaluate_pin_response(&response(0x6A82)), AuthenticationStatus::Failure);
    }

    #[test]
    fn test_zero_attempts_is_failure() {
        // 63 C0 carries no attempt count
        assert_eq!(evaluate_pin_response(&response(0x63C0)), AuthenticationStatus::Failure);
        assert_eq!(
            evaluate_pin_response(&Response::from_bytes(Bytes::from_static(&[0x63]))),
            AuthenticationStatus::Failure
        );
    }

    #[test]
    fn test_verify_pin_command_encoding() {
        let bytes = verify_pin_command(b"1234").to_bytes().unwrap();
        assert_eq!(hex::encode_upper(bytes), "002000800431323334");
    }

    #[test]
    fn test_authenticate() {
        let transport = MockTransport::new(&[&[0x63, 0xC2]]);
        let mut executor = CardExecutor::new(transport);

        let status = executor.authenticate(b"0000").unwrap();
        assert_eq!(status, AuthenticationStatus::IncorrectPin(2));
        assert_eq!(status.to_string(), "Incorrect PIN, 2 attempts remaining");
        assert_eq!(executor.transport().sent_hex(), vec!["002000800430303030"]);
    }

    #[test]
    fn test_remaining_pin_attempts() {
        let transport = MockTransport::new(&[&[0x63, 0xC5], &[0x90, 0x00], &[0x90]]);
        let mut executor = CardExecutor::new(transport);

        assert_eq!(executor.remaining_pin_attempts().unwrap(), Some(5));
        assert_eq!(executor.remaining_pin_attempts().unwrap(), None);
        assert_eq!(executor.remaining_pin_attempts().unwrap_err(), Error::InvalidResponse);
        assert_eq!(executor.transport().sent_hex()[0], "00CA00C0");
    }

    #[test]
    fn test_transport_failure_carries_context() {
        let transport = MockTransport::scripted(vec![Err(TransportError::driver(
            0x8010_0069,
            "SCARD_W_REMOVED_CARD",
        ))]);
        let mut executor = CardExecutor::new(transport);

        let err = executor.authenticate(b"1234").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Failed to verify PIN: Driver error 0x80100069: SCARD_W_REMOVED_CARD"
        );
        assert_eq!(err.transport().and_then(TransportError::code), Some(0x8010_0069));

        let err = executor.remaining_pin_attempts().unwrap_err();
        assert!(err.to_string().starts_with("Failed to read PIN retry counter: "));
    }
}
