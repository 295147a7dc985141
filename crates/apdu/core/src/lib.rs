//! Core types for talking APDU (Application Protocol Data Unit) to smart cards
//!
//! This crate turns a byte-oriented card transport into whole card
//! interactions according to ISO/IEC 7816-4.
//!
//! ## Overview
//!
//! - Encoding commands, including command chaining for long data fields
//! - Decoding responses and interpreting status words
//! - Reassembling responses spread over several GET RESPONSE rounds
//! - Classifying PIN verification outcomes
//! - Identifying cards by their ATR
//!
//! Transports plug in through [`CardTransport`]; card-specific framing comes
//! from a [`CardProfile`].
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![forbid(unsafe_code)]
#![warn(missing_docs, rustdoc::missing_crate_level_docs)]

// Re-export bytes for convenience
pub use bytes::{Bytes, BytesMut};

pub mod atr;
pub mod command;
pub mod error;
pub mod executor;
pub mod pin;
pub mod profile;
pub mod response;
pub mod transport;

pub use atr::{Atr, CardFamily, CardType};
pub use command::Command;
pub use error::{Error, PreconditionError, Result, ResultExt};
pub use executor::{CardExecutor, Executor, ExecutorConfig};
pub use pin::{AuthenticationStatus, PinExecutor};
pub use profile::{CardProfile, CustomProfile, Iso7816Profile};
pub use response::Response;
pub use response::status::StatusWord;
pub use transport::{CardTransport, TransportError};

/// Prelude module containing commonly used traits and types
pub mod prelude {
    pub use crate::{
        AuthenticationStatus, Bytes, CardExecutor, CardProfile, CardTransport, Command, Error,
        Executor, PinExecutor, Response, Result, ResultExt, StatusWord,
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reexports() {
        let cmd = Command::new(0x00, 0xA4, 0x04, 0x00);
        assert_eq!(cmd.class(), 0x00);
        assert_eq!(cmd.instruction(), 0xA4);
        assert_eq!(cmd.p1(), 0x04);
        assert_eq!(cmd.p2(), 0x00);

        let resp = Response::success(Bytes::from_static(&[0x01, 0x02, 0x03]));
        assert!(resp.is_success());
        assert_eq!(resp.payload(), &[0x01, 0x02, 0x03]);
        assert_eq!(resp.status(), Some(StatusWord::new(0x90, 0x00)));
    }
}
