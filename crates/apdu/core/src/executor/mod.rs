//! Executor for APDU command execution
//!
//! [`CardExecutor`] turns one logical [`Command`] into as many frames as the
//! card needs: long data fields are sent as a chain, and pending response
//! bytes are pulled with GET RESPONSE until the card reports it is done.

use std::fmt;

use bytes::BytesMut;
use tracing::{Level, debug, info, instrument, trace, warn};

use crate::command::Command;
use crate::error::PreconditionError;
use crate::profile::{CardProfile, Iso7816Profile};
use crate::response::Response;
use crate::transport::CardTransport;
use crate::{Error, Result};

/// Default bound on GET RESPONSE rounds for a single command
pub const DEFAULT_MAX_GET_RESPONSE_CHAIN: usize = 32;

/// Trait for APDU command execution
pub trait Executor: fmt::Debug {
    /// Send one logical command and return the reassembled response
    fn send(&mut self, command: &Command) -> Result<Response>;

    /// Reset the executor, including the transport
    fn reset(&mut self) -> Result<()>;
}

/// Tunables of the send pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutorConfig {
    /// Maximum number of GET RESPONSE commands sent for one command
    pub max_get_response_chain: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_get_response_chain: DEFAULT_MAX_GET_RESPONSE_CHAIN,
        }
    }
}

impl ExecutorConfig {
    /// Set the GET RESPONSE bound
    pub const fn with_max_get_response_chain(mut self, max: usize) -> Self {
        self.max_get_response_chain = max;
        self
    }
}

/// Card executor combining a transport with a card profile
#[derive(Debug)]
pub struct CardExecutor<T: CardTransport, P: CardProfile = Iso7816Profile> {
    /// The transport used for communication
    transport: T,
    /// Framing parameters of the card
    profile: P,
    config: ExecutorConfig,
    /// The last response returned by [`Executor::send`]
    last_response: Option<Response>,
}

impl<T: CardTransport> CardExecutor<T> {
    /// Create a new card executor using the ISO/IEC 7816-4 profile
    pub fn new(transport: T) -> Self {
        Self::with_profile(transport, Iso7816Profile)
    }
}

impl<T: CardTransport, P: CardProfile> CardExecutor<T, P> {
    /// Create a new card executor with a specific card profile
    pub fn with_profile(transport: T, profile: P) -> Self {
        Self {
            transport,
            profile,
            config: ExecutorConfig::default(),
            last_response: None,
        }
    }

    /// Replace the pipeline configuration
    pub fn with_config(mut self, config: ExecutorConfig) -> Self {
        self.config = config;
        self
    }

    /// Get a reference to the underlying transport
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// Get a mutable reference to the underlying transport
    pub const fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Take ownership of the transport and return it
    pub fn into_transport(self) -> T {
        self.transport
    }

    /// The card profile in use
    pub const fn profile(&self) -> &P {
        &self.profile
    }

    /// The pipeline configuration in use
    pub const fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Get the last response received
    pub const fn last_response(&self) -> Option<&Response> {
        self.last_response.as_ref()
    }

    /// Encode, transmit and decode a single frame
    fn transmit_frame(&mut self, command: &Command) -> Result<Response> {
        let bytes = command.to_bytes()?;
        let raw = self.transport.transmit_raw(&bytes).map_err(Into::<Error>::into)?;
        Ok(Response::from_bytes(raw))
    }

    /// Send a command whose data exceeds the frame size as a chain.
    ///
    /// Responses to all but the last frame are dropped. A transport failure
    /// on any frame aborts the chain.
    fn transmit_chained(&mut self, command: &Command) -> Result<Response> {
        let chain = command.chained(self.profile.max_payload(), self.profile.chaining_bit());
        let total = chain.len();
        let mut last = None;

        for (index, frame) in chain.enumerate() {
            trace!(index, total, len = frame.data().len(), "Transmitting chained frame");
            let response = self.transmit_frame(&frame)?;
            if index + 1 < total && !response.is_success() {
                debug!(index, %response, "Discarding intermediate chain response");
            }
            last = Some(response);
        }

        last.ok_or(Error::InvalidResponse)
    }

    /// Pull pending response bytes with GET RESPONSE and merge them.
    ///
    /// An invalid frame in answer to GET RESPONSE fails with
    /// [`Error::InvalidResponse`] instead of dropping the data gathered so far.
    fn collect_pending(&mut self, first: Response) -> Result<Response> {
        let max_payload = self.profile.max_payload();
        if !first.more_data_available(max_payload) {
            return Ok(first);
        }

        let get_response = Command::get_response(u8::try_from(max_payload).unwrap_or(u8::MAX));
        let mut data = BytesMut::from(first.payload());
        let mut current = first;
        let mut rounds = 0;

        while current.more_data_available(max_payload) {
            if rounds == self.config.max_get_response_chain {
                return Err(Error::ChainLimitExceeded(rounds));
            }
            rounds += 1;

            debug!(rounds, accumulated = data.len(), "Sending GET RESPONSE");
            current = self.transmit_frame(&get_response)?;
            data.extend_from_slice(current.payload());
        }

        match current.status() {
            Some(status) => Ok(Response::new(data.freeze(), status)),
            // Collected bytes cannot be completed without a status word
            None => {
                warn!(rounds, accumulated = data.len(), "Invalid frame during GET RESPONSE");
                Err(Error::InvalidResponse)
            }
        }
    }
}

impl<T: CardTransport, P: CardProfile> Executor for CardExecutor<T, P> {
    #[instrument(level = "debug", skip_all, fields(cla = command.cla, ins = command.ins))]
    fn send(&mut self, command: &Command) -> Result<Response> {
        if !self.transport.is_connected() {
            return Err(PreconditionError::NotConnected.into());
        }

        let first = if command.needs_chaining(self.profile.max_payload()) {
            self.transmit_chained(command)?
        } else {
            self.transmit_frame(command)?
        };

        let response = self.collect_pending(first)?;

        match response.status() {
            Some(status) => {
                let level = status.tracing_level();
                let description = status.description();
                let len = response.payload().len();
                if level == Level::WARN {
                    warn!(%status, description, len, "Command complete");
                } else if level == Level::INFO {
                    info!(%status, description, len, "Command complete");
                } else {
                    debug!(%status, description, len, "Command complete");
                }
            }
            None => debug!(raw = %hex::encode_upper(response.raw()), "Invalid response frame"),
        }

        self.last_response = Some(response.clone());
        Ok(response)
    }

    fn reset(&mut self) -> Result<()> {
        self.transport.reset().map_err(Into::<Error>::into)?;
        self.last_response = None;
        Ok(())
    }
}
