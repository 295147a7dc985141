//! PC/SC transport implementation

use std::ffi::CString;
use std::fmt;

use cardlink_apdu_core::prelude::*;
use cardlink_apdu_core::Atr;
use pcsc::{Attribute, Card, Context, Disposition, Protocol};
use tracing::{debug, info, warn};

use crate::{config::PcscConfig, error::PcscError};

/// Card session over one PC/SC reader
///
/// The card handle is released when the transport is dropped.
pub struct PcscTransport {
    /// PC/SC context
    context: Context,
    /// Card connection, if established
    card: Option<Card>,
    /// Reader name
    reader_name: String,
    /// Configuration
    config: PcscConfig,
}

impl fmt::Debug for PcscTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PcscTransport")
            .field("reader_name", &self.reader_name)
            .field("has_card", &self.card.is_some())
            .field("config", &self.config)
            .finish()
    }
}

impl PcscTransport {
    /// Create a disconnected transport for the specified reader
    pub fn new(context: Context, reader_name: &str, config: PcscConfig) -> Result<Self, PcscError> {
        if reader_name.is_empty() {
            return Err(PcscError::MissingReaderName);
        }

        Ok(Self {
            context,
            card: None,
            reader_name: reader_name.to_string(),
            config,
        })
    }

    /// Connect to the card in the reader; no-op when already connected
    pub fn connect(&mut self) -> Result<(), PcscError> {
        if self.card.is_some() {
            return Ok(());
        }

        let reader_cstr = CString::new(self.reader_name.clone())
            .map_err(|_| PcscError::InvalidReaderName(self.reader_name.clone()))?;

        match self.context.connect(
            &reader_cstr,
            self.config.share_mode.into(),
            self.config.protocols,
        ) {
            Ok(card) => {
                info!(reader = %self.reader_name, "Connected to card");
                self.card = Some(card);
                Ok(())
            }
            Err(pcsc::Error::NoSmartcard) => Err(PcscError::NoCard(self.reader_name.clone())),
            Err(pcsc::Error::UnknownReader) => {
                Err(PcscError::ReaderNotFound(self.reader_name.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Disconnect from the card, resetting it
    pub fn disconnect(&mut self) -> Result<(), PcscError> {
        match self.card.take() {
            Some(card) => {
                debug!(reader = %self.reader_name, "Disconnecting from card");
                card.disconnect(Disposition::ResetCard).map_err(|(_, e)| e.into())
            }
            None => Ok(()),
        }
    }

    /// Get the ATR of the current card
    pub fn atr(&self) -> Result<Atr, PcscError> {
        let card = self.card()?;
        let atr = card.get_attribute_owned(Attribute::AtrString)?;
        Ok(Atr::new(atr))
    }

    /// Protocol negotiated for the current connection
    pub fn protocol(&self) -> Result<Option<Protocol>, PcscError> {
        let status = self.card()?.status2_owned()?;
        Ok(status.protocol2())
    }

    /// Get the reader name
    pub fn reader_name(&self) -> &str {
        &self.reader_name
    }

    fn card(&self) -> Result<&Card, PcscError> {
        self.card
            .as_ref()
            .ok_or_else(|| PcscError::NoCard(self.reader_name.clone()))
    }

    /// Transmit a command to the card
    fn transmit_command(&mut self, command: &[u8]) -> Result<Bytes, PcscError> {
        let mut response_buffer = [0u8; pcsc::MAX_BUFFER_SIZE];

        let result = match &self.card {
            Some(card) => card
                .transmit(command, &mut response_buffer)
                .map(Bytes::copy_from_slice),
            None => return Err(PcscError::NoCard(self.reader_name.clone())),
        };

        match result {
            Ok(response) => Ok(response),
            Err(e @ (pcsc::Error::ResetCard | pcsc::Error::RemovedCard)) => {
                // The handle is unusable after a reset or removal
                self.card = None;

                if self.config.auto_reconnect && e == pcsc::Error::ResetCard {
                    warn!(reader = %self.reader_name, "Card was reset, reconnecting");
                    self.connect()?;
                    let card = self.card()?;
                    return card
                        .transmit(command, &mut response_buffer)
                        .map(Bytes::copy_from_slice)
                        .map_err(Into::into);
                }

                Err(e.into())
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl CardTransport for PcscTransport {
    type Error = PcscError;

    fn do_transmit_raw(&mut self, command: &[u8]) -> Result<Bytes, Self::Error> {
        self.transmit_command(command)
    }

    fn is_connected(&self) -> bool {
        self.card.is_some()
    }

    fn reset(&mut self) -> Result<(), Self::Error> {
        self.disconnect()?;
        self.connect()
    }
}

impl Drop for PcscTransport {
    fn drop(&mut self) {
        if let Some(card) = self.card.take() {
            if let Err((_, e)) = card.disconnect(Disposition::LeaveCard) {
                debug!(reader = %self.reader_name, error = %e, "Failed to release card handle");
            }
        }
    }
}
