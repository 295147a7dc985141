//! Device manager for PC/SC operations

use std::fmt;

use pcsc::{Context, ReaderState, State};
use tracing::debug;

use crate::config::PcscConfig;
use crate::error::PcscError;
use crate::monitor::ReaderMonitor;
use crate::reader::PcscReader;
use crate::transport::PcscTransport;

/// Manager for PC/SC device operations
pub struct PcscDeviceManager {
    /// PC/SC context
    context: Context,
    /// Configuration handed to transports and monitors
    config: PcscConfig,
}

impl fmt::Debug for PcscDeviceManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PcscDeviceManager")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl PcscDeviceManager {
    /// Create a new PC/SC device manager in the user scope
    pub fn new() -> Result<Self, PcscError> {
        Self::with_config(PcscConfig::default())
    }

    /// Create a device manager with a custom configuration
    pub fn with_config(config: PcscConfig) -> Result<Self, PcscError> {
        let context = Context::establish(config.scope.into())?;
        debug!(scope = ?config.scope, "Established PC/SC context");
        Ok(Self { context, config })
    }

    /// The configuration in use
    pub const fn config(&self) -> &PcscConfig {
        &self.config
    }

    /// List all available card readers
    pub fn list_readers(&self) -> Result<Vec<PcscReader>, PcscError> {
        let readers = match self.context.list_readers_owned() {
            Ok(readers) => readers,
            Err(pcsc::Error::NoReadersAvailable) => return Err(PcscError::NoReadersAvailable),
            Err(e) => return Err(e.into()),
        };
        if readers.is_empty() {
            return Err(PcscError::NoReadersAvailable);
        }

        let mut result = Vec::with_capacity(readers.len());

        for reader_name in readers {
            let mut reader_states = [ReaderState::new(reader_name.clone(), State::UNAWARE)];

            match self.context.get_status_change(None, &mut reader_states) {
                Ok(()) => result.push(PcscReader::from_reader_state(&reader_states[0])),
                Err(e) => {
                    debug!(reader = ?reader_name, error = %e, "Failed to read reader state");
                    // If we can't get status, assume no card
                    result.push(PcscReader::new(
                        reader_name.to_string_lossy().into_owned(),
                        false,
                        None,
                    ));
                }
            }
        }

        Ok(result)
    }

    /// Open a card session on a specific reader
    pub fn open_reader(&self, reader_name: &str) -> Result<PcscTransport, PcscError> {
        self.open_reader_with_config(reader_name, self.config.clone())
    }

    /// Open a card session on a specific reader with custom configuration
    pub fn open_reader_with_config(
        &self,
        reader_name: &str,
        config: PcscConfig,
    ) -> Result<PcscTransport, PcscError> {
        let mut transport = PcscTransport::new(self.context.clone(), reader_name, config)?;
        transport.connect()?;
        Ok(transport)
    }

    /// Create a reader monitor sharing this manager's context
    pub fn monitor(&self) -> ReaderMonitor {
        ReaderMonitor::new(self.context.clone()).with_poll_timeout(self.config.poll_timeout)
    }
}
