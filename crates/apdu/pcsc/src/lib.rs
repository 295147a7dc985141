//! PC/SC transport implementation for APDU operations
//!
//! This crate provides an implementation of the `CardTransport` trait from
//! `cardlink-apdu-core` using the PC/SC API, together with a monitor that
//! reports card insertion and removal per reader.
//!
//! # Examples
//!
//! ```no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use cardlink_apdu_core::prelude::*;
//! use cardlink_transport_pcsc::PcscDeviceManager;
//!
//! let manager = PcscDeviceManager::new()?;
//!
//! let readers = manager.list_readers()?;
//! let reader = &readers[0];
//! println!("Connecting to reader: {}", reader.name());
//!
//! let transport = manager.open_reader(reader.name())?;
//! let mut executor = CardExecutor::new(transport);
//!
//! let aid = hex::decode("A000000003000000")?;
//! let response = executor.send(&Command::new_with_data(0x00, 0xA4, 0x04, 0x00, aid))?;
//! println!("Response: {response}");
//! # Ok(())
//! # }
//! ```
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![warn(missing_docs)]

mod config;
mod error;
pub mod event;
mod manager;
mod monitor;
mod reader;
mod transport;

pub use config::{DEFAULT_POLL_TIMEOUT, PcscConfig, Scope, ShareMode};
pub use error::{PcscError, code_name};
pub use event::{CardEventReceiver, CardStatus, CardStatusEvent};
pub use manager::PcscDeviceManager;
pub use monitor::{ReaderMonitor, StatusChangeSource, detect_transition};
pub use reader::PcscReader;
pub use transport::PcscTransport;

// Re-export some pcsc types for convenience
pub use pcsc::{Protocol, Protocols, State};
