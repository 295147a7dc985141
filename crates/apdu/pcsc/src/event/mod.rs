//! Card presence events raised by the reader monitor

pub mod channel;
pub use channel::*;

use derive_more::Display;

/// Card presence transition observed in a reader
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum CardStatus {
    /// A card was inserted into the reader
    Inserted,
    /// The card was removed from the reader
    Ejected,
}

/// A card presence transition together with the reader it happened in
#[derive(Debug, Clone, PartialEq, Eq, Display)]
#[display("{reader}: {status}")]
pub struct CardStatusEvent {
    /// Reader name
    pub reader: String,
    /// What happened
    pub status: CardStatus,
}

impl CardStatusEvent {
    /// Create a new event
    pub fn new(reader: impl Into<String>, status: CardStatus) -> Self {
        Self {
            reader: reader.into(),
            status,
        }
    }
}
