//! Channel-based event delivery for PC/SC operations

use crossbeam_channel::{Receiver, Sender, unbounded};

use super::CardStatusEvent;

/// Sender for card status events
pub type CardEventSender = Sender<CardStatusEvent>;
/// Receiver for card status events
pub type CardEventReceiver = Receiver<CardStatusEvent>;

/// Create an unbounded channel for card status events
pub fn card_event_channel() -> (CardEventSender, CardEventReceiver) {
    unbounded()
}
