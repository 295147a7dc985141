//! APDU response definitions
//!
//! A response frame is `Data SW1 SW2`: the last two bytes are always the
//! status word. Frames shorter than two bytes do not fail to parse; they
//! produce an *invalid* response that carries no status and no data.

pub mod status;

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};
use tracing::trace;

use status::StatusWord;

/// Basic APDU response structure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// The frame as received from the transport
    raw: Bytes,
    /// Response payload data (frame minus the status word)
    payload: Bytes,
    /// Status word, absent for invalid frames
    status: Option<StatusWord>,
}

impl Response {
    /// Reconstruct a response from separately known data and status bytes
    pub fn new(payload: impl Into<Bytes>, status: impl Into<StatusWord>) -> Self {
        let payload = payload.into();
        let status = status.into();

        let mut raw = BytesMut::with_capacity(payload.len() + 2);
        raw.put_slice(&payload);
        raw.put_u8(status.sw1);
        raw.put_u8(status.sw2);

        Self {
            raw: raw.freeze(),
            payload,
            status: Some(status),
        }
    }

    /// Create a success response (90 00) carrying the given payload
    pub fn success(payload: impl Into<Bytes>) -> Self {
        Self::new(payload, status::common::SUCCESS)
    }

    /// Decode a raw response frame
    pub fn from_bytes(raw: impl Into<Bytes>) -> Self {
        let raw = raw.into();

        if raw.len() < 2 {
            trace!(len = raw.len(), "Received invalid APDU response frame");
            return Self {
                raw,
                payload: Bytes::new(),
                status: None,
            };
        }

        let split = raw.len() - 2;
        let status = StatusWord::new(raw[split], raw[split + 1]);
        let payload = raw.slice(..split);

        trace!(
            sw1 = format_args!("{:#04x}", status.sw1),
            sw2 = format_args!("{:#04x}", status.sw2),
            payload_len = payload.len(),
            "Parsed APDU response"
        );

        Self {
            raw,
            payload,
            status: Some(status),
        }
    }

    /// The frame exactly as received (or as rebuilt by [`Response::new`])
    pub const fn raw(&self) -> &Bytes {
        &self.raw
    }

    /// Get the response payload data
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Get the status word, `None` if the frame was invalid
    pub const fn status(&self) -> Option<StatusWord> {
        self.status
    }

    /// Whether the frame was shorter than two bytes
    pub const fn is_invalid(&self) -> bool {
        self.status.is_none()
    }

    /// Check if the response indicates success (90 00)
    pub fn is_success(&self) -> bool {
        self.status.is_some_and(|sw| sw.is_success())
    }

    /// Check if the response carries a warning (62 XX / 63 XX)
    pub fn is_warning(&self) -> bool {
        self.status.is_some_and(|sw| sw.is_warning())
    }

    /// Whether the card has more response data pending.
    ///
    /// True on an explicit 61 XX, and also on a success whose payload fills
    /// exactly `max_payload` bytes. The second rule is a heuristic: a
    /// response that legitimately ends on the payload boundary triggers
    /// one extra GET RESPONSE.
    pub fn more_data_available(&self, max_payload: usize) -> bool {
        match self.status {
            Some(sw) if sw.is_more_data_available() => true,
            Some(sw) => sw.is_success() && self.payload.len() == max_payload,
            None => false,
        }
    }
}

impl From<Bytes> for Response {
    fn from(raw: Bytes) -> Self {
        Self::from_bytes(raw)
    }
}

impl From<&[u8]> for Response {
    fn from(raw: &[u8]) -> Self {
        Self::from_bytes(Bytes::copy_from_slice(raw))
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(sw) => write!(
                f,
                "Data: {}, SW1: {:02X}, SW2: {:02X}",
                hex::encode_upper(&self.payload),
                sw.sw1,
                sw.sw2
            ),
            None => write!(f, "Invalid response: {}", hex::encode_upper(&self.raw)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_from_bytes() {
        let resp = Response::from_bytes(Bytes::from_static(&[0x01, 0x02, 0x03, 0x90, 0x00]));
        assert!(!resp.is_invalid());
        assert_eq!(resp.payload(), &[0x01, 0x02, 0x03]);
        assert_eq!(resp.status(), Some(StatusWord::new(0x90, 0x00)));
        assert!(resp.is_success());

        let resp = Response::from_bytes(Bytes::from_static(&[0x6A, 0x82]));
        assert!(resp.payload().is_empty());
        assert!(!resp.is_success());
        assert!(!resp.is_warning());
    }

    #[test]
    fn test_short_frames_are_invalid() {
        let frames: [&[u8]; 2] = [&[], &[0x90]];
        for frame in frames {
            let resp = Response::from(frame);
            assert!(resp.is_invalid());
            assert!(resp.status().is_none());
            assert!(resp.payload().is_empty());
            assert!(!resp.is_success());
            assert!(!resp.more_data_available(0));
        }
    }

    #[test]
    fn test_reconstructed_response_round_trips() {
        let resp = Response::new(vec![0xDE, 0xAD], (0x63, 0xC2));
        assert_eq!(resp.payload(), &[0xDE, 0xAD]);
        assert_eq!(resp.status(), Some(StatusWord::new(0x63, 0xC2)));
        assert_eq!(resp.raw().as_ref(), &[0xDE, 0xAD, 0x63, 0xC2]);
        assert!(resp.is_warning());

        let reparsed = Response::from_bytes(resp.raw().clone());
        assert_eq!(reparsed, resp);
    }

    #[test]
    fn test_more_data_available() {
        // Explicit 61 XX regardless of data length
        assert!(Response::from_bytes(Bytes::from_static(&[0x61, 0x10])).more_data_available(255));
        assert!(Response::new(vec![0u8; 3], (0x61, 0x00)).more_data_available(255));

        // Implicit: success with a full payload
        let full = Response::success(vec![0xAA; 4]);
        assert!(full.more_data_available(4));
        assert!(!full.more_data_available(5));

        // A full payload with a non-success status does not continue
        assert!(!Response::new(vec![0xAA; 4], (0x62, 0x82)).more_data_available(4));
    }

    #[test]
    fn test_response_display() {
        let resp = Response::success(vec![0x01, 0xAB]);
        assert_eq!(resp.to_string(), "Data: 01AB, SW1: 90, SW2: 00");
        let short = Response::from_bytes(Bytes::from_static(&[0x90]));
        assert_eq!(short.to_string(), "Invalid response: 90");
    }
}
