//! Card profiles
//!
//! A profile supplies the two card-specific numbers the send pipeline
//! needs: how many data bytes fit in one frame and which class bit marks a
//! chained frame.

use std::fmt;

use crate::command::MAX_SHORT_DATA;

/// Chaining bit defined by ISO/IEC 7816-4 (b5 of CLA)
pub const ISO7816_CHAINING_BIT: u8 = 0x10;

/// Card-specific framing parameters
pub trait CardProfile: fmt::Debug + Send {
    /// Maximum number of data bytes per frame.
    ///
    /// Frames are short APDUs, so values above [`MAX_SHORT_DATA`] make
    /// chained frames fail to encode and the GET RESPONSE `Le` saturates at
    /// `0xFF`.
    fn max_payload(&self) -> usize;

    /// Bit OR-ed into CLA on every chained frame except the last
    fn chaining_bit(&self) -> u8;
}

/// Plain ISO/IEC 7816-4 short APDU profile
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Iso7816Profile;

impl CardProfile for Iso7816Profile {
    fn max_payload(&self) -> usize {
        MAX_SHORT_DATA
    }

    fn chaining_bit(&self) -> u8 {
        ISO7816_CHAINING_BIT
    }
}

/// Profile with caller-chosen parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CustomProfile {
    max_payload: usize,
    chaining_bit: u8,
}

impl CustomProfile {
    /// Create a profile; `max_payload` is clamped to `1..=MAX_SHORT_DATA`
    pub const fn new(max_payload: usize, chaining_bit: u8) -> Self {
        let max_payload = if max_payload == 0 {
            1
        } else if max_payload > MAX_SHORT_DATA {
            MAX_SHORT_DATA
        } else {
            max_payload
        };
        Self {
            max_payload,
            chaining_bit,
        }
    }
}

impl CardProfile for CustomProfile {
    fn max_payload(&self) -> usize {
        self.max_payload
    }

    fn chaining_bit(&self) -> u8 {
        self.chaining_bit
    }
}

impl<P: CardProfile + ?Sized> CardProfile for Box<P> {
    fn max_payload(&self) -> usize {
        (**self).max_payload()
    }

    fn chaining_bit(&self) -> u8 {
        (**self).chaining_bit()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_custom_profile_fits_short_apdus() {
        assert_eq!(CustomProfile::new(0, 0x10).max_payload(), 1);
        assert_eq!(CustomProfile::new(128, 0x10).max_payload(), 128);
        assert_eq!(CustomProfile::new(4096, 0x10).max_payload(), MAX_SHORT_DATA);
        assert_eq!(Box::new(Iso7816Profile).chaining_bit(), ISO7816_CHAINING_BIT);
    }
}
