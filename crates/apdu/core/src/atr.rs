//! Answer-To-Reset identification
//!
//! ATRs are compared in a normalized textual form: hex digits only, upper
//! case, with spaces and hyphens removed. Identification is an exact match
//! against a static table of known cards.

use std::fmt;

use bytes::Bytes;
use derive_more::Display;

use crate::{Error, Result};

/// Known card types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[allow(missing_docs)]
pub enum CardType {
    #[display("MIFARE Classic 1K")]
    MifareClassic1K,
    #[display("MIFARE Classic 4K")]
    MifareClassic4K,
    #[display("MIFARE Plus S")]
    MifarePlusS,
    #[display("MIFARE Plus X")]
    MifarePlusX,
    #[display("MIFARE Plus SE")]
    MifarePlusSE,
    #[display("MIFARE DESFire EV1")]
    MifareDesfireEv1,
    #[display("MIFARE DESFire EV2")]
    MifareDesfireEv2,
    #[display("MIFARE DESFire EV3")]
    MifareDesfireEv3,
    #[display("MIFARE Ultralight C")]
    MifareUltralightC,
    #[display("MIFARE Ultralight EV1")]
    MifareUltralightEv1,
    #[display("MIFARE ProX")]
    MifareProX,
    #[display("MIFARE SmartMX")]
    MifareSmartMx,
    #[display("EMV contact")]
    EmvContact,
    #[display("EMV contactless")]
    EmvContactless,
    #[display("EMV dual interface")]
    EmvDualInterface,
    #[display("EMVCo tokenization")]
    EmvcoTokenization,
    #[display("Chip and PIN")]
    ChipPin,
    #[display("Chip and signature")]
    ChipSignature,
    #[display("SIM full size (1FF)")]
    SimFullSize1FF,
    #[display("SIM mini (2FF)")]
    SimMini2FF,
    #[display("SIM micro (3FF)")]
    SimMicro3FF,
    #[display("SIM nano (4FF)")]
    SimNano4FF,
    #[display("eSIM")]
    ESim,
    #[display("rSIM")]
    RSim,
    #[display("Soft SIM")]
    SimSoft,
    /// No table entry matched
    #[display("Unknown")]
    Unknown,
}

/// Coarse card family guessed from the leading ATR bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[allow(missing_docs)]
pub enum CardFamily {
    #[display("EMV")]
    Emv,
    #[display("MIFARE")]
    Mifare,
    #[display("SCOSTA")]
    Scosta,
    #[display("SIM")]
    Sim,
    #[display("Unknown")]
    Unknown,
}

/// Normalized ATR to card type
static KNOWN_CARDS: &[(&str, CardType)] = &[
    // MIFARE
    ("3B6700000073C84013009000", CardType::MifareClassic1K),
    ("3B68000073C84012009000", CardType::MifareClassic4K),
    ("3B781A0073C84012109000", CardType::MifarePlusS),
    ("3B781A0073C84012119000", CardType::MifarePlusX),
    ("3B781A0073C84012129000", CardType::MifarePlusSE),
    ("3B7718000073C84012009000", CardType::MifareDesfireEv1),
    ("3B7718000073C84012019000", CardType::MifareDesfireEv2),
    ("3B7718000073C84012029000", CardType::MifareDesfireEv3),
    ("3B771B0073C84012109000", CardType::MifareUltralightC),
    ("3B771B0073C84012119000", CardType::MifareUltralightEv1),
    ("3B8E80018031C0520031730421", CardType::MifareProX),
    ("3B8E80018031C0520031730431", CardType::MifareSmartMx),
    // EMV
    ("3B8E80018031C052003173D221", CardType::EmvContact),
    ("3B8E80018031C052003173D222", CardType::EmvContactless),
    ("3B8E80018031C052003173D223", CardType::EmvDualInterface),
    ("3B8E80018031C052003173D224", CardType::EmvcoTokenization),
    ("3B8E80018031C052003173D225", CardType::ChipPin),
    ("3B8E80018031C052003173D226", CardType::ChipSignature),
    // SIM
    ("3B8E80018031C052003173FF01", CardType::SimFullSize1FF),
    ("3B8E80018031C052003173FF02", CardType::SimMini2FF),
    ("3B8E80018031C052003173FF03", CardType::SimMicro3FF),
    ("3B8E80018031C052003173FF04", CardType::SimNano4FF),
    ("3B8E80018031C052003173FF05", CardType::ESim),
    ("3B8E80018031C052003173FF06", CardType::RSim),
    ("3B8E80018031C052003173FF07", CardType::SimSoft),
];

/// Strip spaces and hyphens and upper-case the rest
pub fn normalize(atr: &str) -> String {
    atr.chars()
        .filter(|c| *c != ' ' && *c != '-')
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Look up the card type of a textual ATR in any common notation
pub fn identify(atr: &str) -> CardType {
    let normalized = normalize(atr);
    KNOWN_CARDS
        .iter()
        .find(|(known, _)| *known == normalized)
        .map_or(CardType::Unknown, |(_, card_type)| *card_type)
}

/// An Answer-To-Reset byte string
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Atr(Bytes);

impl Atr {
    /// Wrap raw ATR bytes
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    /// Parse an ATR written as hex, with or without separators
    pub fn from_hex(atr: &str) -> Result<Self> {
        let bytes = hex::decode(normalize(atr))
            .map_err(|e| Error::message(format!("Invalid ATR {atr:?}: {e}")))?;
        Ok(Self(bytes.into()))
    }

    /// The raw ATR bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Normalized hex form used for table lookups
    pub fn normalized(&self) -> String {
        hex::encode_upper(&self.0)
    }

    /// Identify the card type from the known-card table
    pub fn card_type(&self) -> CardType {
        identify(&self.normalized())
    }

    /// Guess the card family from the leading bytes
    pub fn family(&self) -> CardFamily {
        let normalized = self.normalized();
        if normalized.starts_with("3B65") {
            CardFamily::Emv
        } else if normalized.starts_with("3B8F80") {
            CardFamily::Mifare
        } else if normalized.starts_with("3B3F11008012009131C0640E0146AC72F74105") {
            CardFamily::Scosta
        } else if normalized.starts_with("3B9F") {
            CardFamily::Sim
        } else {
            CardFamily::Unknown
        }
    }
}

impl From<&[u8]> for Atr {
    fn from(bytes: &[u8]) -> Self {
        Self(Bytes::copy_from_slice(bytes))
    }
}

impl AsRef<[u8]> for Atr {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Atr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("-")?;
            }
            write!(f, "{byte:02X}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("3B 65 00 FF"), "3B6500FF");
        assert_eq!(normalize("3b-65-00-ff"), "3B6500FF");
        assert_eq!(normalize("3b6500ff"), normalize("3B 65 00 FF"));
    }

    #[test]
    fn test_identify_any_notation() {
        assert_eq!(identify("3B 65 00 FF"), identify("3b6500ff"));
        assert_eq!(identify("3b6500ff"), CardType::Unknown);

        assert_eq!(identify("3B 67 00 00 00 73 C8 40 13 00 90 00"), CardType::MifareClassic1K);
        assert_eq!(identify("3b-8e-80-01-80-31-c0-52-00-31-73-ff-04"), CardType::SimNano4FF);
        assert_eq!(identify("3B8E80018031C052003173D225"), CardType::ChipPin);
    }

    #[test]
    fn test_identify_requires_exact_match() {
        // Known prefix with a trailing extra byte
        assert_eq!(identify("3B6700000073C8401300900000"), CardType::Unknown);
        assert_eq!(identify(""), CardType::Unknown);
    }

    #[test]
    fn test_table_keys_are_normalized() {
        for (atr, _) in KNOWN_CARDS {
            assert_eq!(normalize(atr), *atr);
            assert!(Atr::from_hex(atr).is_ok());
        }
    }

    #[test]
    fn test_atr_display_and_lookup() {
        let atr = Atr::from_hex("3b 78 1a 00 73 c8 40 12 11 90 00").unwrap();
        assert_eq!(atr.to_string(), "3B-78-1A-00-73-C8-40-12-11-90-00");
        assert_eq!(atr.card_type(), CardType::MifarePlusX);
        assert_eq!(atr.card_type().to_string(), "MIFARE Plus X");
        assert_eq!(Atr::from_hex(&atr.to_string()).unwrap(), atr);
    }

    #[test]
    fn test_family() {
        assert_eq!(Atr::from_hex("3B6500FF").unwrap().family(), CardFamily::Emv);
        assert_eq!(Atr::from_hex("3B8F8001").unwrap().family(), CardFamily::Mifare);
        assert_eq!(Atr::from_hex("3B9F9681").unwrap().family(), CardFamily::Sim);
        assert_eq!(Atr::from(&[0x3B, 0x00][..]).family(), CardFamily::Unknown);
    }

    #[test]
    fn test_invalid_hex() {
        assert!(Atr::from_hex("3B 6").is_err());
        assert!(Atr::from_hex("ZZ").is_err());
    }
}
