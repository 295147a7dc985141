//! Commands that talk to the card in one reader

use cardlink_apdu_core::{atr, prelude::*};
use cardlink_transport_pcsc::PcscTransport;
use eyre::WrapErr;
use tracing::debug;

use crate::config::CliConfig;
use crate::utils::display;

/// Show the ATR of the connected card
pub fn atr_command(transport: &PcscTransport) -> eyre::Result<()> {
    let atr = transport.atr()?;

    let mut items = vec![
        ("Reader", transport.reader_name().to_string()),
        ("ATR", atr.to_string()),
        ("Card type", atr.card_type().to_string()),
        ("Family", atr.family().to_string()),
    ];
    if let Some(protocol) = transport.protocol()? {
        items.push(("Protocol", format!("{protocol:?}")));
    }

    println!("{}", display::key_value_box("Card", items));
    Ok(())
}

/// Identify a card from a textual ATR
pub fn identify_command(atr_text: &str) -> eyre::Result<()> {
    let atr = cardlink_apdu_core::Atr::from_hex(atr_text)?;

    println!(
        "{}",
        display::key_value_box(
            "Card",
            vec![
                ("ATR", atr.to_string()),
                ("Card type", atr::identify(atr_text).to_string()),
                ("Family", atr.family().to_string()),
            ],
        )
    );
    Ok(())
}

/// Send a raw APDU
pub fn send_command(transport: PcscTransport, apdu: &str, config: &CliConfig) -> eyre::Result<()> {
    let bytes = hex::decode(atr::normalize(apdu)).wrap_err("APDU must be hex encoded")?;
    let command = Command::from_bytes(&bytes)?;
    debug!(?command, "Parsed command");

    let mut executor = CardExecutor::new(transport).with_config(config.executor_config());
    let response = executor.send(&command)?;

    println!("{}", display::response(&response));
    Ok(())
}

/// Verify the PIN
pub fn verify_pin_command(
    transport: PcscTransport,
    pin: &str,
    config: &CliConfig,
) -> eyre::Result<()> {
    let mut executor = CardExecutor::new(transport).with_config(config.executor_config());
    let status = executor.authenticate(pin.as_bytes())?;

    println!("{}", display::authentication(status));
    Ok(())
}

/// Show the remaining PIN attempts
pub fn pin_retries_command(transport: PcscTransport, config: &CliConfig) -> eyre::Result<()> {
    let mut executor = CardExecutor::new(transport).with_config(config.executor_config());

    match executor.remaining_pin_attempts()? {
        Some(remaining) => println!("Remaining PIN attempts: {remaining}"),
        None => println!(
            "{}",
            display::warning("The card did not report a retry counter")
        ),
    }
    Ok(())
}
