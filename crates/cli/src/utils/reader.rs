use cardlink_transport_pcsc::{PcscDeviceManager, PcscError, PcscReader};
use colored::Colorize;
use eyre::OptionExt;

/// Find a reader with a specific name
pub fn find_reader_by_name(
    manager: &PcscDeviceManager,
    reader_name: &str,
) -> eyre::Result<PcscReader> {
    let readers = manager.list_readers()?;

    readers
        .into_iter()
        .find(|r| r.name() == reader_name)
        .ok_or_else(|| PcscError::ReaderNotFound(reader_name.to_string()).into())
}

/// Find a reader with a card inserted
pub fn find_reader_with_card(manager: &PcscDeviceManager) -> eyre::Result<PcscReader> {
    manager
        .list_readers()?
        .into_iter()
        .find(PcscReader::has_card)
        .ok_or_eyre("No card found in any reader!")
}

/// Resolve the reader to use: the named one, or the first holding a card
pub fn resolve_reader(
    manager: &PcscDeviceManager,
    reader_name: Option<&str>,
) -> eyre::Result<PcscReader> {
    match reader_name {
        Some(name) => find_reader_by_name(manager, name),
        None => find_reader_with_card(manager),
    }
}

/// List all available readers
pub fn list_readers(manager: &PcscDeviceManager) -> eyre::Result<()> {
    let readers = match manager.list_readers() {
        Ok(readers) => readers,
        Err(PcscError::NoReadersAvailable) => {
            println!("No readers found!");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    println!("Available readers:");
    for (i, reader) in readers.iter().enumerate() {
        let status = if reader.has_card() {
            "card present".green()
        } else {
            "no card".dimmed()
        };
        println!("{}. {} ({})", i + 1, reader.name(), status);
        if let Some(atr) = reader.atr() {
            println!("   ATR: {atr} [{}]", atr.card_type());
        }
    }

    Ok(())
}
