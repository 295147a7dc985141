//! Common test utilities

use cardlink_transport_pcsc::{PcscDeviceManager, PcscTransport};

/// Try to get a PC/SC device manager, `None` when no service is running
pub fn get_manager() -> Option<PcscDeviceManager> {
    PcscDeviceManager::new().ok()
}

/// Name of the first reader holding a card
pub fn get_reader_with_card(manager: &PcscDeviceManager) -> Option<String> {
    let readers = manager.list_readers().ok()?;
    readers
        .into_iter()
        .find(|reader| reader.has_card())
        .map(|reader| reader.name().to_string())
}

/// Try to get a connected transport for tests
pub fn get_test_transport() -> Option<PcscTransport> {
    let manager = get_manager()?;
    let reader_name = get_reader_with_card(&manager)?;
    manager.open_reader(&reader_name).ok()
}
