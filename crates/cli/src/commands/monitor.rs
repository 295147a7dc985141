//! Card insertion and removal monitoring

use std::time::{Duration, Instant};

use cardlink_transport_pcsc::{PcscDeviceManager, ReaderMonitor, StatusChangeSource};
use crossbeam_channel::RecvTimeoutError;
use eyre::OptionExt;
use tracing::{info, warn};

use crate::utils::display;

/// Granularity of the deadline check while waiting for events
const TICK: Duration = Duration::from_millis(250);

/// Print card events for the given readers until the deadline passes
pub fn monitor_command(
    manager: &PcscDeviceManager,
    readers: Vec<String>,
    seconds: Option<u64>,
) -> eyre::Result<()> {
    let readers = if readers.is_empty() {
        manager
            .list_readers()?
            .into_iter()
            .map(|reader| reader.name().to_string())
            .collect()
    } else {
        readers
    };

    let monitor = manager.monitor();
    let events = monitor
        .take_events()
        .ok_or_eyre("Monitor events were already taken")?;
    let started = start_readers(&monitor, &readers)?;
    info!(readers = ?started, "Monitoring readers");

    let deadline = seconds.map(|s| Instant::now() + Duration::from_secs(s));
    loop {
        if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            break;
        }

        match events.recv_timeout(TICK) {
            Ok(event) => println!("{}", display::card_event(&event)),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    monitor.shutdown();
    Ok(())
}

/// Start a worker per reader, warning about readers that could not be watched
fn start_readers<S: StatusChangeSource>(
    monitor: &ReaderMonitor<S>,
    readers: &[String],
) -> eyre::Result<Vec<String>> {
    for reader in readers {
        if !monitor.start_monitoring(reader) {
            warn!(reader = %reader, "Could not start monitoring reader");
        }
    }

    let started = monitor.monitored_readers();
    eyre::ensure!(!started.is_empty(), "No reader could be monitored");
    Ok(started)
}
