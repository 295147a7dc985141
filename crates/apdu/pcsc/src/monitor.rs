//! Card presence monitoring
//!
//! Every watched reader gets its own worker thread. The worker blocks in a
//! status-change call for at most one poll timeout, compares the reported
//! state with the last one it saw, and sends an event on every
//! insert/eject edge.

use std::collections::HashMap;
use std::ffi::CString;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError, bounded};
use parking_lot::Mutex;
use pcsc::{Context, ReaderState, State};
use tracing::{debug, info, warn};

use crate::config::DEFAULT_POLL_TIMEOUT;
use crate::error::PcscError;
use crate::event::{
    CardEventReceiver, CardEventSender, CardStatus, CardStatusEvent, card_event_channel,
};

/// Source of reader state changes
///
/// States passed through this trait keep the card event counter PC/SC
/// stores in the upper 16 bits. The value returned by one call is handed
/// back as `current` on the next, so the service only reports a change
/// when one actually happened.
pub trait StatusChangeSource: Send + Sync + 'static {
    /// Block until the state of `reader` differs from `current` or `timeout`
    /// elapses. Returns the new event state, or `None` on timeout.
    fn wait_for_change(
        &self,
        reader: &str,
        current: State,
        timeout: Duration,
    ) -> Result<Option<State>, PcscError>;
}

impl StatusChangeSource for Context {
    fn wait_for_change(
        &self,
        reader: &str,
        current: State,
        timeout: Duration,
    ) -> Result<Option<State>, PcscError> {
        let name =
            CString::new(reader).map_err(|_| PcscError::InvalidReaderName(reader.to_string()))?;
        let mut states = [ReaderState::new(name, current)];

        match self.get_status_change(Some(timeout), &mut states) {
            Ok(()) => Ok(Some(event_state_with_count(&states[0]))),
            Err(pcsc::Error::Timeout) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// Event state of `state` with its card event counter reattached
fn event_state_with_count(state: &ReaderState) -> State {
    let count = pcsc::ffi::DWORD::from(state.event_count());
    State::from_bits_retain(state.event_state().bits() | (count << 16))
}

/// Presence edge between two successive reader states
///
/// Nothing is reported while the previous state is still unaware, so the
/// first poll only establishes a baseline.
pub fn detect_transition(current: State, event: State) -> Option<CardStatus> {
    if current.is_empty() {
        return None;
    }

    if event.contains(State::PRESENT) && !current.contains(State::PRESENT) {
        Some(CardStatus::Inserted)
    } else if event.contains(State::EMPTY) && !current.contains(State::EMPTY) {
        Some(CardStatus::Ejected)
    } else {
        None
    }
}

#[derive(Debug)]
struct Watch {
    generation: u64,
    cancel: Sender<()>,
    stopping: bool,
}

impl Watch {
    fn cancel(&mut self) {
        self.stopping = true;
        // A full channel already holds a pending cancellation
        let _ = self.cancel.try_send(());
    }
}

type Registry = Arc<Mutex<HashMap<String, Watch>>>;

/// Watches readers for card insertion and removal
#[derive(Debug)]
pub struct ReaderMonitor<S: StatusChangeSource = Context> {
    source: Arc<S>,
    poll_timeout: Duration,
    registry: Registry,
    next_generation: AtomicU64,
    workers: Mutex<Vec<JoinHandle<()>>>,
    events_tx: CardEventSender,
    events_rx: Mutex<Option<CardEventReceiver>>,
}

impl<S: StatusChangeSource> ReaderMonitor<S> {
    /// Create a monitor polling `source`
    pub fn new(source: S) -> Self {
        let (events_tx, events_rx) = card_event_channel();
        Self {
            source: Arc::new(source),
            poll_timeout: DEFAULT_POLL_TIMEOUT,
            registry: Arc::default(),
            next_generation: AtomicU64::new(0),
            workers: Mutex::new(Vec::new()),
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
        }
    }

    /// Set how long each status-change call may block
    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }

    /// Take the receiver of card status events for all watched readers.
    ///
    /// There is a single receiver, so this returns `Some` only once. Until it
    /// is taken, events queue up inside the monitor. Once the receiver is
    /// dropped, workers stop at their next event.
    pub fn take_events(&self) -> Option<CardEventReceiver> {
        self.events_rx.lock().take()
    }

    /// Start watching `reader`.
    ///
    /// Returns `true` if the reader is being watched afterwards, including
    /// when it already was. Returns `false` when the worker thread could not
    /// be spawned.
    pub fn start_monitoring(&self, reader: &str) -> bool {
        let mut registry = self.registry.lock();

        if registry.get(reader).is_some_and(|watch| !watch.stopping) {
            return true;
        }

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let (cancel, cancelled) = bounded(1);

        let worker = Worker {
            source: Arc::clone(&self.source),
            reader: reader.to_string(),
            generation,
            poll_timeout: self.poll_timeout,
            cancelled,
            events: self.events_tx.clone(),
            registry: Arc::clone(&self.registry),
        };

        let spawned = thread::Builder::new()
            .name(format!("monitor:{reader}"))
            .spawn(move || worker.run());

        match spawned {
            Ok(handle) => {
                registry.insert(
                    reader.to_string(),
                    Watch {
                        generation,
                        cancel,
                        stopping: false,
                    },
                );
                drop(registry);

                let mut workers = self.workers.lock();
                workers.retain(|worker| !worker.is_finished());
                workers.push(handle);
                true
            }
            Err(e) => {
                warn!(reader, error = %e, "Failed to spawn monitor thread");
                false
            }
        }
    }

    /// Ask the worker of `reader` to stop
    pub fn stop_monitoring(&self, reader: &str) {
        if let Some(watch) = self.registry.lock().get_mut(reader) {
            debug!(reader, "Stopping monitor");
            watch.cancel();
        }
    }

    /// Ask every worker to stop
    pub fn stop_all_monitoring(&self) {
        for (reader, watch) in self.registry.lock().iter_mut() {
            debug!(reader = %reader, "Stopping monitor");
            watch.cancel();
        }
    }

    /// Whether `reader` is watched and not being stopped
    pub fn is_monitoring(&self, reader: &str) -> bool {
        self.registry
            .lock()
            .get(reader)
            .is_some_and(|watch| !watch.stopping)
    }

    /// Names of all watched readers
    pub fn monitored_readers(&self) -> Vec<String> {
        let mut readers: Vec<String> = self
            .registry
            .lock()
            .iter()
            .filter(|(_, watch)| !watch.stopping)
            .map(|(reader, _)| reader.clone())
            .collect();
        readers.sort();
        readers
    }

    /// Stop every worker and wait for all of them to exit
    pub fn shutdown(&self) {
        self.stop_all_monitoring();

        let workers = std::mem::take(&mut *self.workers.lock());
        for worker in workers {
            if worker.join().is_err() {
                warn!("Monitor thread panicked");
            }
        }
    }
}

impl<S: StatusChangeSource> Drop for ReaderMonitor<S> {
    fn drop(&mut self) {
        self.stop_all_monitoring();
    }
}

/// State owned by one polling thread
struct Worker<S> {
    source: Arc<S>,
    reader: String,
    generation: u64,
    poll_timeout: Duration,
    cancelled: Receiver<()>,
    events: Sender<CardStatusEvent>,
    registry: Registry,
}

impl<S: StatusChangeSource> Worker<S> {
    fn run(self) {
        info!(reader = %self.reader, "Monitoring started");
        let mut current = State::UNAWARE;

        while !self.is_cancelled() {
            match self.source.wait_for_change(&self.reader, current, self.poll_timeout) {
                Ok(Some(event)) if event.contains(State::CHANGED) => {
                    if let Some(status) = detect_transition(current, event) {
                        debug!(reader = %self.reader, %status, "Card status changed");
                        let status_event = CardStatusEvent::new(self.reader.clone(), status);
                        if self.events.send(status_event).is_err() {
                            debug!(reader = %self.reader, "Event receiver dropped, stopping");
                            break;
                        }
                    }
                    // The event counter bits stay in place for the next call
                    current = event - State::CHANGED;
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(reader = %self.reader, error = %e, "Status change poll failed, retrying");
                    if self.wait_cancelled(self.poll_timeout) {
                        break;
                    }
                }
            }
        }

        let mut registry = self.registry.lock();
        if registry
            .get(&self.reader)
            .is_some_and(|watch| watch.generation == self.generation)
        {
            registry.remove(&self.reader);
        }
        drop(registry);

        info!(reader = %self.reader, "Monitoring stopped");
    }

    fn is_cancelled(&self) -> bool {
        !matches!(self.cancelled.try_recv(), Err(TryRecvError::Empty))
    }

    fn wait_cancelled(&self, timeout: Duration) -> bool {
        !matches!(self.cancelled.recv_timeout(timeout), Err(RecvTimeoutError::Timeout))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::time::Instant;

    use super::*;

    /// Replays scripted poll results, then reports timeouts
    #[derive(Debug, Default)]
    struct ScriptedSource {
        script: Mutex<VecDeque<Result<Option<State>, PcscError>>>,
        seen: Mutex<Vec<State>>,
    }

    impl ScriptedSource {
        fn new(script: Vec<Result<Option<State>, PcscError>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                seen: Mutex::default(),
            }
        }

        fn changed(states: &[State]) -> Self {
            Self::new(states.iter().map(|s| Ok(Some(*s | State::CHANGED))).collect())
        }
    }

    impl StatusChangeSource for Arc<ScriptedSource> {
        fn wait_for_change(
            &self,
            _reader: &str,
            current: State,
            timeout: Duration,
        ) -> Result<Option<State>, PcscError> {
            self.seen.lock().push(current);
            let next = self.script.lock().pop_front();
            match next {
                Some(result) => result,
                None => {
                    thread::sleep(timeout);
                    Ok(None)
                }
            }
        }
    }

    const TICK: Duration = Duration::from_millis(10);

    fn collect(events: &CardEventReceiver, count: usize) -> Vec<CardStatusEvent> {
        (0..count)
            .map_while(|_| events.recv_timeout(Duration::from_secs(2)).ok())
            .collect()
    }

    fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(TICK);
        }
        false
    }

    #[test]
    fn test_detect_transition() {
        assert_eq!(detect_transition(State::UNAWARE, State::PRESENT), None);
        assert_eq!(detect_transition(State::EMPTY, State::PRESENT), Some(CardStatus::Inserted));
        assert_eq!(detect_transition(State::PRESENT, State::EMPTY), Some(CardStatus::Ejected));
        assert_eq!(detect_transition(State::PRESENT, State::PRESENT | State::INUSE), None);
        assert_eq!(detect_transition(State::EMPTY, State::EMPTY), None);
    }

    #[test]
    fn test_edges_from_scripted_states() {
        let source = Arc::new(ScriptedSource::changed(&[
            State::UNAWARE,
            State::EMPTY,
            State::PRESENT,
            State::PRESENT,
            State::EMPTY,
        ]));
        let monitor = ReaderMonitor::new(Arc::clone(&source)).with_poll_timeout(TICK);
        let events = monitor.take_events().unwrap();

        assert!(monitor.start_monitoring("Reader 0"));
        let received = collect(&events, 2);
        assert_eq!(
            received,
            vec![
                CardStatusEvent::new("Reader 0", CardStatus::Inserted),
                CardStatusEvent::new("Reader 0", CardStatus::Ejected),
            ]
        );
        assert!(events.recv_timeout(TICK * 5).is_err());

        monitor.shutdown();
        let seen = source.seen.lock().clone();
        assert_eq!(
            &seen[..5],
            &[State::UNAWARE, State::UNAWARE, State::EMPTY, State::PRESENT, State::PRESENT]
        );
    }

    #[test]
    fn test_event_counter_is_passed_back() {
        let with_count = |state: State, count: pcsc::ffi::DWORD| {
            State::from_bits_retain(state.bits() | (count << 16))
        };
        let source = Arc::new(ScriptedSource::new(vec![
            Ok(Some(with_count(State::CHANGED | State::EMPTY, 4))),
            Ok(Some(with_count(State::CHANGED | State::PRESENT, 5))),
        ]));
        let monitor = ReaderMonitor::new(Arc::clone(&source)).with_poll_timeout(TICK);
        let events = monitor.take_events().unwrap();

        assert!(monitor.start_monitoring("Reader 0"));
        assert_eq!(collect(&events, 1)[0].status, CardStatus::Inserted);
        assert!(wait_until(|| source.seen.lock().len() >= 3));
        monitor.shutdown();

        let seen = source.seen.lock().clone();
        assert_eq!(seen[0], State::UNAWARE);
        assert_eq!(seen[1], with_count(State::EMPTY, 4));
        assert_eq!(seen[2], with_count(State::PRESENT, 5));
        assert!(!seen[2].contains(State::CHANGED));
    }

    #[test]
    fn test_dropped_receiver_stops_worker() {
        let source = Arc::new(ScriptedSource::changed(&[State::EMPTY, State::PRESENT]));
        let monitor = ReaderMonitor::new(source).with_poll_timeout(TICK);
        drop(monitor.take_events());
        assert!(monitor.take_events().is_none());

        assert!(monitor.start_monitoring("Reader 0"));
        assert!(wait_until(|| !monitor.is_monitoring("Reader 0")));
        monitor.shutdown();
    }

    #[test]
    fn test_poll_errors_are_retried() {
        let source = Arc::new(ScriptedSource::new(vec![
            Err(PcscError::Pcsc(pcsc::Error::ReaderUnavailable)),
            Ok(Some(State::CHANGED | State::EMPTY)),
            Err(PcscError::Pcsc(pcsc::Error::NoService)),
            Ok(Some(State::CHANGED | State::PRESENT)),
        ]));
        let monitor = ReaderMonitor::new(source).with_poll_timeout(TICK);
        let events = monitor.take_events().unwrap();

        assert!(monitor.start_monitoring("Reader 0"));
        assert_eq!(
            collect(&events, 1),
            vec![CardStatusEvent::new("Reader 0", CardStatus::Inserted)]
        );
        assert!(monitor.is_monitoring("Reader 0"));
        monitor.shutdown();
    }

    #[test]
    fn test_unchanged_states_are_ignored() {
        let source = Arc::new(ScriptedSource::new(vec![
            Ok(Some(State::CHANGED | State::EMPTY)),
            // Without the changed flag the baseline is kept
            Ok(Some(State::PRESENT)),
            Ok(Some(State::CHANGED | State::PRESENT)),
        ]));
        let monitor = ReaderMonitor::new(source).with_poll_timeout(TICK);
        let events = monitor.take_events().unwrap();

        monitor.start_monitoring("Reader 0");
        assert_eq!(collect(&events, 1)[0].status, CardStatus::Inserted);
        monitor.shutdown();
    }

    #[test]
    fn test_start_is_idempotent() {
        let source = Arc::new(ScriptedSource::default());
        let monitor = ReaderMonitor::new(Arc::clone(&source)).with_poll_timeout(TICK);

        assert!(monitor.start_monitoring("Reader 0"));
        assert!(monitor.start_monitoring("Reader 0"));
        assert!(monitor.start_monitoring("Reader 1"));
        assert_eq!(monitor.monitored_readers(), vec!["Reader 0", "Reader 1"]);
        assert_eq!(monitor.workers.lock().len(), 2);

        monitor.stop_monitoring("Reader 0");
        assert!(!monitor.is_monitoring("Reader 0"));
        assert!(monitor.is_monitoring("Reader 1"));
        assert!(wait_until(|| !monitor.registry.lock().contains_key("Reader 0")));

        monitor.stop_all_monitoring();
        assert!(wait_until(|| monitor.registry.lock().is_empty()));
        monitor.shutdown();
    }

    #[test]
    fn test_restart_after_stop_survives_old_worker_exit() {
        let source = Arc::new(ScriptedSource::default());
        let monitor = ReaderMonitor::new(source).with_poll_timeout(Duration::from_millis(50));

        assert!(monitor.start_monitoring("Reader 0"));
        monitor.stop_monitoring("Reader 0");
        assert!(monitor.start_monitoring("Reader 0"));

        // Give the first worker time to observe cancellation and exit
        thread::sleep(Duration::from_millis(200));
        assert!(monitor.is_monitoring("Reader 0"));
        assert_eq!(monitor.monitored_readers(), vec!["Reader 0"]);

        monitor.shutdown();
        assert!(monitor.monitored_readers().is_empty());
    }

    #[test]
    fn test_stop_unknown_reader_is_noop() {
        let monitor = ReaderMonitor::new(Arc::new(ScriptedSource::default()));
        monitor.stop_monitoring("missing");
        monitor.stop_all_monitoring();
        assert!(monitor.monitored_readers().is_empty());
        monitor.shutdown();
    }
}
