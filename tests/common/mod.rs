//! Test doubles shared by the monitor test binaries.
//!
//! - `ScriptedLayer`: transport whose completions the test delivers by hand
//! - `ManualTimer`: timer source that fires only when told to
//! - `Journal`: ordered log of hook calls and observer notifications
//! - `Fixture`: a monitor wired to all of the above

#![allow(dead_code)]


use phys_monitor::{
    ConnectionState, MonitorConfig, PhysLayerMonitor, PhysicalLayer, PhysicalLayerHandler,
    StateObserver, TimerCallback, TimerSource, TimerToken, UpperLayerHook,
};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

/// Status of a [`ScriptedLayer`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    #[default]
    Closed,
    Opening,
    Open,
    /// Close requested while opening; completes as an open failure.
    Cancelling,
    /// Close requested while open; completes as lower layer down.
    Closing,
}

#[derive(Default)]
struct ScriptedInner {
    handler: Option<Weak<dyn PhysicalLayerHandler>>,
    status: Status,
    opens: usize,
    closes: usize,
}

/// Transport whose completions are delivered explicitly by the test.
///
/// Opening an already opening or open transport panics, so any double open
/// issued by the monitor fails the test.
#[derive(Default)]
pub struct ScriptedLayer {
    inner: Mutex<ScriptedInner>,
}

impl ScriptedLayer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn status(&self) -> Status {
        self.inner.lock().unwrap().status
    }

    pub fn opens(&self) -> usize {
        self.inner.lock().unwrap().opens
    }

    pub fn closes(&self) -> usize {
        self.inner.lock().unwrap().closes
    }

    /// Moves to `to` if the current status is one of `from`, returning the
    /// bound handler. The lock is released before the handler is called.
    fn transition(&self, from: &[Status], to: Status) -> Arc<dyn PhysicalLayerHandler> {
        let mut inner = self.inner.lock().unwrap();
        assert!(
            from.contains(&inner.status),
            "unexpected transport status {:?}",
            inner.status
        );
        inner.status = to;
        inner
            .handler
            .as_ref()
            .and_then(Weak::upgrade)
            .expect("transport has a live handler")
    }

    /// Completes a pending open successfully.
    pub fn succeed_open(&self) {
        self.transition(&[Status::Opening], Status::Open)
            .on_lower_layer_up();
    }

    /// Completes a pending (or cancelled) open with a failure.
    pub fn fail_open(&self) {
        self.transition(&[Status::Opening, Status::Cancelling], Status::Closed)
            .on_open_failure();
    }

    /// Completes a requested close of an open transport.
    pub fn complete_close(&self) {
        self.transition(&[Status::Closing], Status::Closed)
            .on_lower_layer_down();
    }

    /// The link drops without anyone asking.
    pub fn lose_link(&self) {
        self.transition(&[Status::Open], Status::Closed)
            .on_lower_layer_down();
    }

    /// Delivers whatever completion is outstanding. Returns `false` when
    /// nothing is in flight.
    pub fn settle(&self) -> bool {
        match self.status() {
            Status::Opening | Status::Cancelling => self.fail_open(),
            Status::Closing => self.complete_close(),
            Status::Closed | Status::Open => return false,
        }
        true
    }
}

impl PhysicalLayer for ScriptedLayer {
    fn set_handler(&self, handler: Weak<dyn PhysicalLayerHandler>) {
        self.inner.lock().unwrap().handler = Some(handler);
    }

    fn can_open(&self) -> bool {
        self.status() == Status::Closed
    }

    fn can_close(&self) -> bool {
        matches!(self.status(), Status::Opening | Status::Open)
    }

    fn is_closed(&self) -> bool {
        self.status() == Status::Closed
    }

    fn async_open(&self) {
        let mut inner = self.inner.lock().unwrap();
        assert_eq!(inner.status, Status::Closed, "open issued twice");
        inner.status = Status::Opening;
        inner.opens += 1;
    }

    fn async_close(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.status = match inner.status {
            Status::Opening => Status::Cancelling,
            Status::Open => Status::Closing,
            // Raced with a completion that already took the link down.
            Status::Closed | Status::Cancelling | Status::Closing => return,
        };
        inner.closes += 1;
    }
}

struct Scheduled {
    token: TimerToken,
    callback: TimerCallback,
}

#[derive(Default)]
struct TimerLog {
    pending: Vec<Scheduled>,
    delays: Vec<Duration>,
    fired: usize,
    max_outstanding: usize,
}

/// Timer source that fires only when the test says so.
#[derive(Default)]
pub struct ManualTimer {
    log: Mutex<TimerLog>,
}

impl ManualTimer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Timers scheduled and neither cancelled nor fired.
    pub fn outstanding(&self) -> usize {
        let log = self.log.lock().unwrap();
        log.pending
            .iter()
            .filter(|s| !s.token.is_cancelled())
            .count()
    }

    /// Highest number of live timers ever observed at once.
    pub fn max_outstanding(&self) -> usize {
        self.log.lock().unwrap().max_outstanding
    }

    pub fn scheduled(&self) -> usize {
        self.log.lock().unwrap().delays.len()
    }

    pub fn fired(&self) -> usize {
        self.log.lock().unwrap().fired
    }

    pub fn delays(&self) -> Vec<Duration> {
        self.log.lock().unwrap().delays.clone()
    }

    /// Fires the oldest live timer. Returns `false` if none is live.
    pub fn fire_next(&self) -> bool {
        let due = {
            let mut log = self.log.lock().unwrap();
            log.pending.retain(|s| !s.token.is_cancelled());
            if log.pending.is_empty() {
                return false;
            }
            log.fired += 1;
            log.pending.remove(0)
        };
        (due.callback)();
        true
    }
}

impl TimerSource for ManualTimer {
    fn schedule(&self, delay: Duration, callback: TimerCallback) -> TimerToken {
        let token = TimerToken::new();
        let mut log = self.log.lock().unwrap();
        log.pending.push(Scheduled {
            token: token.clone(),
            callback,
        });
        log.delays.push(delay);
        let live = log
            .pending
            .iter()
            .filter(|s| !s.token.is_cancelled())
            .count();
        log.max_outstanding = log.max_outstanding.max(live);
        token
    }
}

/// One entry of a [`Journal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entry {
    Opened,
    OpenFailed,
    Closed,
    Observer(ConnectionState),
    HookState(ConnectionState),
}

/// Ordered record of everything the monitor told its hook and observers.
#[derive(Debug, Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<Entry>>>);

impl Journal {
    pub fn push(&self, entry: Entry) {
        self.0.lock().unwrap().push(entry);
    }

    pub fn entries(&self) -> Vec<Entry> {
        self.0.lock().unwrap().clone()
    }

    /// States in the order the observer saw them.
    pub fn states(&self) -> Vec<ConnectionState> {
        self.entries()
            .into_iter()
            .filter_map(|e| match e {
                Entry::Observer(state) => Some(state),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, entry: Entry) -> usize {
        self.entries().into_iter().filter(|e| *e == entry).count()
    }

    pub fn clear(&self) {
        self.0.lock().unwrap().clear();
    }
}

/// Upper-layer hook that writes to a journal.
pub struct RecordingHook(pub Journal);

impl UpperLayerHook for RecordingHook {
    fn on_physical_layer_open(&self) {
        self.0.push(Entry::Opened);
    }

    fn on_physical_layer_open_failure(&self) {
        self.0.push(Entry::OpenFailed);
    }

    fn on_physical_layer_close(&self) {
        self.0.push(Entry::Closed);
    }

    fn on_state_change(&self, state: ConnectionState) {
        self.0.push(Entry::HookState(state));
    }
}

/// Observer that writes to a journal.
pub struct JournalObserver(pub Journal);

impl StateObserver for JournalObserver {
    fn on_state_change(&self, state: ConnectionState) {
        self.0.push(Entry::Observer(state));
    }
}

pub const RETRY: Duration = Duration::from_millis(100);

/// A monitor over a scripted transport and a manual timer, journaled.
pub struct Fixture {
    pub monitor: Arc<PhysLayerMonitor>,
    pub phys: Arc<ScriptedLayer>,
    pub timers: Arc<ManualTimer>,
    pub journal: Journal,
    pub observer: Arc<JournalObserver>,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_config(MonitorConfig::builder().name("fixture").open_retry(RETRY).build())
    }

    pub fn with_config(config: MonitorConfig) -> Self {
        let phys = ScriptedLayer::new();
        let timers = ManualTimer::new();
        let journal = Journal::default();
        let monitor = PhysLayerMonitor::with_hook(
            config,
            phys.clone(),
            timers.clone(),
            RecordingHook(journal.clone()),
        );
        let observer = Arc::new(JournalObserver(journal.clone()));
        monitor.add_monitor(&observer);

        Self {
            monitor,
            phys,
            timers,
            journal,
            observer,
        }
    }

    /// Drives the monitor to `Open`.
    pub fn open(&self) {
        self.monitor.start();
        self.phys.succeed_open();
        assert_eq!(self.monitor.state(), ConnectionState::Open);
    }

    /// Drives the monitor to `Waiting` after one failed open.
    pub fn waiting(&self) {
        self.monitor.start();
        self.phys.fail_open();
        assert_eq!(self.monitor.state(), ConnectionState::Waiting);
    }
}
