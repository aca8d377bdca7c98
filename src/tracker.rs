//! Drives a [`WalkSession`] from a live location source and a wall clock.
//!
//! [`WalkTracker`] owns the session behind a mutex shared with two feeders:
//! the location subscription and a ticker thread that calls
//! [`WalkSession::tick`] once per interval. Stopping cancels both before the
//! session is summarized, so the summary reflects only samples that were
//! fully handled.
//!
//! [`replay`] is the offline counterpart: it runs a recorded track through a
//! session with ticks derived from the samples' own timestamps.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use jiff::Timestamp;

use crate::location::{LocationSource, Subscription};
use crate::model::{LocationSample, WalkSummary};
use crate::session::{WalkError, WalkSession};

/// Wall-clock interval between ticks.
pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

type SharedSession = Arc<Mutex<WalkSession>>;

fn lock(session: &SharedSession) -> MutexGuard<'_, WalkSession> {
    session.lock().unwrap_or_else(PoisonError::into_inner)
}

struct Ticker {
    stop: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

impl Ticker {
    fn spawn(session: SharedSession, interval: Duration) -> Self {
        let (stop, stopped) = mpsc::channel::<()>();
        let handle = thread::spawn(move || {
            loop {
                match stopped.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => lock(&session).tick(),
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }
        });
        Self { stop, handle }
    }

    fn halt(self) {
        // The thread may already be gone; a failed send is fine.
        let _ = self.stop.send(());
        if self.handle.join().is_err() {
            tracing::warn!("walk ticker thread panicked");
        }
    }
}

/// A walk fed by a location source in real time.
pub struct WalkTracker {
    session: SharedSession,
    subscription: Option<Subscription>,
    ticker: Option<Ticker>,
    tick_interval: Duration,
}

impl Default for WalkTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl WalkTracker {
    pub fn new() -> Self {
        Self::with_tick_interval(TICK_INTERVAL)
    }

    /// A tracker whose clock ticks at `interval` instead of once a second.
    pub fn with_tick_interval(interval: Duration) -> Self {
        Self {
            session: Arc::new(Mutex::new(WalkSession::new())),
            subscription: None,
            ticker: None,
            tick_interval: interval,
        }
    }

    pub fn is_active(&self) -> bool {
        lock(&self.session).is_active()
    }

    pub fn elapsed_seconds(&self) -> u64 {
        lock(&self.session).elapsed_seconds()
    }

    pub fn distance_meters(&self) -> f64 {
        lock(&self.session).distance_meters()
    }

    /// Starts the session, subscribes to `source`, and starts the clock.
    pub fn start(&mut self, source: &impl LocationSource, now: Timestamp) -> Result<(), WalkError> {
        lock(&self.session).start(now)?;

        let session = Arc::clone(&self.session);
        self.subscription = Some(source.subscribe(Box::new(move |sample: LocationSample| {
            lock(&session).record(sample.position);
        })));
        self.ticker = Some(Ticker::spawn(
            Arc::clone(&self.session),
            self.tick_interval,
        ));
        Ok(())
    }

    /// Blocks until the source stops producing (a replay ran out).
    pub fn wait_for_source(&mut self) {
        if let Some(subscription) = self.subscription.as_mut() {
            subscription.wait();
        }
    }

    /// Cancels the feeders and summarizes the walk.
    pub fn stop(&mut self, now: Timestamp) -> Result<WalkSummary, WalkError> {
        if let Some(mut subscription) = self.subscription.take() {
            subscription.cancel();
        }
        if let Some(ticker) = self.ticker.take() {
            ticker.halt();
        }
        lock(&self.session).stop(now)
    }
}

impl Drop for WalkTracker {
    fn drop(&mut self) {
        if let Some(mut subscription) = self.subscription.take() {
            subscription.cancel();
        }
        if let Some(ticker) = self.ticker.take() {
            ticker.halt();
        }
    }
}

/// Runs a recorded track through a fresh session.
///
/// The walk starts at the first sample and stops at the last; one tick is
/// counted for every whole second between them. Returns `None` for an
/// empty track.
pub fn replay(samples: &[LocationSample]) -> Option<WalkSummary> {
    let first = samples.first()?.position.timestamp;
    let mut session = WalkSession::new();
    session.start(first).ok()?;

    let mut last = first;
    for sample in samples {
        let timestamp = sample.position.timestamp;
        let due = whole_seconds_between(first, timestamp);
        while session.elapsed_seconds() < due {
            session.tick();
        }
        session.record(sample.position);
        last = last.max(timestamp);
    }

    session.stop(last).ok()
}

fn whole_seconds_between(from: Timestamp, to: Timestamp) -> u64 {
    u64::try_from(to.duration_since(from).as_secs()).unwrap_or(0)
}
