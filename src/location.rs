//! Location sources and cancellable subscriptions.
//!
//! A source pushes [`LocationSample`]s into a callback until the returned
//! [`Subscription`] is cancelled. Cancelling is synchronous: once `cancel`
//! returns, the callback will not run again, and any sample the source had
//! not yet handed over is discarded. Cancelling twice is harmless, and
//! dropping a subscription cancels it.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::{fs, io};

use crate::model::LocationSample;

/// Callback invoked once per sample, in arrival order.
pub type SampleHandler = Box<dyn FnMut(LocationSample) + Send>;

/// Anything that can stream positions.
pub trait LocationSource {
    fn subscribe(&self, on_sample: SampleHandler) -> Subscription;
}

type Slot = Arc<Mutex<Option<SampleHandler>>>;

fn lock(slot: &Slot) -> MutexGuard<'_, Option<SampleHandler>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Handle to an active stream of samples.
pub struct Subscription {
    slot: Slot,
    worker: Option<JoinHandle<()>>,
}

/// The source's end of a subscription.
#[derive(Clone)]
pub struct SampleSink {
    slot: Slot,
}

impl Subscription {
    /// Creates a connected subscription/sink pair around `on_sample`.
    pub fn channel(on_sample: SampleHandler) -> (Self, SampleSink) {
        let slot = Arc::new(Mutex::new(Some(on_sample)));
        let subscription = Self {
            slot: Arc::clone(&slot),
            worker: None,
        };
        (subscription, SampleSink { slot })
    }

    /// Attaches the thread feeding this subscription, so [`Self::wait`] can join it.
    #[must_use]
    pub fn with_worker(mut self, worker: JoinHandle<()>) -> Self {
        self.worker = Some(worker);
        self
    }

    /// Stops delivery. Blocks while a sample is being handled.
    ///
    /// Must not be called from inside the sample handler.
    pub fn cancel(&mut self) {
        if lock(&self.slot).take().is_some() {
            tracing::debug!("location subscription cancelled");
        }
    }

    pub fn is_cancelled(&self) -> bool {
        lock(&self.slot).is_none()
    }

    /// Blocks until the source has nothing more to deliver.
    pub fn wait(&mut self) {
        if let Some(worker) = self.worker.take()
            && worker.join().is_err()
        {
            tracing::warn!("location source thread panicked");
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl SampleSink {
    /// Hands a sample to the subscriber. Returns `false` once cancelled.
    pub fn deliver(&self, sample: LocationSample) -> bool {
        match lock(&self.slot).as_mut() {
            Some(handler) => {
                handler(sample);
                true
            }
            None => false,
        }
    }
}

/// Errors reading a recorded track.
#[derive(Debug, thiserror::Error)]
pub enum TrackError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("line {line}: {source}")]
    Parse {
        line: usize,
        source: serde_json::Error,
    },
}

/// Plays back a recorded track on a background thread.
#[derive(Debug, Clone)]
pub struct ReplaySource {
    samples: Vec<LocationSample>,
    paced: bool,
}

impl ReplaySource {
    /// Replays `samples` as fast as the subscriber takes them.
    pub fn new(samples: Vec<LocationSample>) -> Self {
        Self {
            samples,
            paced: false,
        }
    }

    /// Sleep between samples for the gap between their timestamps.
    #[must_use]
    pub fn paced(mut self, paced: bool) -> Self {
        self.paced = paced;
        self
    }

    /// Loads a JSON-lines track file, one sample per line.
    pub fn from_file(path: &Path) -> Result<Self, TrackError> {
        let contents = fs::read_to_string(path)?;
        Ok(Self::new(parse_track(&contents)?))
    }

    pub fn samples(&self) -> &[LocationSample] {
        &self.samples
    }
}

impl LocationSource for ReplaySource {
    fn subscribe(&self, on_sample: SampleHandler) -> Subscription {
        let (subscription, sink) = Subscription::channel(on_sample);
        let samples = self.samples.clone();
        let paced = self.paced;

        let worker = thread::spawn(move || {
            let mut previous = None;
            for sample in samples {
                if paced && let Some(prev) = previous {
                    let gap = sample.position.timestamp.duration_since(prev);
                    if let Ok(gap) = gap.try_into() {
                        thread::sleep(gap);
                    }
                }
                previous = Some(sample.position.timestamp);
                if !sink.deliver(sample) {
                    break;
                }
            }
        });

        subscription.with_worker(worker)
    }
}

/// Parses a JSON-lines track. Blank lines are skipped.
pub fn parse_track(contents: &str) -> Result<Vec<LocationSample>, TrackError> {
    contents
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line).map_err(|source| TrackError::Parse {
                line: i + 1,
                source,
            })
        })
        .collect()
}
