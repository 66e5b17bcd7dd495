//! Upload observers and monotonic progress tracking.

use crate::backend::BlobReference;
use crate::error::TransferErrorKind;
use parking_lot::Mutex;
use std::sync::Arc;

/// Highest percentage reported before storage acknowledges the blob.
const MAX_IN_FLIGHT_PERCENT: u8 = 99;

/// Receives notifications about one upload.
///
/// All methods default to no-ops so observers implement only what they need.
pub trait UploadObserver: Send + Sync {
    /// Progress advanced to `percent` (0..=100, never decreasing).
    fn on_progress(&self, _percent: u8) {}

    /// Storage acknowledged the blob.
    fn on_complete(&self, _reference: &BlobReference) {}

    /// The upload failed; no reference exists.
    fn on_error(&self, _kind: TransferErrorKind) {}
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl UploadObserver for NoopObserver {}

/// Observer that forwards progress to a closure.
pub struct ClosureObserver<F>(pub F);

impl<F> UploadObserver for ClosureObserver<F>
where
    F: Fn(u8) + Send + Sync,
{
    fn on_progress(&self, percent: u8) {
        (self.0)(percent);
    }
}

/// Broadcasts every notification to several observers.
#[derive(Default, Clone)]
pub struct ProgressFanout {
    observers: Vec<Arc<dyn UploadObserver>>,
}

impl ProgressFanout {
    /// An empty fanout.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a subscriber.
    #[must_use]
    pub fn with(mut self, observer: Arc<dyn UploadObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Number of subscribers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.observers.len()
    }

    /// Whether there are no subscribers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

impl UploadObserver for ProgressFanout {
    fn on_progress(&self, percent: u8) {
        for observer in &self.observers {
            observer.on_progress(percent);
        }
    }

    fn on_complete(&self, reference: &BlobReference) {
        for observer in &self.observers {
            observer.on_complete(reference);
        }
    }

    fn on_error(&self, kind: TransferErrorKind) {
        for observer in &self.observers {
            observer.on_error(kind);
        }
    }
}

/// Turns raw transport percentages into a non-decreasing sequence.
///
/// Duplicate, stale or out-of-order values are dropped. Transport values are
/// held below 100 until [`MonotonicProgress::finish`] is called, so 100 is
/// reported exactly once, after acknowledgement.
pub struct MonotonicProgress {
    last: Mutex<Option<u8>>,
    observer: Arc<dyn UploadObserver>,
}

impl MonotonicProgress {
    /// Track progress for one task, notifying `observer`.
    pub fn new(observer: Arc<dyn UploadObserver>) -> Self {
        Self {
            last: Mutex::new(None),
            observer,
        }
    }

    /// Feed a raw percentage. Returns the value reported, if any.
    pub fn advance(&self, raw: u8) -> Option<u8> {
        self.report(raw.min(MAX_IN_FLIGHT_PERCENT))
    }

    /// Report completion (100).
    pub fn finish(&self) -> Option<u8> {
        self.report(100)
    }

    /// Last reported percentage (0 if none yet).
    #[must_use]
    pub fn current(&self) -> u8 {
        self.last.lock().unwrap_or(0)
    }

    fn report(&self, value: u8) -> Option<u8> {
        // Notify under the lock so concurrent reports reach observers in order.
        let mut last = self.last.lock();
        if last.is_some_and(|prev| value <= prev) {
            return None;
        }
        *last = Some(value);
        self.observer.on_progress(value);
        Some(value)
    }
}
