//! Interval selection strategies.
//!
//! The poller only asks a [`Schedule`] how long to wait; how the payload is
//! judged is up to the caller. [`TieredSchedule`] is the usual three-tier
//! arrangement driven by an [`ActivityClassifier`].

use std::marker::PhantomData;
use std::time::Duration;

use super::config::{ActivityLevel, TierIntervals, millis};

/// Maps the most recently fetched payload to an activity tier.
///
/// Implementations must be pure: the same payload always yields the same
/// tier. `None` means no fetch has succeeded yet.
pub trait ActivityClassifier<T>: Send + Sync + 'static {
    fn classify(&self, latest: Option<&T>) -> ActivityLevel;
}

impl<T, F> ActivityClassifier<T> for F
where
    F: Fn(Option<&T>) -> ActivityLevel + Send + Sync + 'static,
{
    fn classify(&self, latest: Option<&T>) -> ActivityLevel {
        self(latest)
    }
}

/// Decides how long the poller waits before its next fetch.
pub trait Schedule<T>: Send + Sync + 'static {
    /// Wait before the first fetch when the poller does not run immediately.
    fn initial_interval(&self) -> Duration;

    /// Wait after a fetch has settled, given the latest successful payload.
    fn next_interval(&self, latest: Option<&T>) -> Duration;
}

/// Three-tier schedule: the classifier picks a tier, the tier picks a wait.
pub struct TieredSchedule<T, C> {
    intervals: TierIntervals,
    classifier: C,
    _payload: PhantomData<fn(&T)>,
}

impl<T, C> TieredSchedule<T, C>
where
    C: ActivityClassifier<T>,
{
    pub fn new(intervals: TierIntervals, classifier: C) -> Self {
        Self {
            intervals,
            classifier,
            _payload: PhantomData,
        }
    }

    pub fn level(&self, latest: Option<&T>) -> ActivityLevel {
        self.classifier.classify(latest)
    }
}

impl<T, C> Schedule<T> for TieredSchedule<T, C>
where
    T: 'static,
    C: ActivityClassifier<T>,
{
    fn initial_interval(&self) -> Duration {
        self.intervals.idle
    }

    fn next_interval(&self, latest: Option<&T>) -> Duration {
        let level = self.level(latest);
        let interval = self.intervals.for_level(level);
        tracing::trace!(
            event = "poller.schedule.tier_selected",
            tier = %level,
            interval_ms = millis(interval),
        );
        interval
    }
}

/// Single base interval regardless of payload.
#[derive(Debug, Clone, Copy)]
pub struct FixedSchedule(pub Duration);

impl<T> Schedule<T> for FixedSchedule {
    fn initial_interval(&self) -> Duration {
        self.0
    }

    fn next_interval(&self, _latest: Option<&T>) -> Duration {
        self.0
    }
}
