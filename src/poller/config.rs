//! Per-instance polling configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default wait while a job is executing.
pub const DEFAULT_ACTIVE_INTERVAL: Duration = Duration::from_secs(2);

/// Default wait while jobs are queued but none is running.
pub const DEFAULT_MEDIUM_INTERVAL: Duration = Duration::from_secs(10);

/// Default wait while nothing is pending.
pub const DEFAULT_IDLE_INTERVAL: Duration = Duration::from_secs(30);

/// Urgency bucket a classifier assigns to the most recent payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityLevel {
    /// Something is executing right now.
    Active,
    /// Work is waiting but nothing is executing.
    Medium,
    /// Nothing pending. Accepts `base` on the wire.
    #[serde(alias = "base")]
    Idle,
}

impl ActivityLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Medium => "medium",
            Self::Idle => "idle",
        }
    }
}

impl std::fmt::Display for ActivityLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How long to wait before the next fetch at each activity tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierIntervals {
    pub active: Duration,
    pub medium: Duration,
    pub idle: Duration,
}

impl Default for TierIntervals {
    fn default() -> Self {
        Self {
            active: DEFAULT_ACTIVE_INTERVAL,
            medium: DEFAULT_MEDIUM_INTERVAL,
            idle: DEFAULT_IDLE_INTERVAL,
        }
    }
}

impl TierIntervals {
    /// Build intervals, replacing any zero duration with the tier default.
    ///
    /// A zero interval would spin the poller; it is treated as a
    /// misconfiguration rather than a request to poll continuously.
    pub fn new(active: Duration, medium: Duration, idle: Duration) -> Self {
        Self {
            active: non_zero_or(active, DEFAULT_ACTIVE_INTERVAL, ActivityLevel::Active),
            medium: non_zero_or(medium, DEFAULT_MEDIUM_INTERVAL, ActivityLevel::Medium),
            idle: non_zero_or(idle, DEFAULT_IDLE_INTERVAL, ActivityLevel::Idle),
        }
    }

    /// Build intervals from millisecond values.
    pub fn from_millis(active: u64, medium: u64, idle: u64) -> Self {
        Self::new(
            Duration::from_millis(active),
            Duration::from_millis(medium),
            Duration::from_millis(idle),
        )
    }

    /// Same wait at every tier.
    pub fn uniform(interval: Duration) -> Self {
        Self::new(interval, interval, interval)
    }

    pub fn for_level(&self, level: ActivityLevel) -> Duration {
        match level {
            ActivityLevel::Active => self.active,
            ActivityLevel::Medium => self.medium,
            ActivityLevel::Idle => self.idle,
        }
    }
}

/// Whole milliseconds, saturating at `u64::MAX`.
pub fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn non_zero_or(value: Duration, fallback: Duration, level: ActivityLevel) -> Duration {
    if value.is_zero() {
        tracing::warn!(
            event = "poller.config.zero_interval",
            tier = %level,
            fallback_ms = millis(fallback),
        );
        fallback
    } else {
        value
    }
}

/// Immutable configuration for one polling session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub intervals: TierIntervals,
    /// When false the poller starts parked and fetches nothing.
    pub enabled: bool,
    /// Suspend scheduling while the host reports itself hidden.
    pub pause_when_hidden: bool,
    /// Fetch on activation instead of waiting one idle interval first.
    pub run_immediately: bool,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            intervals: TierIntervals::default(),
            enabled: true,
            pause_when_hidden: true,
            run_immediately: true,
        }
    }
}

impl PollConfig {
    pub fn with_intervals(mut self, intervals: TierIntervals) -> Self {
        self.intervals = intervals;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_pause_when_hidden(mut self, pause: bool) -> Self {
        self.pause_when_hidden = pause;
        self
    }

    pub fn with_run_immediately(mut self, run_immediately: bool) -> Self {
        self.run_immediately = run_immediately;
        self
    }
}
