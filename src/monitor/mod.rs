//! Job monitors: one adaptive poller per screen.
//!
//! A [`Feed`] says how a screen fetches, classifies and summarizes its
//! payload. [`Monitor`] wires a feed to an [`AdaptivePoller`] and applies
//! the shared error policy:
//!
//! | Failure                  | Effect                                              |
//! |--------------------------|-----------------------------------------------------|
//! | transient (network, 5xx) | feed's degraded payload if it has one, else stale   |
//! | 401 / 403                | [`AuthGate`] trips, monitor disables its poller     |
//! | anything else            | stale value kept, error recorded in poller stats    |

pub mod queue;
pub mod scraping;
pub mod training;

use std::sync::Arc;

use async_trait::async_trait;
use imagineer_common::JobStatus;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::api::ImagineerClient;
use crate::errors::ApiError;
use crate::poller::{
    ActivityLevel, AdaptivePoller, PollConfig, PollStats, PollerHandle, PollerState,
    TierIntervals, TieredSchedule, Visibility, millis,
};

pub use queue::QueueFeed;
pub use scraping::ScrapingFeed;
pub use training::TrainingFeed;

/// The dashboard screens that poll the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Screen {
    /// Generation queue (`/api/jobs`)
    Queue,
    /// LoRA training runs (`/api/training`)
    Training,
    /// Scraping jobs (`/api/scraping/jobs`)
    Scraping,
}

impl Screen {
    pub const ALL: [Screen; 3] = [Screen::Queue, Screen::Training, Screen::Scraping];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queue => "queue",
            Self::Training => "training",
            Self::Scraping => "scraping",
        }
    }

    /// Training runs last hours, so they are polled more lazily.
    pub fn default_intervals(&self) -> TierIntervals {
        match self {
            Self::Queue => TierIntervals::from_millis(2_000, 10_000, 30_000),
            Self::Training => TierIntervals::from_millis(5_000, 15_000, 60_000),
            Self::Scraping => TierIntervals::from_millis(3_000, 10_000, 30_000),
        }
    }
}

impl std::fmt::Display for Screen {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tier for a list of jobs: anything running is active, anything pending
/// is medium, otherwise idle.
pub fn classify_statuses(statuses: impl IntoIterator<Item = JobStatus>) -> ActivityLevel {
    let mut level = ActivityLevel::Idle;
    for status in statuses {
        if status.is_running() {
            return ActivityLevel::Active;
        }
        if status.is_pending() {
            level = ActivityLevel::Medium;
        }
    }
    level
}

/// One screen's view of the backend.
#[async_trait]
pub trait Feed: Send + Sync + 'static {
    type Payload: Clone + Send + Sync + 'static;

    const SCREEN: Screen;

    async fn fetch(client: &ImagineerClient) -> Result<Self::Payload, ApiError>;

    /// Must be pure; `None` means nothing has been fetched yet.
    fn classify(latest: Option<&Self::Payload>) -> ActivityLevel;

    /// Shown in place of a transient failure. `None` keeps the stale value.
    fn degraded() -> Option<Self::Payload> {
        None
    }

    /// One-line description for terminal output.
    fn summarize(payload: &Self::Payload) -> String;
}

/// The "needs admin auth" flag for one monitor.
#[derive(Debug, Clone)]
pub struct AuthGate {
    tripped: watch::Sender<bool>,
}

impl Default for AuthGate {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthGate {
    pub fn new() -> Self {
        let (tripped, _) = watch::channel(false);
        Self { tripped }
    }

    /// Notifies subscribers on every call, not only the first.
    pub fn trip(&self) {
        self.tripped.send_replace(true);
    }

    pub fn is_tripped(&self) -> bool {
        *self.tripped.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tripped.subscribe()
    }
}

/// Run one fetch for `F`, applying the auth and degradation policy.
pub async fn fetch_guarded<F: Feed>(
    client: &ImagineerClient,
    auth: &AuthGate,
) -> Result<F::Payload, ApiError> {
    match F::fetch(client).await {
        Ok(payload) => Ok(payload),
        Err(err) if err.is_auth() => {
            warn!(event = "monitor.fetch.unauthorized", screen = %F::SCREEN, error = %err);
            auth.trip();
            Err(err)
        }
        Err(err) => match F::degraded() {
            Some(fallback) if err.is_transient() => {
                warn!(event = "monitor.fetch.degraded", screen = %F::SCREEN, error = %err);
                Ok(fallback)
            }
            _ => Err(err),
        },
    }
}

/// A running poller for one screen plus its auth state.
pub struct Monitor<F: Feed> {
    poller: AdaptivePoller<F::Payload>,
    auth: AuthGate,
    auth_guard: JoinHandle<()>,
}

impl<F: Feed> Monitor<F> {
    /// Start polling. Must be called from within a tokio runtime.
    pub fn start(client: ImagineerClient, config: PollConfig, visibility: Arc<dyn Visibility>) -> Self {
        let auth = AuthGate::new();
        let tripped = auth.subscribe();
        let fetch = {
            let auth = auth.clone();
            move || {
                let client = client.clone();
                let auth = auth.clone();
                async move { fetch_guarded::<F>(&client, &auth).await }
            }
        };
        let poller = AdaptivePoller::spawn_with(
            fetch,
            TieredSchedule::new(config.intervals, F::classify),
            config,
            visibility,
        );
        let auth_guard = spawn_auth_guard(F::SCREEN, tripped, poller.handle());

        info!(
            event = "monitor.started",
            screen = %F::SCREEN,
            active_ms = millis(config.intervals.active),
            medium_ms = millis(config.intervals.medium),
            idle_ms = millis(config.intervals.idle),
            pause_when_hidden = config.pause_when_hidden,
        );

        Self {
            poller,
            auth,
            auth_guard,
        }
    }

    pub fn screen(&self) -> Screen {
        F::SCREEN
    }

    pub fn latest(&self) -> Option<F::Payload> {
        self.poller.latest()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<F::Payload>> {
        self.poller.subscribe()
    }

    pub fn handle(&self) -> PollerHandle {
        self.poller.handle()
    }

    pub fn state(&self) -> PollerState {
        self.poller.state()
    }

    pub fn stats(&self) -> PollStats {
        self.poller.stats()
    }

    /// Tier of the latest payload.
    pub fn level(&self) -> ActivityLevel {
        F::classify(self.poller.latest().as_ref())
    }

    /// Pause or resume polling. Resuming is refused (returns `false`)
    /// once admin auth is required.
    pub fn set_enabled(&self, enabled: bool) -> bool {
        if enabled && self.needs_admin_auth() {
            return false;
        }
        self.poller.set_enabled(enabled);
        true
    }

    /// Fetch now. Refused (returns `false`) once admin auth is required.
    pub fn refresh(&self) -> bool {
        if self.needs_admin_auth() {
            return false;
        }
        self.poller.refresh();
        true
    }

    pub fn needs_admin_auth(&self) -> bool {
        self.auth.is_tripped()
    }

    pub fn auth_updates(&self) -> watch::Receiver<bool> {
        self.auth.subscribe()
    }
}

impl<F: Feed> Drop for Monitor<F> {
    fn drop(&mut self) {
        self.auth_guard.abort();
    }
}

fn spawn_auth_guard(
    screen: Screen,
    mut tripped: watch::Receiver<bool>,
    handle: PollerHandle,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        // Every auth failure disables again, even after a resume through a
        // raw PollerHandle.
        while tripped.wait_for(|tripped| *tripped).await.is_ok() {
            handle.set_enabled(false);
            warn!(event = "monitor.auth.polling_disabled", screen = %screen);
            if tripped.changed().await.is_err() {
                break;
            }
        }
    })
}
