//! The adaptive poller.
//!
//! Each [`AdaptivePoller`] owns one driver task. The driver cycles through
//! `WaitingForTimer -> Fetching -> WaitingForTimer` (or
//! `WaitingForVisibility` while the host is hidden) until the poller is
//! disabled or dropped. Fetches run one at a time: the next wait is only
//! computed once the previous fetch has settled, so there is never a timer
//! pending while a fetch is in flight.

use std::fmt::Display;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, warn};

use super::config::{PollConfig, millis};
use super::schedule::{ActivityClassifier, Schedule, TieredSchedule};
use super::visibility::{AlwaysVisible, Visibility};

/// Observable state of a poller instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    Disabled,
    WaitingForTimer,
    Fetching,
    WaitingForVisibility,
}

impl PollerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disabled => "disabled",
            Self::WaitingForTimer => "waiting_for_timer",
            Self::Fetching => "fetching",
            Self::WaitingForVisibility => "waiting_for_visibility",
        }
    }
}

impl std::fmt::Display for PollerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fetch outcome counters for one poller instance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollStats {
    pub successes: u64,
    pub failures: u64,
    /// Message of the most recent failure, cleared by the next success.
    pub last_error: Option<String>,
}

#[derive(Debug)]
enum Command {
    /// `enabled` changed; the driver re-reads it from [`Status`].
    Toggle,
    /// Carries the disable generation current when the refresh was requested.
    Refresh { disables: u64 },
}

struct Status {
    state: PollerState,
    enabled: bool,
    /// Bumped on every disabled -> enabled transition.
    activation: u64,
    /// Bumped on every enabled -> disabled transition.
    disables: u64,
    in_flight: bool,
    torn_down: bool,
    stats: PollStats,
}

struct Control {
    status: Mutex<Status>,
    commands: mpsc::UnboundedSender<Command>,
}

impl Control {
    fn lock(&self) -> MutexGuard<'_, Status> {
        // Every write leaves Status consistent, so a poisoned guard is still usable.
        self.status
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn set_enabled(&self, enabled: bool) {
        {
            let mut status = self.lock();
            if status.torn_down || status.enabled == enabled {
                return;
            }
            status.enabled = enabled;
            if enabled {
                status.activation += 1;
            } else {
                status.disables += 1;
                if !status.in_flight {
                    status.state = PollerState::Disabled;
                }
            }
        }
        debug!(event = "poller.enabled_changed", enabled);
        let _ = self.commands.send(Command::Toggle);
    }

    fn refresh(&self) {
        let disables = {
            let status = self.lock();
            if status.torn_down {
                return;
            }
            status.disables
        };
        let _ = self.commands.send(Command::Refresh { disables });
    }
}

/// Cloneable control surface for a poller, usable from other tasks.
///
/// Holding a handle does not keep the poller alive; once the owning
/// [`AdaptivePoller`] is dropped every call is a no-op.
#[derive(Clone)]
pub struct PollerHandle {
    control: Arc<Control>,
}

impl PollerHandle {
    /// Enable or disable scheduled fetching.
    ///
    /// Disabling takes effect before this returns: no fetch starts after
    /// it, and any pending timer or visibility wait is abandoned. A fetch
    /// already in flight is allowed to finish.
    pub fn set_enabled(&self, enabled: bool) {
        self.control.set_enabled(enabled);
    }

    /// Request an immediate fetch outside the schedule.
    ///
    /// A refresh still queued when the poller is disabled is dropped; one
    /// requested while already disabled fetches once.
    pub fn refresh(&self) {
        self.control.refresh();
    }

    pub fn is_enabled(&self) -> bool {
        self.control.lock().enabled
    }

    pub fn state(&self) -> PollerState {
        self.control.lock().state
    }
}

/// Repeatedly runs a fetch callback on an interval chosen from the latest
/// payload, exposing the latest successful value.
pub struct AdaptivePoller<T> {
    control: Arc<Control>,
    latest: watch::Receiver<Option<T>>,
    driver: JoinHandle<()>,
}

impl<T> AdaptivePoller<T>
where
    T: Send + Sync + 'static,
{
    /// Start polling with the three-tier schedule from `config.intervals`
    /// on a host that is always visible.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<F, Fut, E, C>(fetch: F, classifier: C, config: PollConfig) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: Display + Send + 'static,
        C: ActivityClassifier<T>,
    {
        Self::spawn_with(
            fetch,
            TieredSchedule::new(config.intervals, classifier),
            config,
            Arc::new(AlwaysVisible),
        )
    }

    /// Start polling with an arbitrary schedule and visibility source.
    ///
    /// `config.intervals` is ignored here; the schedule owns interval
    /// selection.
    pub fn spawn_with<F, Fut, E, S>(
        fetch: F,
        schedule: S,
        config: PollConfig,
        visibility: Arc<dyn Visibility>,
    ) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: Display + Send + 'static,
        S: Schedule<T>,
    {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (latest_tx, latest_rx) = watch::channel(None);

        let state = match (config.enabled, config.run_immediately) {
            (false, _) => PollerState::Disabled,
            (true, true) => PollerState::Fetching,
            (true, false) => PollerState::WaitingForTimer,
        };
        let control = Arc::new(Control {
            status: Mutex::new(Status {
                state,
                enabled: config.enabled,
                activation: u64::from(config.enabled),
                disables: 0,
                in_flight: false,
                torn_down: false,
                stats: PollStats::default(),
            }),
            commands: commands_tx,
        });

        let driver = Driver {
            fetch_fn: fetch,
            schedule,
            visibility,
            config,
            control: Arc::clone(&control),
            latest: latest_tx,
            commands: commands_rx,
            activation: 0,
        };
        let driver = tokio::spawn(driver.run());

        Self {
            control,
            latest: latest_rx,
            driver,
        }
    }
}

impl<T> AdaptivePoller<T> {
    /// A receiver that observes every successful fetch.
    pub fn subscribe(&self) -> watch::Receiver<Option<T>> {
        self.latest.clone()
    }

    pub fn handle(&self) -> PollerHandle {
        PollerHandle {
            control: Arc::clone(&self.control),
        }
    }

    /// See [`PollerHandle::set_enabled`].
    pub fn set_enabled(&self, enabled: bool) {
        self.control.set_enabled(enabled);
    }

    /// Fetch now and reschedule from the result, replacing the pending
    /// timer. Coalesced into the current fetch if one is in flight; while
    /// disabled, fetches once and stays disabled.
    pub fn refresh(&self) {
        self.control.refresh();
    }

    pub fn is_enabled(&self) -> bool {
        self.control.lock().enabled
    }

    pub fn is_fetching(&self) -> bool {
        self.control.lock().in_flight
    }

    pub fn state(&self) -> PollerState {
        self.control.lock().state
    }

    pub fn stats(&self) -> PollStats {
        self.control.lock().stats.clone()
    }
}

impl<T: Clone> AdaptivePoller<T> {
    /// The latest successfully fetched value, or `None` before the first success.
    pub fn latest(&self) -> Option<T> {
        self.latest.borrow().clone()
    }
}

impl<T> Drop for AdaptivePoller<T> {
    fn drop(&mut self) {
        {
            let mut status = self.control.lock();
            status.torn_down = true;
            status.enabled = false;
            status.state = PollerState::Disabled;
        }
        self.driver.abort();
    }
}

enum Step {
    Park,
    Sleep(Instant),
    AwaitVisible,
    /// `manual` holds the disable generation of the refresh that asked for it.
    Fetch { manual: Option<u64> },
    Stop,
}

struct Driver<T, F, S> {
    fetch_fn: F,
    schedule: S,
    visibility: Arc<dyn Visibility>,
    config: PollConfig,
    control: Arc<Control>,
    latest: watch::Sender<Option<T>>,
    commands: mpsc::UnboundedReceiver<Command>,
    /// Activation generation this driver last started from.
    activation: u64,
}

impl<T, F, Fut, E, S> Driver<T, F, S>
where
    T: Send + Sync + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    E: Display + Send + 'static,
    S: Schedule<T>,
{
    async fn run(mut self) {
        let enabled = self.control.lock().enabled;
        let mut step = if enabled { self.activate() } else { Step::Park };

        loop {
            step = match step {
                Step::Park => self.park().await,
                Step::Sleep(deadline) => self.sleep(deadline).await,
                Step::AwaitVisible => self.await_visible().await,
                Step::Fetch { manual } => self.fetch(manual).await,
                Step::Stop => break,
            };
        }
        debug!(event = "poller.driver.stopped");
    }

    fn activate(&mut self) -> Step {
        self.activation = self.control.lock().activation;
        debug!(
            event = "poller.activated",
            run_immediately = self.config.run_immediately,
        );
        if self.config.run_immediately {
            if self.hidden() {
                Step::AwaitVisible
            } else {
                Step::Fetch { manual: None }
            }
        } else {
            Step::Sleep(Instant::now() + self.schedule.initial_interval())
        }
    }

    fn hidden(&self) -> bool {
        self.config.pause_when_hidden && self.visibility.is_hidden()
    }

    fn set_state(&self, state: PollerState) {
        let mut status = self.control.lock();
        if !status.torn_down {
            status.state = state;
        }
    }

    fn on_command(&mut self, command: Option<Command>, resume: Step) -> Step {
        match command {
            None => Step::Stop,
            Some(Command::Refresh { disables }) => Step::Fetch {
                manual: Some(disables),
            },
            Some(Command::Toggle) => {
                let (enabled, activation) = {
                    let status = self.control.lock();
                    (status.enabled, status.activation)
                };
                if !enabled {
                    Step::Park
                } else if activation != self.activation {
                    self.activate()
                } else {
                    resume
                }
            }
        }
    }

    async fn park(&mut self) -> Step {
        self.set_state(PollerState::Disabled);
        let command = self.commands.recv().await;
        match command {
            Some(Command::Toggle) if !self.control.lock().enabled => Step::Park,
            Some(Command::Toggle) => self.activate(),
            other => self.on_command(other, Step::Park),
        }
    }

    async fn sleep(&mut self, deadline: Instant) -> Step {
        self.set_state(PollerState::WaitingForTimer);
        tokio::select! {
            _ = sleep_until(deadline) => {
                if self.hidden() {
                    Step::AwaitVisible
                } else {
                    Step::Fetch { manual: None }
                }
            }
            command = self.commands.recv() => self.on_command(command, Step::Sleep(deadline)),
        }
    }

    async fn await_visible(&mut self) -> Step {
        self.set_state(PollerState::WaitingForVisibility);
        debug!(event = "poller.visibility.paused");
        let visibility = Arc::clone(&self.visibility);
        tokio::select! {
            _ = visibility.visible() => {
                debug!(event = "poller.visibility.resumed");
                Step::Fetch { manual: None }
            }
            command = self.commands.recv() => self.on_command(command, Step::AwaitVisible),
        }
    }

    async fn fetch(&mut self, manual: Option<u64>) -> Step {
        // Checked under the same lock `set_enabled` takes, so a disable that
        // has returned can never be followed by a scheduled fetch.
        {
            let mut status = self.control.lock();
            if status.torn_down {
                return Step::Stop;
            }
            // A refresh only bypasses `enabled` if no disable has happened
            // since it was requested.
            if !status.enabled && manual != Some(status.disables) {
                if manual.is_some() {
                    debug!(event = "poller.refresh.dropped");
                }
                return Step::Park;
            }
            debug_assert!(!status.in_flight, "fetches are serialized by the driver");
            status.in_flight = true;
            status.state = PollerState::Fetching;
        }

        debug!(event = "poller.fetch.started", manual = manual.is_some());
        let started = Instant::now();
        let mut task = tokio::spawn((self.fetch_fn)());

        let outcome = loop {
            tokio::select! {
                joined = &mut task => break joined,
                command = self.commands.recv() => match command {
                    // Poller dropped: let the fetch finish on its own and discard it.
                    None => return Step::Stop,
                    Some(Command::Refresh { .. }) => {
                        debug!(event = "poller.refresh.coalesced");
                    }
                    Some(Command::Toggle) => {}
                },
            }
        };
        let elapsed_ms = millis(started.elapsed());

        let (enabled, activation) = {
            let mut status = self.control.lock();
            status.in_flight = false;
            if status.torn_down {
                return Step::Stop;
            }
            match outcome {
                Ok(Ok(value)) => {
                    status.stats.successes += 1;
                    status.stats.last_error = None;
                    self.latest.send_replace(Some(value));
                    debug!(event = "poller.fetch.completed", elapsed_ms);
                }
                Ok(Err(err)) => {
                    let message = err.to_string();
                    warn!(event = "poller.fetch.failed", error = %message, elapsed_ms);
                    status.stats.failures += 1;
                    status.stats.last_error = Some(message);
                }
                Err(join_err) => {
                    let message = if join_err.is_panic() {
                        "fetch panicked".to_string()
                    } else {
                        join_err.to_string()
                    };
                    warn!(event = "poller.fetch.aborted", error = %message, elapsed_ms);
                    status.stats.failures += 1;
                    status.stats.last_error = Some(message);
                }
            }
            (status.enabled, status.activation)
        };

        if !enabled {
            return Step::Park;
        }
        if activation != self.activation {
            return self.activate();
        }
        self.next_step()
    }

    fn next_step(&self) -> Step {
        if self.hidden() {
            return Step::AwaitVisible;
        }
        let interval: Duration = self.schedule.next_interval(self.latest.borrow().as_ref());
        debug!(
            event = "poller.scheduled",
            interval_ms = millis(interval),
        );
        Step::Sleep(Instant::now() + interval)
    }
}
