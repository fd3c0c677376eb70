//! Client-side adaptive polling.
//!
//! An [`AdaptivePoller`] keeps a view of server-side state fresh without a
//! push channel: it runs a caller-supplied fetch, asks a [`Schedule`] how
//! long to wait based on the latest payload, and repeats. It pauses while
//! its [`Visibility`] source reports the host hidden and stops cleanly when
//! disabled or dropped.
//!
//! ```no_run
//! use imagineer::poller::{ActivityLevel, AdaptivePoller, PollConfig};
//!
//! # async fn example() {
//! let poller = AdaptivePoller::spawn(
//!     || async { Ok::<_, String>(3u32) },
//!     |pending: Option<&u32>| match pending {
//!         Some(n) if *n > 0 => ActivityLevel::Medium,
//!         _ => ActivityLevel::Idle,
//!     },
//!     PollConfig::default(),
//! );
//! let mut updates = poller.subscribe();
//! while updates.changed().await.is_ok() {
//!     println!("pending jobs: {:?}", *updates.borrow());
//! }
//! # }
//! ```

pub mod config;
pub mod engine;
pub mod schedule;
pub mod visibility;

pub use config::{ActivityLevel, PollConfig, TierIntervals, millis};
pub use engine::{AdaptivePoller, PollStats, PollerHandle, PollerState};
pub use schedule::{ActivityClassifier, FixedSchedule, Schedule, TieredSchedule};
pub use visibility::{AlwaysVisible, PageVisibility, Visibility};
