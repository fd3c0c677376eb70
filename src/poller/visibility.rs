//! Host visibility as an injected capability.
//!
//! A poller configured with `pause_when_hidden` asks its [`Visibility`]
//! whether the host is hidden after each fetch and, if so, waits for
//! [`Visibility::visible`] before fetching again. The poller never changes
//! visibility itself.

use async_trait::async_trait;
use tokio::sync::watch;

#[async_trait]
pub trait Visibility: Send + Sync + 'static {
    /// Whether the host is currently hidden from the user.
    fn is_hidden(&self) -> bool;

    /// Resolves once the host is visible. Resolves immediately if it
    /// already is. Dropping the future abandons the wait.
    async fn visible(&self);
}

/// A host that is never hidden.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysVisible;

#[async_trait]
impl Visibility for AlwaysVisible {
    fn is_hidden(&self) -> bool {
        false
    }

    async fn visible(&self) {}
}

/// Visibility toggled by whoever owns the host surface.
///
/// Clones share the same state, so one clone can be handed to a poller
/// while another flips it from an input handler.
#[derive(Debug, Clone)]
pub struct PageVisibility {
    hidden: watch::Sender<bool>,
}

impl Default for PageVisibility {
    fn default() -> Self {
        Self::new()
    }
}

impl PageVisibility {
    /// Starts visible.
    pub fn new() -> Self {
        let (hidden, _) = watch::channel(false);
        Self { hidden }
    }

    pub fn set_hidden(&self, hidden: bool) {
        let changed = self.hidden.send_if_modified(|current| {
            if *current == hidden {
                false
            } else {
                *current = hidden;
                true
            }
        });
        if changed {
            tracing::debug!(event = "poller.visibility.changed", hidden);
        }
    }

    pub fn hide(&self) {
        self.set_hidden(true);
    }

    pub fn show(&self) {
        self.set_hidden(false);
    }
}

#[async_trait]
impl Visibility for PageVisibility {
    fn is_hidden(&self) -> bool {
        *self.hidden.borrow()
    }

    async fn visible(&self) {
        let mut rx = self.hidden.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait.
        let _ = rx.wait_for(|hidden| !*hidden).await;
    }
}
