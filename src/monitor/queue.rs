use async_trait::async_trait;
use imagineer_common::QueueSnapshot;

use super::{Feed, Screen};
use crate::api::ImagineerClient;
use crate::errors::ApiError;
use crate::poller::ActivityLevel;

/// The generation queue screen.
pub struct QueueFeed;

#[async_trait]
impl Feed for QueueFeed {
    type Payload = QueueSnapshot;

    const SCREEN: Screen = Screen::Queue;

    async fn fetch(client: &ImagineerClient) -> Result<QueueSnapshot, ApiError> {
        client.queue().await
    }

    fn classify(latest: Option<&QueueSnapshot>) -> ActivityLevel {
        match latest {
            Some(snapshot) if snapshot.current.is_some() => ActivityLevel::Active,
            Some(snapshot) if !snapshot.queue.is_empty() => ActivityLevel::Medium,
            _ => ActivityLevel::Idle,
        }
    }

    /// An unreachable backend reads as an empty queue.
    fn degraded() -> Option<QueueSnapshot> {
        Some(QueueSnapshot::default())
    }

    fn summarize(snapshot: &QueueSnapshot) -> String {
        let current = match &snapshot.current {
            Some(job) => match job.prompt.as_deref() {
                Some(prompt) => format!("running #{} \"{}\"", job.id, truncate(prompt, 40)),
                None => format!("running #{}", job.id),
            },
            None => "idle".to_string(),
        };
        format!(
            "{} | {} queued | {} finished",
            current,
            snapshot.queue.len(),
            snapshot.history.len()
        )
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    cut.push_str("...");
    cut
}
