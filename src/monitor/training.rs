use async_trait::async_trait;
use imagineer_common::{JobStatus, TrainingJob};

use super::{Feed, Screen, classify_statuses};
use crate::api::ImagineerClient;
use crate::errors::ApiError;
use crate::poller::ActivityLevel;

/// The LoRA training screen.
pub struct TrainingFeed;

#[async_trait]
impl Feed for TrainingFeed {
    type Payload = Vec<TrainingJob>;

    const SCREEN: Screen = Screen::Training;

    async fn fetch(client: &ImagineerClient) -> Result<Vec<TrainingJob>, ApiError> {
        client.training_runs().await
    }

    fn classify(latest: Option<&Vec<TrainingJob>>) -> ActivityLevel {
        latest.map_or(ActivityLevel::Idle, |runs| {
            classify_statuses(runs.iter().map(|run| run.status))
        })
    }

    fn summarize(runs: &Vec<TrainingJob>) -> String {
        let running: Vec<String> = runs
            .iter()
            .filter(|run| run.status.is_running())
            .map(|run| {
                let name = run.name.clone().unwrap_or_else(|| format!("#{}", run.id));
                match run.progress {
                    Some(progress) => format!("{} {:.0}%", name, progress),
                    None => name,
                }
            })
            .collect();
        let count = |status: JobStatus| runs.iter().filter(|run| run.status == status).count();

        let head = if running.is_empty() {
            "no runs training".to_string()
        } else {
            format!("training {}", running.join(", "))
        };
        format!(
            "{} | {} pending | {} completed | {} failed",
            head,
            count(JobStatus::Pending),
            count(JobStatus::Completed),
            count(JobStatus::Failed)
        )
    }
}
