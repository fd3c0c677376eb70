use async_trait::async_trait;
use imagineer_common::{JobStatus, ScrapeJob};

use super::{Feed, Screen, classify_statuses};
use crate::api::ImagineerClient;
use crate::errors::ApiError;
use crate::poller::ActivityLevel;

/// The web-scraping screen.
pub struct ScrapingFeed;

#[async_trait]
impl Feed for ScrapingFeed {
    type Payload = Vec<ScrapeJob>;

    const SCREEN: Screen = Screen::Scraping;

    async fn fetch(client: &ImagineerClient) -> Result<Vec<ScrapeJob>, ApiError> {
        client.scraping_jobs().await
    }

    fn classify(latest: Option<&Vec<ScrapeJob>>) -> ActivityLevel {
        latest.map_or(ActivityLevel::Idle, |jobs| {
            classify_statuses(jobs.iter().map(|job| job.status))
        })
    }

    fn summarize(jobs: &Vec<ScrapeJob>) -> String {
        let active = jobs.iter().filter(|job| job.status.is_running());
        let scraped: u64 = active.clone().map(|job| job.images_scraped).sum();
        let running = active.count();
        let pending = jobs.iter().filter(|job| job.status.is_pending()).count();
        let failed = jobs
            .iter()
            .filter(|job| job.status == JobStatus::Failed)
            .count();

        let mut line = format!(
            "{} running ({} images so far) | {} pending | {} failed",
            running, scraped, pending, failed
        );
        if let Some(message) = jobs
            .iter()
            .filter(|job| job.status.is_running())
            .find_map(|job| job.progress_message.as_deref())
        {
            line.push_str(" | ");
            line.push_str(message);
        }
        line
    }
}
