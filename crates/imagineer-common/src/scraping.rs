use serde::{Deserialize, Serialize};

use crate::status::JobStatus;

/// A web-scraping job feeding images into an album.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScrapeJob {
    pub id: u64,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub status: JobStatus,
    #[serde(default)]
    pub images_scraped: u64,
    #[serde(default)]
    pub progress_message: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
}

/// Body of `GET /api/scraping/jobs`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScrapeJobsResponse {
    #[serde(default)]
    pub jobs: Vec<ScrapeJob>,
}
