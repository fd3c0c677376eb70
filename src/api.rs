//! REST client for the Imagineer backend.
//!
//! Only the job-status endpoints the monitors poll are covered. Request
//! timeouts live here: the poller itself never times a fetch out.

use imagineer_common::{QueueSnapshot, ScrapeJob, ScrapeJobsResponse, TrainingJob, TrainingRunsResponse};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::config::ApiSettings;
use crate::errors::ApiError;
use crate::poller::millis;

const JOBS_PATH: &str = "/api/jobs";
const TRAINING_PATH: &str = "/api/training";
const SCRAPING_JOBS_PATH: &str = "/api/scraping/jobs";

/// Longest error body kept in [`ApiError::Status`].
const MAX_ERROR_BODY_CHARS: usize = 200;

/// Cheap to clone; clones share one connection pool.
#[derive(Debug, Clone)]
pub struct ImagineerClient {
    http: reqwest::Client,
    base_url: String,
    admin_token: Option<String>,
}

impl ImagineerClient {
    pub fn new(settings: &ApiSettings) -> Result<Self, ApiError> {
        let base_url = normalize_base_url(&settings.base_url)?;
        let http = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .user_agent(concat!("imagineer/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|source| ApiError::Network {
                endpoint: base_url.clone(),
                source,
            })?;

        Ok(Self {
            http,
            base_url,
            admin_token: settings.admin_token.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `GET /api/jobs`: the generation queue.
    pub async fn queue(&self) -> Result<QueueSnapshot, ApiError> {
        self.get_json(JOBS_PATH).await
    }

    /// `GET /api/training`
    pub async fn training_runs(&self) -> Result<Vec<TrainingJob>, ApiError> {
        let resp: TrainingRunsResponse = self.get_json(TRAINING_PATH).await?;
        Ok(resp.training_runs)
    }

    /// `GET /api/scraping/jobs`
    pub async fn scraping_jobs(&self) -> Result<Vec<ScrapeJob>, ApiError> {
        let resp: ScrapeJobsResponse = self.get_json(SCRAPING_JOBS_PATH).await?;
        Ok(resp.jobs)
    }

    async fn get_json<R: DeserializeOwned>(&self, path: &str) -> Result<R, ApiError> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.http.get(&url).header("Accept", "application/json");
        if let Some(token) = &self.admin_token {
            request = request.bearer_auth(token);
        }

        let started = std::time::Instant::now();
        let resp = request.send().await.map_err(|source| ApiError::Network {
            endpoint: path.to_string(),
            source,
        })?;
        let status = resp.status();
        debug!(
            event = "api.request.completed",
            endpoint = path,
            status = status.as_u16(),
            elapsed_ms = millis(started.elapsed()),
        );

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ApiError::Unauthorized {
                status: status.as_u16(),
                endpoint: path.to_string(),
            });
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                status: status.as_u16(),
                endpoint: path.to_string(),
                body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
            });
        }

        resp.json::<R>().await.map_err(|source| ApiError::Decode {
            endpoint: path.to_string(),
            source,
        })
    }
}

/// Validate the scheme and strip trailing slashes so paths can be appended.
pub fn normalize_base_url(url: &str) -> Result<String, ApiError> {
    let trimmed = url.trim().trim_end_matches('/');
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(ApiError::InvalidBaseUrl {
            url: url.to_string(),
            message: "scheme must be http or https".to_string(),
        });
    }
    let host = trimmed
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or_default();
    if host.is_empty() {
        return Err(ApiError::InvalidBaseUrl {
            url: url.to_string(),
            message: "missing host".to_string(),
        });
    }
    Ok(trimmed.to_string())
}
