use serde::{Deserialize, Serialize};

use crate::status::JobStatus;

/// A LoRA training run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrainingJob {
    pub id: u64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub status: JobStatus,
    /// Completion in the range `0.0..=100.0` when the backend reports it.
    #[serde(default)]
    pub progress: Option<f64>,
    #[serde(default)]
    pub album_ids: Vec<u64>,
    #[serde(default)]
    pub output_path: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
}

/// Body of `GET /api/training`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrainingRunsResponse {
    #[serde(default)]
    pub training_runs: Vec<TrainingJob>,
}
