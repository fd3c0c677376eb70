use serde::{Deserialize, Serialize};

use crate::status::JobStatus;

/// One image-generation job as listed by `GET /api/jobs`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenerationJob {
    pub id: u64,
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub status: JobStatus,
    #[serde(default)]
    pub lora_name: Option<String>,
    #[serde(default)]
    pub batch_id: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// The generation queue: the job executing now, the jobs waiting behind it,
/// and recently finished jobs.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct QueueSnapshot {
    #[serde(default)]
    pub current: Option<GenerationJob>,
    #[serde(default)]
    pub queue: Vec<GenerationJob>,
    #[serde(default)]
    pub history: Vec<GenerationJob>,
}

impl QueueSnapshot {
    /// Nothing running and nothing waiting.
    pub fn is_drained(&self) -> bool {
        self.current.is_none() && self.queue.is_empty()
    }
}
