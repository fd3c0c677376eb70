use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Lifecycle status reported by the backend for any kind of job.
///
/// The backend is not consistent about spelling across job kinds, so a few
/// aliases are accepted on the wire. Anything unrecognised deserializes to
/// [`JobStatus::Unknown`] instead of failing the whole payload.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    #[serde(alias = "queued", alias = "waiting")]
    Pending,
    #[serde(alias = "in_progress", alias = "training", alias = "scraping", alias = "processing")]
    Running,
    #[serde(alias = "complete", alias = "done", alias = "succeeded")]
    Completed,
    #[serde(alias = "error")]
    Failed,
    #[serde(alias = "canceled")]
    Cancelled,
    #[default]
    #[serde(other)]
    Unknown,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Unknown => "unknown",
        }
    }

    /// The job is executing right now.
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }

    /// The job is accepted but not yet started.
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    /// The job will not change state again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" | "queued" | "waiting" => Ok(Self::Pending),
            "running" | "in_progress" | "training" | "scraping" | "processing" => {
                Ok(Self::Running)
            }
            "completed" | "complete" | "done" | "succeeded" => Ok(Self::Completed),
            "failed" | "error" => Ok(Self::Failed),
            "cancelled" | "canceled" => Ok(Self::Cancelled),
            _ => Err(format!("Invalid job status: {}", s)),
        }
    }
}
