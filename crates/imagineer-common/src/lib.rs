//! Payload types shared by everything that talks to the Imagineer backend.
//!
//! The backend owns job execution; these types only mirror what its REST
//! endpoints return so clients can classify and render job state.

pub mod jobs;
pub mod scraping;
pub mod status;
pub mod training;

pub use jobs::{GenerationJob, QueueSnapshot};
pub use scraping::{ScrapeJob, ScrapeJobsResponse};
pub use status::JobStatus;
pub use training::{TrainingJob, TrainingRunsResponse};
