pub mod api;
pub mod config;
pub mod errors;
pub mod logging;
pub mod monitor;
pub mod poller;

pub use api::ImagineerClient;
pub use errors::ApiError;
