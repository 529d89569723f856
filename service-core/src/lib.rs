//! service-core: Shared infrastructure for the profiles service.
pub mod config;
pub mod error;
pub mod http;
pub mod observability;
pub mod utils;

pub use axum;
pub use reqwest;
pub use serde;
pub use serde_json;
pub use tokio;
pub use tracing;
