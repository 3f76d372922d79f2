//! # Configuration
//!
//! Environment-driven controller and server configuration.
//!
//! - `controller`: reconciliation timings, backoff and concurrency limits
//! - `ServerConfig`: metrics/probe server settings

mod controller;

use std::sync::Arc;

pub use controller::{ControllerConfig, ServerConfig};

/// Controller configuration shared between the watch loop and reconcilers
pub type SharedControllerConfig = Arc<ControllerConfig>;

/// Server configuration shared with the startup probe
pub type SharedServerConfig = Arc<ServerConfig>;

/// Load both configuration blocks from the environment
#[must_use]
pub fn create_shared_config() -> (SharedControllerConfig, SharedServerConfig) {
    (
        Arc::new(ControllerConfig::from_env()),
        Arc::new(ServerConfig::from_env()),
    )
}
