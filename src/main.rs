//! # Boilerr Controller
//!
//! Runs SteamCMD dedicated game servers on Kubernetes.
//!
//! ## Overview
//!
//! - **GameDefinition** (cluster-scoped): a reusable template describing how to
//!   install and launch one game: Steam app id, command, ports, config schema.
//! - **SteamServer** (namespaced): one server instance referencing a template
//!   by name, with its own config values, storage and service settings.
//!
//! For each SteamServer the controller keeps a ConfigMap (when the template
//! renders config files), a PersistentVolumeClaim, a StatefulSet and a
//! Service in sync, and reports state, address and ports back on the status.
//!
//! ## Endpoints
//!
//! - `/metrics`, `/healthz` and `/readyz` on `METRICS_PORT` (default 5000)

use anyhow::Result;
use boilerr_controller::observability::otel::shutdown_otel;
use boilerr_controller::runtime::{initialize, run_watch_loop};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let init = initialize().await?;

    let result = run_watch_loop(
        init.client,
        init.reconciler,
        init.server_state,
        init.controller_config,
    )
    .await;

    shutdown_otel(init.otel_tracer_provider);
    info!("Boilerr controller exited");
    result
}
