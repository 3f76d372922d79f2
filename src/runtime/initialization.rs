//! # Initialization
//!
//! Controller startup: rustls setup, tracing, metrics, the probe server and
//! the Kubernetes client.

use anyhow::{Context, Result};
use kube::api::{Api, ListParams};
use kube::Client;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info, warn, Instrument};

use crate::config::{create_shared_config, SharedControllerConfig, SharedServerConfig};
use crate::controller::reconciler::{KubeStore, Reconciler};
use crate::controller::server::{start_server, ServerState};
use crate::crd::{GameDefinition, SteamServer};
use crate::observability;

/// Everything the watch loop needs
pub struct InitializationResult {
    pub client: Client,
    pub reconciler: Arc<Reconciler>,
    /// Server state for health checks
    pub server_state: Arc<ServerState>,
    /// Tracer provider, flushed on shutdown
    pub otel_tracer_provider: Option<observability::otel::TracerProviderHandle>,
    pub controller_config: SharedControllerConfig,
    pub server_config: SharedServerConfig,
}

impl std::fmt::Debug for InitializationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitializationResult")
            .field("server_ready", &self.server_state.is_ready())
            .field("controller_config", &self.controller_config)
            .finish_non_exhaustive()
    }
}

/// Initialize the controller runtime
///
/// # Errors
///
/// Fails if metrics cannot be registered, the probe server does not come up,
/// no Kubernetes client can be built or the CRDs are not installed.
pub async fn initialize() -> Result<InitializationResult> {
    // Must run before anything touches rustls
    rustls::crypto::ring::default_provider()
        .install_default()
        .unwrap_or_else(|_| panic!("Failed to install rustls crypto provider"));

    let otel_tracer_provider =
        observability::otel::init_otel().context("Failed to initialize OpenTelemetry")?;

    let filter = || {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "boilerr_controller=info".into())
    };
    if otel_tracer_provider.is_none() {
        tracing_subscriber::fmt().with_env_filter(filter()).init();
    } else if let Err(e) = tracing_subscriber::fmt().with_env_filter(filter()).try_init() {
        // datadog-opentelemetry may have installed its own subscriber already
        warn!("Tracing subscriber init returned error (may already be initialized by Datadog): {}", e);
    }

    info!("Starting Boilerr controller");
    info!(
        version = env!("CARGO_PKG_VERSION"),
        built = env!("BUILD_DATETIME"),
        revision = env!("BUILD_GIT_HASH"),
        "Build info"
    );

    observability::metrics::register_metrics()?;

    let server_state = Arc::new(ServerState::new());
    let (controller_config, server_config) = create_shared_config();
    info!(?controller_config, "Loaded controller configuration");

    let server_state_clone = server_state.clone();
    let server_port = server_config.metrics_port;
    let server_handle = tokio::spawn(async move {
        if let Err(e) = start_server(server_port, server_state_clone).await {
            error!("HTTP server error: {}", e);
        }
    });
    wait_for_server_ready(&server_state, &server_handle, &server_config).await?;

    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;

    log_existing_resources(&client)
        .instrument(tracing::info_span!("controller.startup.inventory"))
        .await?;

    let store = Arc::new(KubeStore::new(client.clone()));
    let reconciler = Arc::new(Reconciler::new(store, controller_config.clone()));

    info!("Controller initialized, starting watch loop...");

    Ok(InitializationResult {
        client,
        reconciler,
        server_state,
        otel_tracer_provider,
        controller_config,
        server_config,
    })
}

/// Wait for the HTTP server to become ready
async fn wait_for_server_ready(
    server_state: &Arc<ServerState>,
    server_handle: &tokio::task::JoinHandle<()>,
    server_config: &SharedServerConfig,
) -> Result<()> {
    let startup_timeout = std::time::Duration::from_secs(server_config.startup_timeout_secs);
    let poll_interval = std::time::Duration::from_millis(server_config.poll_interval_ms);
    let start_time = std::time::Instant::now();

    loop {
        if server_handle.is_finished() {
            return Err(anyhow::anyhow!("HTTP server failed to start"));
        }

        if server_state.is_ready() {
            info!("HTTP server is ready and accepting connections");
            return Ok(());
        }

        if start_time.elapsed() > startup_timeout {
            return Err(anyhow::anyhow!(
                "HTTP server failed to become ready within {} seconds",
                startup_timeout.as_secs()
            ));
        }

        tokio::time::sleep(poll_interval).await;
    }
}

/// Check both CRDs are queryable and log what already exists
///
/// Existing resources are picked up by the controllers' initial list, so
/// nothing is reconciled here.
async fn log_existing_resources(client: &Client) -> Result<()> {
    let definitions = Api::<GameDefinition>::all(client.clone())
        .list(&ListParams::default())
        .await
        .context("GameDefinition CRD is not queryable - is it installed?")?;
    let servers = Api::<SteamServer>::all(client.clone())
        .list(&ListParams::default())
        .await
        .context("SteamServer CRD is not queryable - is it installed?")?;

    info!("Boilerr - Startup Resource Summary");
    info!("GameDefinitions: {}", definitions.items.len());
    info!("SteamServers: {}", servers.items.len());

    for (namespace, names) in group_by_namespace(&servers.items) {
        info!("Namespace: {}", namespace);
        info!("  Servers ({}): {}", names.len(), summarize_names(&names));
    }
    Ok(())
}

fn group_by_namespace(servers: &[SteamServer]) -> BTreeMap<String, Vec<String>> {
    let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for server in servers {
        grouped
            .entry(server.metadata.namespace.clone().unwrap_or_else(|| "default".into()))
            .or_default()
            .push(server.metadata.name.clone().unwrap_or_else(|| "unknown".into()));
    }
    for names in grouped.values_mut() {
        names.sort();
    }
    grouped
}

fn summarize_names(names: &[String]) -> String {
    if names.len() <= 3 {
        names.join(", ")
    } else {
        format!("{}, ... ({} total)", names[..3].join(", "), names.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::SteamServerSpec;

    fn server(ns: &str, name: &str) -> SteamServer {
        let spec: SteamServerSpec =
            serde_json::from_value(serde_json::json!({"gameDefinition": "valheim"})).unwrap();
        let mut s = SteamServer::new(name, spec);
        s.metadata.namespace = Some(ns.into());
        s
    }

    #[test]
    fn test_group_by_namespace_sorts_names() {
        let grouped = group_by_namespace(&[
            server("games", "vikings"),
            server("friends", "longboat"),
            server("games", "factory"),
        ]);
        assert_eq!(grouped.keys().collect::<Vec<_>>(), vec!["friends", "games"]);
        assert_eq!(grouped["games"], vec!["factory", "vikings"]);
    }

    #[test]
    fn test_summarize_names_truncates() {
        let names: Vec<String> = ["a", "b", "c", "d"].iter().map(ToString::to_string).collect();
        assert_eq!(summarize_names(&names[..2]), "a, b");
        assert_eq!(summarize_names(&names), "a, b, c, ... (4 total)");
    }
}
