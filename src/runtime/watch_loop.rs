//! # Watch Loop
//!
//! Runs two controllers side by side:
//!
//! - **SteamServer**: owns the ConfigMap, PVC, StatefulSet and Service it
//!   creates, and is re-triggered when the GameDefinition it references
//!   changes.
//! - **GameDefinition**: validates templates and publishes readiness.
//!
//! Both restart automatically when their watch streams end.

use futures::{Stream, StreamExt};
use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::core::v1::{ConfigMap, PersistentVolumeClaim, Service};
use kube::api::Api;
use kube::{Client, ResourceExt};
use kube_runtime::reflector::ObjectRef;
use kube_runtime::{controller, watcher, Controller};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn, Instrument};

use crate::config::SharedControllerConfig;
use crate::constants::{LABEL_MANAGED_BY, LABEL_MANAGED_BY_VALUE};
use crate::controller::definition::{reconcile_definition, report_deleted_definition};
use crate::controller::reconciler::{reconcile, Reconciler};
use crate::controller::server::ServerState;
use crate::crd::{GameDefinition, SteamServer};
use crate::runtime::error_policy::{
    classify_controller_error, handle_reconciliation_error, handle_watch_stream_error,
    ControllerErrorClass,
};

/// SteamServers that reference the named GameDefinition
#[must_use]
pub fn servers_referencing(
    servers: &[Arc<SteamServer>],
    definition: &str,
) -> Vec<ObjectRef<SteamServer>> {
    servers
        .iter()
        .filter(|s| s.spec.game_definition == definition)
        .map(|s| ObjectRef::from_obj(s.as_ref()))
        .collect()
}

/// Run both controllers until a shutdown signal is received
///
/// # Errors
///
/// Currently never fails; the signature leaves room for startup checks.
pub async fn run_watch_loop(
    client: Client,
    reconciler: Arc<Reconciler>,
    server_state: Arc<ServerState>,
    controller_config: SharedControllerConfig,
) -> Result<(), anyhow::Error> {
    let backoff_duration_ms = Arc::new(AtomicU64::new(controller_config.backoff_start_ms));

    // Mark not ready on SIGTERM/SIGINT so the probe fails while in-flight work drains
    let shutdown_server_state = server_state.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("Received shutdown signal (SIGINT/SIGTERM), initiating graceful shutdown...");
        shutdown_server_state.set_ready(false);
        info!("Marked server as not ready, waiting for in-flight reconciliations to complete...");
    });

    start_definition_deletion_watch(client.clone(), reconciler.clone());

    loop {
        if !server_state.is_ready() {
            info!("Shutdown requested, exiting watch loop");
            break;
        }

        let watch_span = tracing::info_span!("controller.watch", operation = "watch_loop");
        info!("Starting controller watch loop...");

        let servers = drain(
            steam_server_controller(&client, &controller_config).run(
                reconcile,
                handle_reconciliation_error,
                reconciler.clone(),
            ),
            backoff_duration_ms.clone(),
            controller_config.clone(),
        );
        let definitions = drain(
            game_definition_controller(&client, &controller_config).run(
                reconcile_definition,
                handle_reconciliation_error,
                reconciler.clone(),
            ),
            backoff_duration_ms.clone(),
            controller_config.clone(),
        );

        futures::future::join(servers, definitions)
            .instrument(watch_span)
            .await;

        if !server_state.is_ready() {
            info!("Shutdown requested, exiting watch loop");
            break;
        }

        let delay = controller_config.watch_restart_delay_after_end_duration();
        warn!(
            "Controller watch stream ended, restarting in {} seconds...",
            delay.as_secs()
        );
        tokio::time::sleep(delay).await;
    }

    info!("Controller stopped gracefully");
    Ok(())
}

fn steam_server_controller(
    client: &Client,
    config: &SharedControllerConfig,
) -> Controller<SteamServer> {
    let managed = watcher::Config::default()
        .labels(&format!("{LABEL_MANAGED_BY}={LABEL_MANAGED_BY_VALUE}"));

    let controller = Controller::new(
        Api::<SteamServer>::all(client.clone()),
        watcher::Config::default().any_semantic(),
    )
    .with_config(controller::Config::default().concurrency(config.max_concurrent_reconciliations));

    // The controller's own cache doubles as the definition -> servers index
    let servers = controller.store();

    controller
        .owns(Api::<ConfigMap>::all(client.clone()), managed.clone())
        .owns(Api::<PersistentVolumeClaim>::all(client.clone()), managed.clone())
        .owns(Api::<StatefulSet>::all(client.clone()), managed.clone())
        .owns(Api::<Service>::all(client.clone()), managed)
        .watches(
            Api::<GameDefinition>::all(client.clone()),
            watcher::Config::default(),
            move |definition| servers_referencing(&servers.state(), &definition.name_any()),
        )
        .shutdown_on_signal()
}

fn game_definition_controller(
    client: &Client,
    config: &SharedControllerConfig,
) -> Controller<GameDefinition> {
    Controller::new(
        Api::<GameDefinition>::all(client.clone()),
        watcher::Config::default().any_semantic(),
    )
    .with_config(controller::Config::default().concurrency(config.max_concurrent_reconciliations))
    .shutdown_on_signal()
}

/// Consume a controller stream
///
/// Failed reconciles are already requeued per resource by the error policy,
/// so they are only logged here. Watch and scheduler failures go through the
/// watch error policy.
async fn drain<S, T, R, Q>(stream: S, backoff: Arc<AtomicU64>, config: SharedControllerConfig)
where
    S: Stream<Item = Result<T, controller::Error<R, Q>>>,
    R: std::fmt::Debug + 'static,
    Q: std::fmt::Debug + 'static,
{
    stream
        .filter_map(move |x| {
            let backoff = backoff.clone();
            let config = config.clone();
            async move {
                match &x {
                    Ok(_) => {
                        backoff.store(config.backoff_start_ms, Ordering::Relaxed);
                        debug!("watch.event.success");
                        Some(x)
                    }
                    Err(e) => match classify_controller_error(e) {
                        ControllerErrorClass::Reconcile => {
                            debug!(error = ?e, "Reconcile failed, retry scheduled");
                            Some(x)
                        }
                        ControllerErrorClass::ObjectGone => {
                            debug!(error = ?e, "Object left the store before reconcile");
                            Some(x)
                        }
                        ControllerErrorClass::Watch => {
                            let error_string = format!("{e:?}");
                            handle_watch_stream_error(
                                &error_string,
                                &backoff,
                                config.backoff_max_ms,
                                config.watch_restart_delay_duration(),
                            )
                            .await
                            .map(|()| x)
                        }
                    },
                }
            }
        })
        .for_each(|_| futures::future::ready(()))
        .await;
}

/// Log how many SteamServers are orphaned whenever a GameDefinition is deleted
///
/// Deletion is neither blocked nor cascaded; the affected servers move to
/// Error on their next reconcile.
pub fn start_definition_deletion_watch(client: Client, reconciler: Arc<Reconciler>) {
    tokio::spawn(async move {
        let api = Api::<GameDefinition>::all(client);
        let mut stream = watcher(api, watcher::Config::default()).boxed();

        info!("Watching GameDefinition deletions");
        while let Some(event) = stream.next().await {
            match event {
                Ok(watcher::Event::Delete(definition)) => {
                    let name = definition.name_any();
                    if let Err(e) = report_deleted_definition(&reconciler, &name).await {
                        warn!(definition = %name, error = %e, "Failed to count SteamServers for deleted GameDefinition");
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(error = %e, "GameDefinition deletion watch error");
                    tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                }
            }
        }
        warn!("GameDefinition deletion watch ended");
    });
}
