//! # SteamServer Reconciliation
//!
//! One pass, each step short-circuiting on error:
//!
//! 1. Re-fetch the server; gone means nothing to do
//! 2. Deletion requested: drop the finalizer (owned artifacts are removed by
//!    garbage collection)
//! 3. No finalizer yet: add it and requeue
//! 4. Fetch the GameDefinition; missing or not ready is surfaced in status
//! 5. Validate the server config against the definition schema
//! 6. Synthesize and apply ConfigMap, PVC, StatefulSet, Service in that order
//! 7. Classify state from the live objects and write status if it changed
//!
//! Failures write an `Error` status. Validation, missing definitions and
//! render failures wait for a spec change; a not-ready definition is
//! rechecked on a fixed timer; everything else goes to the error policy.

use k8s_openapi::api::core::v1::Pod;
use kube::ResourceExt;
use kube_runtime::controller::Action;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn, Instrument};

use crate::constants::STEAM_SERVER_FINALIZER;
use crate::controller::reconciler::apply::apply_artifacts;
use crate::controller::reconciler::state::{classify, PodObservation};
use crate::controller::reconciler::status::{
    derive_address, port_snapshot, write_server_status, Observation,
};
use crate::controller::reconciler::types::{resource_key, Reconciler, ReconcilerError};
use crate::crd::{ServerState, SteamServer};
use crate::observability::metrics;
use crate::resolver::{resolve, validate_config};
use crate::resources::labels::{pod_name, workload_name};
use crate::resources::synthesize;

pub const KIND: &str = "SteamServer";

/// Reconcile one SteamServer
///
/// # Errors
///
/// Returns transient errors (API failures, apply failures, status conflicts)
/// for the error policy to back off on. Terminal errors are reported through
/// status and returned as `Ok(Action::await_change())`.
pub async fn reconcile(
    obj: Arc<SteamServer>,
    ctx: Arc<Reconciler>,
) -> Result<Action, ReconcilerError> {
    let name = obj.name_any();
    let namespace = obj.namespace().unwrap_or_default();
    let span = tracing::info_span!(
        "reconcile",
        resource.kind = KIND,
        resource.name = %name,
        resource.namespace = %namespace
    );

    async move {
        let start = Instant::now();
        metrics::increment_reconciliations(KIND);

        let result = reconcile_internal(&namespace, &name, &ctx).await;

        metrics::observe_reconciliation_duration(KIND, start.elapsed().as_secs_f64());
        if result.is_ok() {
            ctx.reset_backoff(&resource_key(KIND, Some(&namespace), &name));
        }
        result
    }
    .instrument(span)
    .await
}

async fn reconcile_internal(
    namespace: &str,
    name: &str,
    ctx: &Reconciler,
) -> Result<Action, ReconcilerError> {
    let Some(server) = ctx.store.get_steam_server(namespace, name).await? else {
        debug!("SteamServer no longer exists, nothing to do");
        return Ok(Action::await_change());
    };

    let has_finalizer = server.finalizers().iter().any(|f| f == STEAM_SERVER_FINALIZER);

    if server.metadata.deletion_timestamp.is_some() {
        if has_finalizer {
            info!("SteamServer is being deleted, removing finalizer");
            let remaining: Vec<String> = server
                .finalizers()
                .iter()
                .filter(|f| *f != STEAM_SERVER_FINALIZER)
                .cloned()
                .collect();
            ctx.store
                .set_steam_server_finalizers(namespace, name, remaining)
                .await?;
            if let Some(state) = server.status.as_ref().and_then(|s| s.state) {
                metrics::forget_server_state(state.as_str());
            }
        }
        return Ok(Action::await_change());
    }

    if !has_finalizer {
        debug!("Adding finalizer");
        let mut finalizers = server.finalizers().to_vec();
        finalizers.push(STEAM_SERVER_FINALIZER.to_string());
        ctx.store
            .set_steam_server_finalizers(namespace, name, finalizers)
            .await?;
        return Ok(Action::requeue(Duration::ZERO));
    }

    match sync(&server, ctx).await {
        Ok(action) => Ok(action),
        Err(e) => report_failure(&server, ctx, e).await,
    }
}

/// Steps 4 to 7
async fn sync(server: &SteamServer, ctx: &Reconciler) -> Result<Action, ReconcilerError> {
    let definition_name = server.spec.game_definition.clone();
    let Some(definition) = ctx.store.get_game_definition(&definition_name).await? else {
        return Err(ReconcilerError::TemplateNotFound(definition_name));
    };
    let def_status = definition.status.clone().unwrap_or_default();
    if !def_status.ready {
        return Err(ReconcilerError::TemplateNotReady {
            name: definition_name,
            message: def_status.message,
        });
    }

    validate_config(&server.spec.config, &definition.spec.config_schema)?;
    let resolved = resolve(&server.spec.config, &definition.spec.config_schema);

    let artifacts = synthesize(server, &definition.spec, &resolved, &ctx.interpolator)?;
    let namespace = server.namespace().unwrap_or_default();
    let summary = apply_artifacts(ctx, &namespace, artifacts).await?;
    debug!(
        applied = summary.applied.len(),
        skipped = summary.skipped.len(),
        "Artifacts reconciled"
    );

    let observation = observe(ctx, &namespace, &server.name_any()).await?;
    let state = observation.state;
    if write_server_status(ctx, server, observation).await? {
        info!(state = state.as_str(), "SteamServer status updated");
    }

    if state == ServerState::Running {
        Ok(Action::await_change())
    } else {
        metrics::increment_requeues("not-running");
        Ok(Action::requeue(ctx.config.not_running_requeue()))
    }
}

/// Read the live workload, pod and service
async fn observe(ctx: &Reconciler, namespace: &str, name: &str) -> Result<Observation, ReconcilerError> {
    let sts = ctx
        .store
        .get_stateful_set(namespace, &workload_name(name))
        .await?;

    let pod: Result<Option<Pod>, kube::Error> = ctx.store.get_pod(namespace, &pod_name(name)).await;
    let state = match &pod {
        Ok(Some(p)) => classify(sts.as_ref(), &PodObservation::Found(p)),
        Ok(None) => classify(sts.as_ref(), &PodObservation::Missing),
        Err(e) => {
            warn!(error = %e, "Failed to fetch game server pod");
            classify(sts.as_ref(), &PodObservation::LookupFailed)
        }
    };

    let svc = ctx.store.get_service(namespace, &workload_name(name)).await?;
    Ok(Observation::healthy(
        state,
        derive_address(svc.as_ref()),
        port_snapshot(svc.as_ref()),
    ))
}

/// Surface a failed pass in status and pick the follow-up action
async fn report_failure(
    server: &SteamServer,
    ctx: &Reconciler,
    error: ReconcilerError,
) -> Result<Action, ReconcilerError> {
    warn!(reason = error.reason(), error = %error, "SteamServer reconciliation failed");

    let observation = Observation::error(server.status.as_ref(), error.to_string());
    if let Err(status_err) = write_server_status(ctx, server, observation).await {
        warn!(error = %status_err, "Failed to write error status");
        if error.is_terminal() {
            return Err(status_err);
        }
    }

    match error {
        e if e.is_terminal() => Ok(Action::await_change()),
        ReconcilerError::TemplateNotReady { .. } => {
            metrics::increment_requeues("template-not-ready");
            Ok(Action::requeue(ctx.config.template_not_ready_requeue()))
        }
        other => Err(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ControllerConfig;
    use crate::controller::reconciler::store::MockObjectStore;
    use crate::crd::{GameDefinition, GameDefinitionSpec, GameDefinitionStatus, SteamServerSpec};
    use serde_json::json;

    fn server(finalized: bool, deleting: bool) -> SteamServer {
        let mut s = SteamServer::new(
            "vikings",
            serde_json::from_value::<SteamServerSpec>(json!({
                "gameDefinition": "valheim",
                "config": {"serverName": "Vikings"}
            }))
            .unwrap(),
        );
        s.metadata.namespace = Some("games".into());
        s.metadata.resource_version = Some("7".into());
        if finalized {
            s.metadata.finalizers = Some(vec![STEAM_SERVER_FINALIZER.to_string()]);
        }
        if deleting {
            s.metadata.deletion_timestamp =
                Some(serde_json::from_value(json!("2026-01-01T00:00:00Z")).unwrap());
        }
        s
    }

    fn definition(ready: bool) -> GameDefinition {
        let mut d = GameDefinition::new(
            "valheim",
            serde_json::from_value::<GameDefinitionSpec>(json!({
                "appId": 896_660,
                "command": "./valheim_server.x86_64",
                "ports": [{"name": "game", "containerPort": 2456}],
                "configSchema": {"serverName": {"required": true}}
            }))
            .unwrap(),
        );
        d.status = Some(GameDefinitionStatus {
            ready,
            message: if ready { "ok".into() } else { "command is required".into() },
            conditions: vec![],
        });
        d
    }

    fn ctx(store: MockObjectStore) -> Arc<Reconciler> {
        Arc::new(Reconciler::new(Arc::new(store), Arc::new(ControllerConfig::default())))
    }

    #[tokio::test]
    async fn test_missing_server_is_noop() {
        let mut store = MockObjectStore::new();
        store.expect_get_steam_server().returning(|_, _| Ok(None));
        let action = reconcile(Arc::new(server(true, false)), ctx(store)).await.unwrap();
        assert_eq!(action, Action::await_change());
    }

    #[tokio::test]
    async fn test_adds_finalizer_and_requeues() {
        let mut store = MockObjectStore::new();
        store
            .expect_get_steam_server()
            .returning(|_, _| Ok(Some(server(false, false))));
        store
            .expect_set_steam_server_finalizers()
            .withf(|ns, name, f| ns == "games" && name == "vikings" && f == &vec![STEAM_SERVER_FINALIZER.to_string()])
            .times(1)
            .returning(|_, _, _| Ok(()));
        let action = reconcile(Arc::new(server(false, false)), ctx(store)).await.unwrap();
        assert_eq!(action, Action::requeue(Duration::ZERO));
    }

    #[tokio::test]
    async fn test_deletion_removes_finalizer() {
        let mut store = MockObjectStore::new();
        store
            .expect_get_steam_server()
            .returning(|_, _| Ok(Some(server(true, true))));
        store
            .expect_set_steam_server_finalizers()
            .withf(|_, _, f| f.is_empty())
            .times(1)
            .returning(|_, _, _| Ok(()));
        let action = reconcile(Arc::new(server(true, true)), ctx(store)).await.unwrap();
        assert_eq!(action, Action::await_change());
    }

    #[tokio::test]
    async fn test_missing_definition_is_terminal() {
        let mut store = MockObjectStore::new();
        store
            .expect_get_steam_server()
            .returning(|_, _| Ok(Some(server(true, false))));
        store.expect_get_game_definition().returning(|_| Ok(None));
        store
            .expect_patch_steam_server_status()
            .withf(|_, _, rv, status| {
                rv.as_deref() == Some("7")
                    && status.state == Some(ServerState::Error)
                    && status.message.contains("valheim")
            })
            .times(1)
            .returning(|_, _, _, _| Ok(()));
        let action = reconcile(Arc::new(server(true, false)), ctx(store)).await.unwrap();
        assert_eq!(action, Action::await_change());
    }

    #[tokio::test]
    async fn test_unready_definition_requeues_after_thirty_seconds() {
        let mut store = MockObjectStore::new();
        store
            .expect_get_steam_server()
            .returning(|_, _| Ok(Some(server(true, false))));
        store
            .expect_get_game_definition()
            .returning(|_| Ok(Some(definition(false))));
        store
            .expect_patch_steam_server_status()
            .returning(|_, _, _, _| Ok(()));
        let action = reconcile(Arc::new(server(true, false)), ctx(store)).await.unwrap();
        assert_eq!(action, Action::requeue(Duration::from_secs(30)));
    }

    #[tokio::test]
    async fn test_apply_failure_goes_to_error_policy() {
        let mut store = MockObjectStore::new();
        store
            .expect_get_steam_server()
            .returning(|_, _| Ok(Some(server(true, false))));
        store
            .expect_get_game_definition()
            .returning(|_| Ok(Some(definition(true))));
        store.expect_get_artifact_meta().returning(|_, _, _| Ok(None));
        store
            .expect_apply_artifact()
            .returning(|_, _| Err(kube::Error::Service("forbidden".into())));
        store
            .expect_patch_steam_server_status()
            .withf(|_, _, _, status| status.message.starts_with("Failed to reconcile PersistentVolumeClaim"))
            .times(1)
            .returning(|_, _, _, _| Ok(()));

        let err = reconcile(Arc::new(server(true, false)), ctx(store)).await.unwrap_err();
        assert!(matches!(err, ReconcilerError::Apply { .. }));
    }

    #[tokio::test]
    async fn test_pending_server_requeues_after_ten_seconds() {
        let mut store = MockObjectStore::new();
        store
            .expect_get_steam_server()
            .returning(|_, _| Ok(Some(server(true, false))));
        store
            .expect_get_game_definition()
            .returning(|_| Ok(Some(definition(true))));
        store.expect_get_artifact_meta().returning(|_, _, _| Ok(None));
        store.expect_get_stateful_set().returning(|_, _| Ok(None));
        store.expect_apply_artifact().returning(|_, _| Ok(()));
        store.expect_get_pod().returning(|_, _| Ok(None));
        store.expect_get_service().returning(|_, _| Ok(None));
        store
            .expect_patch_steam_server_status()
            .withf(|_, _, _, status| status.state == Some(ServerState::Pending))
            .times(1)
            .returning(|_, _, _, _| Ok(()));

        let action = reconcile(Arc::new(server(true, false)), ctx(store)).await.unwrap();
        assert_eq!(action, Action::requeue(Duration::from_secs(10)));
    }

    #[tokio::test]
    async fn test_status_conflict_is_transient() {
        let mut store = MockObjectStore::new();
        store
            .expect_get_steam_server()
            .returning(|_, _| Ok(Some(server(true, false))));
        store
            .expect_get_game_definition()
            .returning(|_| Ok(Some(definition(true))));
        store.expect_get_artifact_meta().returning(|_, _, _| Ok(None));
        store.expect_get_stateful_set().returning(|_, _| Ok(None));
        store.expect_apply_artifact().returning(|_, _| Ok(()));
        store.expect_get_pod().returning(|_, _| Ok(None));
        store.expect_get_service().returning(|_, _| Ok(None));
        store
            .expect_patch_steam_server_status()
            .returning(|_, _, _, _| Err(kube::Error::Service("conflict".into())));

        let err = reconcile(Arc::new(server(true, false)), ctx(store)).await.unwrap_err();
        assert!(matches!(err, ReconcilerError::Kube(_)));
    }
}
