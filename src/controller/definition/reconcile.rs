//! # GameDefinition Reconciliation
//!
//! Validates the definition and publishes `ready` with a message. There is no
//! periodic recheck: an invalid definition stays not-ready until it is edited.

use kube::ResourceExt;
use kube_runtime::controller::Action;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn, Instrument};

use crate::constants::DEFINITION_READY_MESSAGE;
use crate::controller::definition::validate::validate_game_definition;
use crate::controller::reconciler::status::write_definition_status;
use crate::controller::reconciler::{resource_key, Reconciler, ReconcilerError};
use crate::crd::GameDefinition;
use crate::observability::metrics;

pub const KIND: &str = "GameDefinition";

/// Reconcile one GameDefinition
///
/// # Errors
///
/// Returns `ReconcilerError::Kube` when the definition cannot be read or its
/// status cannot be written.
pub async fn reconcile_definition(
    obj: Arc<GameDefinition>,
    ctx: Arc<Reconciler>,
) -> Result<Action, ReconcilerError> {
    let name = obj.name_any();
    let span = tracing::info_span!("reconcile", resource.kind = KIND, resource.name = %name);

    async move {
        let start = Instant::now();
        metrics::increment_reconciliations(KIND);

        let result = reconcile_internal(&name, &ctx).await;

        metrics::observe_reconciliation_duration(KIND, start.elapsed().as_secs_f64());
        if result.is_ok() {
            ctx.reset_backoff(&resource_key(KIND, None, &name));
        }
        result
    }
    .instrument(span)
    .await
}

async fn reconcile_internal(name: &str, ctx: &Reconciler) -> Result<Action, ReconcilerError> {
    let Some(definition) = ctx.store.get_game_definition(name).await? else {
        debug!("GameDefinition no longer exists, nothing to do");
        return Ok(Action::await_change());
    };

    let (ready, message) = match validate_game_definition(&definition.spec) {
        Ok(()) => (true, DEFINITION_READY_MESSAGE.to_string()),
        Err(e) => {
            warn!(error = %e, "GameDefinition validation failed");
            (false, e.to_string())
        }
    };

    if write_definition_status(ctx, &definition, ready, &message).await? {
        info!(ready, "GameDefinition status updated");
    }

    Ok(Action::await_change())
}

/// Log how many SteamServers still point at a deleted definition
///
/// Deletion is neither blocked nor cascaded; those servers report the
/// missing definition in their own status.
///
/// # Errors
///
/// Returns the list error if SteamServers cannot be listed.
pub async fn report_deleted_definition(ctx: &Reconciler, name: &str) -> Result<usize, kube::Error> {
    let servers = ctx.store.list_steam_servers().await?;
    let referencing: Vec<String> = servers
        .iter()
        .filter(|s| s.spec.game_definition == name)
        .map(|s| format!("{}/{}", s.namespace().unwrap_or_default(), s.name_any()))
        .collect();

    if referencing.is_empty() {
        info!(resource.name = name, "GameDefinition deleted, no SteamServers reference it");
    } else {
        warn!(
            resource.name = name,
            count = referencing.len(),
            servers = %referencing.join(", "),
            "GameDefinition deleted while still referenced by SteamServers"
        );
    }
    Ok(referencing.len())
}
