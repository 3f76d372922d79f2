//! # Error Policy
//!
//! Error handling for the controller watch loop: per-resource Fibonacci
//! backoff for failed reconciliations and classification of watch stream
//! errors.

use kube::Resource;
use kube_runtime::controller::{self, Action};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn, Instrument};

use crate::controller::reconciler::{resource_key, Reconciler, ReconcilerError};
use crate::observability::metrics;

/// Handle reconciliation errors with Fibonacci backoff
///
/// Backoff state is tracked per resource so one failing server never slows
/// down retries of another.
pub fn handle_reconciliation_error<K>(obj: Arc<K>, error: &ReconcilerError, ctx: Arc<Reconciler>) -> Action
where
    K: Resource<DynamicType = ()>,
{
    let kind = K::kind(&());
    let meta = obj.meta();
    let name = meta.name.as_deref().unwrap_or("unknown");
    let namespace = meta.namespace.as_deref();

    let error_span = tracing::error_span!(
        "controller.watch.reconciliation_error",
        resource.kind = %kind,
        resource.name = name,
        resource.namespace = namespace.unwrap_or_default(),
        error = %error
    );
    let _error_guard = error_span.enter();

    error!("Reconciliation error for {} {}: {:?}", kind, name, error);
    metrics::increment_reconciliation_errors(&kind);

    let key = resource_key(&kind, namespace, name);
    let (backoff_seconds, error_count) = ctx.next_backoff(&key);

    let next_trigger_time =
        chrono::Utc::now() + chrono::Duration::seconds(i64::try_from(backoff_seconds).unwrap_or(i64::MAX));
    info!(
        "Retrying with Fibonacci backoff: {}s (error count: {}, next attempt {})",
        backoff_seconds,
        error_count,
        next_trigger_time.to_rfc3339()
    );

    metrics::increment_requeues("error-backoff");
    Action::requeue(Duration::from_secs(backoff_seconds))
}

/// How a watch stream error should be handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchErrorClass {
    Unauthorized,
    Expired,
    Throttled,
    NotFound,
    Other,
}

/// Classify a watch stream error from its debug rendering
#[must_use]
pub fn classify_watch_error(error_string: &str) -> WatchErrorClass {
    // 404 first: a plain-text 404 body surfaces as a serde error mentioning WatchFailed
    let is_not_found = error_string.contains("ObjectNotFound")
        || error_string.contains("404")
        || error_string.contains("not found");
    if is_not_found {
        return WatchErrorClass::NotFound;
    }
    if error_string.contains("401") || error_string.contains("Unauthorized") {
        return WatchErrorClass::Unauthorized;
    }
    if error_string.contains("410")
        || error_string.contains("too old resource version")
        || error_string.contains("Expired")
        || error_string.contains("Gone")
    {
        return WatchErrorClass::Expired;
    }
    if error_string.contains("429")
        || error_string.contains("storage is (re)initializing")
        || error_string.contains("TooManyRequests")
    {
        return WatchErrorClass::Throttled;
    }
    WatchErrorClass::Other
}

/// How the stream consumer treats a controller error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerErrorClass {
    /// A reconcile failed; the error policy already scheduled its retry
    Reconcile,
    /// The object left the store before its reconcile ran
    ObjectGone,
    /// The watch or scheduler itself failed
    Watch,
}

#[must_use]
pub fn classify_controller_error<R, Q>(err: &controller::Error<R, Q>) -> ControllerErrorClass {
    match err {
        controller::Error::ReconcilerFailed(..) => ControllerErrorClass::Reconcile,
        controller::Error::ObjectNotFound(_) => ControllerErrorClass::ObjectGone,
        controller::Error::QueueError(_) | controller::Error::RunnerError(_) => {
            ControllerErrorClass::Watch
        }
    }
}

/// Handle a watch stream error
///
/// Only watch and scheduler failures come through here. Returns `None` to
/// drop the event and let the watch restart, `Some(())` to keep going.
pub async fn handle_watch_stream_error(
    error_string: &str,
    backoff: &Arc<AtomicU64>,
    max_backoff_ms: u64,
    restart_delay: Duration,
) -> Option<()> {
    let error_span = tracing::warn_span!("controller.watch.error", error = %error_string);

    async move {
        match classify_watch_error(error_string) {
            WatchErrorClass::Unauthorized => {
                error!("Watch authentication failed (401 Unauthorized) - RBAC may have been revoked or the token expired");
                error!("Check that the boilerr-controller ClusterRole and ClusterRoleBinding exist and bind the controller ServiceAccount:");
                error!("  kubectl auth can-i list steamservers.boilerr.dev --all-namespaces --as=system:serviceaccount:<namespace>:boilerr-controller");
                warn!("Waiting {}s before retrying watch", restart_delay.as_secs());
                tokio::time::sleep(restart_delay).await;
                None
            }
            WatchErrorClass::Expired => {
                warn!(error_type = "410", "Watch resource version expired, watch will restart");
                None
            }
            WatchErrorClass::Throttled => {
                let current = backoff.load(Ordering::Relaxed);
                warn!(
                    "API server throttling or reinitializing (429), backing off for {}ms before restart",
                    current
                );
                tokio::time::sleep(Duration::from_millis(current)).await;
                backoff.store(current.saturating_mul(2).min(max_backoff_ms), Ordering::Relaxed);
                None
            }
            WatchErrorClass::NotFound => {
                warn!(
                    "Resource not found (404) - expected if it was deleted, otherwise check the CRDs are installed. Error: {}",
                    error_string
                );
                Some(())
            }
            WatchErrorClass::Other => {
                error!("Controller stream error: {}", error_string);
                tokio::time::sleep(restart_delay).await;
                None
            }
        }
    }
    .instrument(error_span)
    .await
}
