//! # Metrics
//!
//! Prometheus metrics for monitoring the controller.
//!
//! ## Metrics Exposed
//!
//! - `boilerr_reconciliations_total{kind}` - Total number of reconciliations
//! - `boilerr_reconciliation_errors_total{kind}` - Total number of reconciliation errors
//! - `boilerr_reconciliation_duration_seconds{kind}` - Duration of reconciliation operations
//! - `boilerr_artifact_applies_total{artifact}` - Artifact writes actually sent to the API server
//! - `boilerr_artifact_apply_skipped_total{artifact}` - Artifact writes skipped because nothing changed
//! - `boilerr_status_writes_total{kind}` - Status subresource patches
//! - `boilerr_requeues_total{reason}` - Scheduled re-checks by reason
//! - `boilerr_servers{state}` - Last observed state of each SteamServer

use anyhow::Result;
use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, IntGaugeVec, Opts, Registry};
use std::sync::LazyLock;

// Metrics
pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static RECONCILIATIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new("boilerr_reconciliations_total", "Total number of reconciliations"),
        &["kind"],
    )
    .expect("Failed to create RECONCILIATIONS_TOTAL metric - this should never happen")
});

static RECONCILIATION_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "boilerr_reconciliation_errors_total",
            "Total number of reconciliation errors",
        ),
        &["kind"],
    )
    .expect("Failed to create RECONCILIATION_ERRORS_TOTAL metric - this should never happen")
});

static RECONCILIATION_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "boilerr_reconciliation_duration_seconds",
            "Duration of reconciliation in seconds",
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0]),
        &["kind"],
    )
    .expect("Failed to create RECONCILIATION_DURATION metric - this should never happen")
});

static ARTIFACT_APPLIES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "boilerr_artifact_applies_total",
            "Total number of synthesized artifacts written to the API server",
        ),
        &["artifact"],
    )
    .expect("Failed to create ARTIFACT_APPLIES_TOTAL metric - this should never happen")
});

static ARTIFACT_APPLY_SKIPPED_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "boilerr_artifact_apply_skipped_total",
            "Total number of artifact writes skipped because the live object was up to date",
        ),
        &["artifact"],
    )
    .expect("Failed to create ARTIFACT_APPLY_SKIPPED_TOTAL metric - this should never happen")
});

static STATUS_WRITES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new("boilerr_status_writes_total", "Total number of status patches"),
        &["kind"],
    )
    .expect("Failed to create STATUS_WRITES_TOTAL metric - this should never happen")
});

static REQUEUES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new("boilerr_requeues_total", "Total number of scheduled re-checks"),
        &["reason"],
    )
    .expect("Failed to create REQUEUES_TOTAL metric - this should never happen")
});

static SERVERS_BY_STATE: LazyLock<IntGaugeVec> = LazyLock::new(|| {
    IntGaugeVec::new(
        Opts::new(
            "boilerr_servers",
            "Number of SteamServers last observed in each lifecycle state",
        ),
        &["state"],
    )
    .expect("Failed to create SERVERS_BY_STATE metric - this should never happen")
});

/// Register all metrics with the global registry
///
/// # Errors
///
/// Returns an error if a metric is registered twice.
pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(RECONCILIATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_DURATION.clone()))?;
    REGISTRY.register(Box::new(ARTIFACT_APPLIES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(ARTIFACT_APPLY_SKIPPED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(STATUS_WRITES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(REQUEUES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(SERVERS_BY_STATE.clone()))?;
    Ok(())
}

/// Gather all registered metric families
#[must_use]
pub fn gather() -> Vec<prometheus::proto::MetricFamily> {
    REGISTRY.gather()
}

pub fn increment_reconciliations(kind: &str) {
    RECONCILIATIONS_TOTAL.with_label_values(&[kind]).inc();
}

pub fn increment_reconciliation_errors(kind: &str) {
    RECONCILIATION_ERRORS_TOTAL.with_label_values(&[kind]).inc();
}

pub fn observe_reconciliation_duration(kind: &str, duration: f64) {
    RECONCILIATION_DURATION
        .with_label_values(&[kind])
        .observe(duration);
}

pub fn increment_artifact_applies(artifact: &str) {
    ARTIFACT_APPLIES_TOTAL.with_label_values(&[artifact]).inc();
}

pub fn increment_artifact_apply_skipped(artifact: &str) {
    ARTIFACT_APPLY_SKIPPED_TOTAL
        .with_label_values(&[artifact])
        .inc();
}

pub fn increment_status_writes(kind: &str) {
    STATUS_WRITES_TOTAL.with_label_values(&[kind]).inc();
}

pub fn increment_requeues(reason: &str) {
    REQUEUES_TOTAL.with_label_values(&[reason]).inc();
}

/// Move one server from its previous state gauge to its new one
///
/// `previous` is `None` the first time a server reports a state.
pub fn record_server_state_transition(previous: Option<&str>, current: &str) {
    if previous == Some(current) {
        return;
    }
    if let Some(prev) = previous {
        SERVERS_BY_STATE.with_label_values(&[prev]).dec();
    }
    SERVERS_BY_STATE.with_label_values(&[current]).inc();
}

/// Drop a deleted server from its state gauge
pub fn forget_server_state(state: &str) {
    SERVERS_BY_STATE.with_label_values(&[state]).dec();
}
