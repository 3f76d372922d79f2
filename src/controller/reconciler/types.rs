//! # Types
//!
//! Core types for the reconcilers.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

use crate::config::SharedControllerConfig;
use crate::controller::backoff::FibonacciBackoff;
use crate::controller::reconciler::store::ObjectStore;
use crate::resolver::{ConfigError, Interpolator};
use crate::resources::{ArtifactKind, SynthesisError};

#[derive(Debug, Error)]
pub enum ReconcilerError {
    /// Config is invalid; fixed only by editing the resource
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("GameDefinition {0:?} not found")]
    TemplateNotFound(String),

    #[error("GameDefinition {name:?} is not ready: {message}")]
    TemplateNotReady { name: String, message: String },

    #[error("failed to render server spec: {0}")]
    Render(#[from] SynthesisError),

    #[error("Failed to reconcile {kind}: {source}")]
    Apply {
        kind: ArtifactKind,
        #[source]
        source: kube::Error,
    },

    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),
}

impl ReconcilerError {
    /// Errors that only a spec edit can clear
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ReconcilerError::Config(_)
                | ReconcilerError::TemplateNotFound(_)
                | ReconcilerError::Render(_)
        )
    }

    /// Short label for metrics and logs
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            ReconcilerError::Config(_) => "validation",
            ReconcilerError::TemplateNotFound(_) => "template-not-found",
            ReconcilerError::TemplateNotReady { .. } => "template-not-ready",
            ReconcilerError::Render(_) => "render",
            ReconcilerError::Apply { .. } => "apply",
            ReconcilerError::Kube(_) => "kube",
        }
    }
}

/// Backoff state for a specific resource
#[derive(Debug, Clone)]
pub struct BackoffState {
    pub backoff: FibonacciBackoff,
    pub error_count: u32,
}

impl BackoffState {
    #[must_use]
    pub fn new(min_secs: u64, max_secs: u64) -> Self {
        Self {
            backoff: FibonacciBackoff::new(min_secs, max_secs),
            error_count: 0,
        }
    }

    pub fn increment_error(&mut self) {
        self.error_count += 1;
    }

    pub fn reset(&mut self) {
        self.error_count = 0;
        self.backoff.reset();
    }
}

/// Shared reconciler context
///
/// One instance serves both the SteamServer and the GameDefinition controllers.
#[derive(Clone)]
pub struct Reconciler {
    pub store: Arc<dyn ObjectStore>,
    pub config: SharedControllerConfig,
    pub interpolator: Arc<Interpolator>,
    // Backoff state per resource, keyed by kind/namespace/name
    pub backoff_states: Arc<Mutex<HashMap<String, BackoffState>>>,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    #[must_use]
    pub fn new(store: Arc<dyn ObjectStore>, config: SharedControllerConfig) -> Self {
        Self {
            store,
            config,
            interpolator: Arc::new(Interpolator::new()),
            backoff_states: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Forget the error history of a resource after a clean pass
    pub fn reset_backoff(&self, key: &str) {
        if let Ok(mut states) = self.backoff_states.lock() {
            states.remove(key);
        }
    }

    /// Advance the backoff for a resource, returning (delay secs, error count)
    pub fn next_backoff(&self, key: &str) -> (u64, u32) {
        let min = self.config.error_backoff_min_secs;
        let max = self.config.error_backoff_max_secs;
        match self.backoff_states.lock() {
            Ok(mut states) => {
                let state = states
                    .entry(key.to_string())
                    .or_insert_with(|| BackoffState::new(min, max));
                state.increment_error();
                (state.backoff.next_backoff_seconds(), state.error_count)
            }
            Err(e) => {
                tracing::warn!("Failed to lock backoff_states: {}, using minimum backoff", e);
                (min, 0)
            }
        }
    }
}

/// Key used for per-resource backoff bookkeeping
#[must_use]
pub fn resource_key(kind: &str, namespace: Option<&str>, name: &str) -> String {
    match namespace {
        Some(ns) => format!("{kind}/{ns}/{name}"),
        None => format!("{kind}/{name}"),
    }
}
