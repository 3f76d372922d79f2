//! # Reconciler
//!
//! Reconciliation logic for `SteamServer` resources.
//!
//! The reconciler:
//! - Watches `SteamServer` resources across all namespaces
//! - Resolves the referenced `GameDefinition` and the server's config
//! - Synthesizes and applies the ConfigMap, PVC, StatefulSet and Service
//! - Classifies the live workload and publishes state, address and ports
//!
//! All cluster access goes through the [`ObjectStore`] trait.

pub mod apply;
pub mod reconcile;
pub mod state;
pub mod status;
pub mod store;
pub mod types;

pub use reconcile::reconcile;
pub use store::{KubeStore, ObjectStore};
pub use types::{resource_key, BackoffState, Reconciler, ReconcilerError};
