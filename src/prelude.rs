//! # Prelude
//!
//! Re-exports commonly used types and traits.
//!
//! ```rust
//! use boilerr_controller::prelude::*;
//! ```

// CRD types
pub use crate::crd::*;

// Reconciler types and the cluster access seam
pub use crate::controller::reconciler::{
    reconcile, BackoffState, KubeStore, ObjectStore, Reconciler, ReconcilerError,
};
pub use crate::controller::definition::{reconcile_definition, validate_game_definition};

// Config resolution and artifact synthesis
pub use crate::resolver::{resolve, validate_config, ConfigError, Interpolator, ResolvedConfig};
pub use crate::resources::{synthesize, Artifact, ArtifactKind, SynthesisError};

pub use crate::config::{
    ControllerConfig, ServerConfig, SharedControllerConfig, SharedServerConfig,
};
