//! # Custom Resource Definitions
//!
//! CRD types for the boilerr controller, API group `boilerr.dev/v1alpha1`.
//!
//! ## Module Structure
//!
//! - `game_definition.rs` - Cluster-scoped game templates
//! - `steam_server.rs` - Namespaced game server instances
//! - `config_value.rs` - Literal-or-secret config values
//! - `common.rs` - Ports, env vars, storage and other shared types

mod common;
mod config_value;
mod game_definition;
mod steam_server;

// Re-export all public types
pub use common::{
    Condition, ConfigFile, ConfigMapKeySelector, EnvVar, EnvVarSource, HealthCheckSpec,
    PortStatus, Protocol, ResourceRequirements, SecretKeySelector, ServerPort, ServiceType,
    StorageSpec, TcpSocket,
};
pub use config_value::ConfigValue;
pub use game_definition::{
    ConfigMapping, ConfigSchemaEntry, GameDefinition, GameDefinitionSpec, GameDefinitionStatus,
    MappingKind,
};
pub use steam_server::{
    default_true, ServerState, SteamServer, SteamServerSpec, SteamServerStatus,
};
