//! # SteamServer
//!
//! Namespaced request for a running game server built from a GameDefinition.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::crd::{
    Condition, ConfigFile, ConfigValue, EnvVar, PortStatus, ResourceRequirements, ServerPort,
    ServiceType, StorageSpec,
};

/// SteamServer Custom Resource Definition
///
/// Every field other than `gameDefinition` is optional. Unset fields inherit
/// from the referenced GameDefinition.
///
/// # Example
///
/// ```yaml
/// apiVersion: boilerr.dev/v1alpha1
/// kind: SteamServer
/// metadata:
///   name: vikings
///   namespace: games
/// spec:
///   gameDefinition: valheim
///   config:
///     serverName: Vikings Only
///     password:
///       secretKeyRef:
///         name: valheim-secrets
///         key: password
///   storage:
///     size: 30Gi
///   serviceType: NodePort
/// ```
#[derive(kube::CustomResource, Debug, Clone, Deserialize, Serialize, schemars::JsonSchema)]
#[kube(
    kind = "SteamServer",
    group = "boilerr.dev",
    version = "v1alpha1",
    namespaced,
    status = "crate::crd::SteamServerStatus",
    shortname = "ss",
    printcolumn = r#"{"name":"Game", "type":"string", "jsonPath":".spec.gameDefinition"}, {"name":"State", "type":"string", "jsonPath":".status.state"}, {"name":"Address", "type":"string", "jsonPath":".status.address"}, {"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct SteamServerSpec {
    /// Name of the GameDefinition to run
    pub game_definition: String,
    /// Values for the definition's config schema
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub config: BTreeMap<String, ConfigValue>,
    /// Overrides the definition's Steam application ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_id: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<ServerPort>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub command: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    /// Extra environment, overriding definition entries of the same name
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<EnvVar>,
    /// Replaces the definition's config files when non-empty
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub config_files: Vec<ConfigFile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<StorageSpec>,
    #[serde(default, skip_serializing_if = "ResourceRequirements::is_empty")]
    pub resources: ResourceRequirements,
    #[serde(default)]
    pub service_type: ServiceType,
    /// Steam beta branch to install
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub beta: Option<String>,
    /// Password for a protected beta branch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub beta_password: Option<String>,
    /// Run SteamCMD `validate` after download
    #[serde(default = "default_true")]
    pub validate: bool,
    /// Use anonymous Steam login
    #[serde(default = "default_true")]
    pub anonymous: bool,
    /// Secret holding `username` and `password` keys for non-anonymous login
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub steam_credentials_secret: Option<String>,
}

#[must_use]
pub fn default_true() -> bool {
    true
}

/// Lifecycle state of a game server
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize, schemars::JsonSchema)]
pub enum ServerState {
    /// Waiting for resources to be scheduled
    #[default]
    Pending,
    /// SteamCMD is downloading or updating game files
    Installing,
    /// The game server process is starting
    Starting,
    /// The game server is running and ready
    Running,
    Error,
}

impl ServerState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Installing => "Installing",
            Self::Starting => "Starting",
            Self::Running => "Running",
            Self::Error => "Error",
        }
    }

    /// Human-readable status message for this state
    #[must_use]
    pub fn message(self) -> &'static str {
        match self {
            Self::Pending => "Waiting for resources to be scheduled",
            Self::Installing => "SteamCMD is downloading game files",
            Self::Starting => "Game server is starting up",
            Self::Running => "Game server is running",
            Self::Error => "An error occurred",
        }
    }
}

impl std::fmt::Display for ServerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of the SteamServer resource
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SteamServerStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<ServerState>,
    /// External IP or hostname
    ///
    /// Always serialized, along with `ports` and `message`, so a merge patch
    /// can clear a previously reported value.
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub ports: Vec<PortStatus>,
    /// Last status write (RFC3339)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
    /// Installed Steam build ID
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub app_build_id: String,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}
