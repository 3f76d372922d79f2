//! # GameDefinition
//!
//! Cluster-scoped template describing how to install and run one game.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::crd::{Condition, ConfigFile, EnvVar, HealthCheckSpec, ResourceRequirements, ServerPort};

/// GameDefinition Custom Resource Definition
///
/// # Example
///
/// ```yaml
/// apiVersion: boilerr.dev/v1alpha1
/// kind: GameDefinition
/// metadata:
///   name: valheim
/// spec:
///   appId: 896660
///   command: /serverfiles/valheim_server.x86_64
///   args:
///     - -name
///     - "{{.Config.serverName}}"
///   ports:
///     - name: game
///       containerPort: 2456
///   configSchema:
///     serverName:
///       required: true
///     crossplay:
///       default: "false"
///       enum: ["true", "false"]
///       mapTo:
///         type: arg
///         value: -crossplay
///         condition: "true"
/// ```
#[derive(kube::CustomResource, Debug, Clone, Deserialize, Serialize, schemars::JsonSchema)]
#[kube(
    kind = "GameDefinition",
    group = "boilerr.dev",
    version = "v1alpha1",
    status = "crate::crd::GameDefinitionStatus",
    shortname = "gd",
    printcolumn = r#"{"name":"App ID", "type":"integer", "jsonPath":".spec.appId"}, {"name":"Ready", "type":"boolean", "jsonPath":".status.ready"}, {"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct GameDefinitionSpec {
    /// Steam application ID of the dedicated server
    pub app_id: i32,
    /// Container image for both the SteamCMD init container and the game server
    #[serde(default = "default_image")]
    pub image: String,
    /// Where SteamCMD installs game files
    #[serde(default = "default_install_dir")]
    pub install_dir: String,
    /// Game server startup command
    pub command: String,
    /// Default startup arguments, supporting `{{.Config.key}}` templates
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    #[serde(default)]
    pub ports: Vec<ServerPort>,
    /// Default environment variables
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<EnvVar>,
    /// User-configurable options keyed by config name
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub config_schema: BTreeMap<String, ConfigSchemaEntry>,
    /// Static config file templates
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub config_files: Vec<ConfigFile>,
    /// Recommended resource requirements
    #[serde(default, skip_serializing_if = "ResourceRequirements::is_empty")]
    pub default_resources: ResourceRequirements,
    /// Recommended storage size
    #[serde(default = "default_storage")]
    pub default_storage: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_check: Option<HealthCheckSpec>,
}

fn default_image() -> String {
    crate::constants::DEFAULT_IMAGE.to_string()
}

fn default_install_dir() -> String {
    crate::constants::DEFAULT_INSTALL_DIR.to_string()
}

fn default_storage() -> String {
    crate::constants::DEFAULT_STORAGE_SIZE.to_string()
}

/// A user-configurable option
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConfigSchemaEntry {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Value used when the server does not set this option
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub default: String,
    #[serde(default)]
    pub required: bool,
    /// The value is expected to come from a Secret
    #[serde(default)]
    pub secret: bool,
    /// Allowed literal values
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub r#enum: Vec<String>,
    #[serde(default)]
    pub array: bool,
    /// How the value is applied beyond argument templates
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map_to: Option<ConfigMapping>,
}

/// Supported `mapTo.type` values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingKind {
    Arg,
    Env,
    ConfigFile,
}

/// How a config value is applied to the game server container
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConfigMapping {
    /// One of `arg`, `env` or `configFile`
    pub r#type: String,
    /// Flag to add for `arg`, variable name for `env`
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub value: String,
    /// For `arg`: add the flag only when the config value equals this
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub condition: String,
    /// For `configFile`: mount path
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub path: String,
    /// For `configFile`: file content template
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub template: String,
}

impl ConfigMapping {
    /// Parsed mapping type, `None` when unrecognised
    #[must_use]
    pub fn kind(&self) -> Option<MappingKind> {
        match self.r#type.as_str() {
            "arg" => Some(MappingKind::Arg),
            "env" => Some(MappingKind::Env),
            "configFile" => Some(MappingKind::ConfigFile),
            _ => None,
        }
    }
}

/// Status of the GameDefinition resource
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GameDefinitionStatus {
    /// The definition is valid and usable by SteamServers
    #[serde(default)]
    pub ready: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}
