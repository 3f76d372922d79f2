//! # Shared CRD Types
//!
//! Types used by both GameDefinition and SteamServer.
//!
//! Pod-level types (env vars, resource hints, probes) are declared here rather
//! than borrowed from `k8s-openapi` so they carry their own schemas. Each one
//! converts into its `k8s-openapi` counterpart with `to_k8s()` at synthesis time.

use k8s_openapi::api::core::v1 as corev1;
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Network protocol for a game port
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
pub enum Protocol {
    #[serde(rename = "TCP")]
    Tcp,
    /// Default for game ports
    #[default]
    #[serde(rename = "UDP")]
    Udp,
}

impl Protocol {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Tcp => "TCP",
            Self::Udp => "UDP",
        }
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A port to expose for the game server
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ServerPort {
    /// Unique identifier for this port
    pub name: String,
    /// Port number on the container (1-65535)
    pub container_port: i32,
    /// Port number exposed on the Service, defaults to `containerPort`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_port: Option<i32>,
    #[serde(default)]
    pub protocol: Protocol,
}

impl ServerPort {
    /// Port exposed on the Service
    #[must_use]
    pub fn effective_service_port(&self) -> i32 {
        match self.service_port {
            Some(p) if p > 0 => p,
            _ => self.container_port,
        }
    }
}

/// Selects a key of a Secret in the server's namespace
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
pub struct SecretKeySelector {
    /// Name of the Secret
    pub name: String,
    /// Key within the Secret
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optional: Option<bool>,
}

impl SecretKeySelector {
    #[must_use]
    pub fn to_k8s(&self) -> corev1::SecretKeySelector {
        corev1::SecretKeySelector {
            name: self.name.clone(),
            key: self.key.clone(),
            optional: self.optional,
        }
    }
}

/// Selects a key of a ConfigMap in the server's namespace
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
pub struct ConfigMapKeySelector {
    pub name: String,
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optional: Option<bool>,
}

/// Source for an environment variable's value
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EnvVarSource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_key_ref: Option<SecretKeySelector>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_map_key_ref: Option<ConfigMapKeySelector>,
}

impl EnvVarSource {
    #[must_use]
    pub fn to_k8s(&self) -> corev1::EnvVarSource {
        corev1::EnvVarSource {
            secret_key_ref: self.secret_key_ref.as_ref().map(SecretKeySelector::to_k8s),
            config_map_key_ref: self.config_map_key_ref.as_ref().map(|c| {
                corev1::ConfigMapKeySelector {
                    name: c.name.clone(),
                    key: c.key.clone(),
                    optional: c.optional,
                }
            }),
            ..Default::default()
        }
    }
}

/// Environment variable for the game server container
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EnvVar {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_from: Option<EnvVarSource>,
}

impl EnvVar {
    /// Literal environment variable
    #[must_use]
    pub fn literal(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: Some(value.into()),
            value_from: None,
        }
    }

    /// Environment variable sourced from a Secret key
    #[must_use]
    pub fn from_secret(name: impl Into<String>, selector: SecretKeySelector) -> Self {
        Self {
            name: name.into(),
            value: None,
            value_from: Some(EnvVarSource {
                secret_key_ref: Some(selector),
                config_map_key_ref: None,
            }),
        }
    }

    #[must_use]
    pub fn to_k8s(&self) -> corev1::EnvVar {
        corev1::EnvVar {
            name: self.name.clone(),
            value: self.value.clone(),
            value_from: self.value_from.as_ref().map(EnvVarSource::to_k8s),
        }
    }
}

/// Compute resource requirements, quantities kept as strings
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
pub struct ResourceRequirements {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub limits: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub requests: BTreeMap<String, String>,
}

impl ResourceRequirements {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.limits.is_empty() && self.requests.is_empty()
    }

    #[must_use]
    pub fn to_k8s(&self) -> corev1::ResourceRequirements {
        let to_quantities = |m: &BTreeMap<String, String>| {
            (!m.is_empty()).then(|| {
                m.iter()
                    .map(|(k, v)| (k.clone(), Quantity(v.clone())))
                    .collect::<BTreeMap<_, _>>()
            })
        };
        corev1::ResourceRequirements {
            limits: to_quantities(&self.limits),
            requests: to_quantities(&self.requests),
            ..Default::default()
        }
    }
}

/// A configuration file mounted into the game server container
///
/// `content` may reference config values with `{{.Config.key}}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
pub struct ConfigFile {
    /// Absolute path where the file is mounted
    pub path: String,
    pub content: String,
}

/// Persistent storage for game files
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StorageSpec {
    /// Requested size, e.g. `30Gi`. Falls back to the definition's `defaultStorage`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    /// StorageClass to use, cluster default when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_class_name: Option<String>,
}

/// How the game server is exposed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
pub enum ServiceType {
    #[default]
    LoadBalancer,
    NodePort,
    #[serde(rename = "ClusterIP")]
    ClusterIp,
}

impl ServiceType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LoadBalancer => "LoadBalancer",
            Self::NodePort => "NodePort",
            Self::ClusterIp => "ClusterIP",
        }
    }
}

/// TCP port probe target
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
pub struct TcpSocket {
    pub port: i32,
}

/// Health check hint for the game server container
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthCheckSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tcp_socket: Option<TcpSocket>,
    #[serde(default = "default_initial_delay_seconds")]
    pub initial_delay_seconds: i32,
    #[serde(default = "default_period_seconds")]
    pub period_seconds: i32,
}

fn default_initial_delay_seconds() -> i32 {
    crate::constants::DEFAULT_HEALTH_INITIAL_DELAY_SECS
}

fn default_period_seconds() -> i32 {
    crate::constants::DEFAULT_HEALTH_PERIOD_SECS
}

impl HealthCheckSpec {
    /// Readiness probe for the game server container, if a TCP target is set
    #[must_use]
    pub fn to_readiness_probe(&self) -> Option<corev1::Probe> {
        let tcp = self.tcp_socket.as_ref()?;
        Some(corev1::Probe {
            tcp_socket: Some(corev1::TCPSocketAction {
                port: IntOrString::Int(tcp.port),
                host: None,
            }),
            initial_delay_seconds: Some(self.initial_delay_seconds),
            period_seconds: Some(self.period_seconds),
            ..Default::default()
        })
    }
}

/// Exposed port information reported in status
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
pub struct PortStatus {
    pub name: String,
    pub port: i32,
    #[serde(default)]
    pub protocol: Protocol,
}

/// Condition represents a condition of a resource
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition
    pub r#type: String,
    /// Status of the condition (True, False, Unknown)
    pub status: String,
    /// Last transition time
    #[serde(default)]
    pub last_transition_time: Option<String>,
    /// Reason for the condition
    #[serde(default)]
    pub reason: Option<String>,
    /// Message describing the condition
    #[serde(default)]
    pub message: Option<String>,
}

impl Condition {
    /// Build a `Ready` condition, keeping the previous transition time if the status is unchanged
    #[must_use]
    pub fn ready(ready: bool, reason: &str, message: &str, previous: &[Condition]) -> Self {
        let status = if ready { "True" } else { "False" };
        let last_transition_time = previous
            .iter()
            .find(|c| c.r#type == "Ready" && c.status == status)
            .and_then(|c| c.last_transition_time.clone())
            .or_else(|| Some(chrono::Utc::now().to_rfc3339()));
        Self {
            r#type: "Ready".to_string(),
            status: status.to_string(),
            last_transition_time,
            reason: Some(reason.to_string()),
            message: Some(message.to_string()),
        }
    }
}
