//! # Status Management
//!
//! Builds SteamServer and GameDefinition status and writes it only when
//! something a user can see has changed.

use k8s_openapi::api::core::v1::Service;
use kube::ResourceExt;
use tracing::debug;

use crate::constants::{ADDRESS_NODE_IP, ADDRESS_PENDING};
use crate::controller::reconciler::types::{Reconciler, ReconcilerError};
use crate::crd::{
    Condition, GameDefinition, GameDefinitionStatus, PortStatus, Protocol, ServerState,
    SteamServer, SteamServerStatus,
};
use crate::observability::metrics;

/// Address clients should connect to
///
/// - LoadBalancer: first ingress IP or hostname, else `<pending>`
/// - NodePort: `<node-ip>`, resolved by the user against any node
/// - ClusterIP: the cluster IP
#[must_use]
pub fn derive_address(svc: Option<&Service>) -> String {
    let Some(svc) = svc else {
        return String::new();
    };
    let spec = svc.spec.as_ref();
    match spec.and_then(|s| s.type_.as_deref()) {
        Some("NodePort") => ADDRESS_NODE_IP.to_string(),
        Some("ClusterIP") => spec
            .and_then(|s| s.cluster_ip.clone())
            .unwrap_or_default(),
        _ => svc
            .status
            .as_ref()
            .and_then(|s| s.load_balancer.as_ref())
            .and_then(|lb| lb.ingress.as_ref())
            .and_then(|ingress| ingress.first())
            .and_then(|i| i.ip.clone().or_else(|| i.hostname.clone()))
            .unwrap_or_else(|| ADDRESS_PENDING.to_string()),
    }
}

/// Ports as exposed by the Service
///
/// In NodePort mode the allocated node port is reported once assigned.
#[must_use]
pub fn port_snapshot(svc: Option<&Service>) -> Vec<PortStatus> {
    let Some(spec) = svc.and_then(|s| s.spec.as_ref()) else {
        return Vec::new();
    };
    let node_routed = spec.type_.as_deref() == Some("NodePort");
    spec.ports
        .as_deref()
        .unwrap_or_default()
        .iter()
        .map(|p| PortStatus {
            name: p.name.clone().unwrap_or_default(),
            port: if node_routed {
                p.node_port.unwrap_or(p.port)
            } else {
                p.port
            },
            protocol: match p.protocol.as_deref() {
                Some("TCP") => Protocol::Tcp,
                _ => Protocol::Udp,
            },
        })
        .collect()
}

/// Observed state for one pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    pub state: ServerState,
    pub address: String,
    pub ports: Vec<PortStatus>,
    pub message: String,
}

impl Observation {
    #[must_use]
    pub fn healthy(state: ServerState, address: String, ports: Vec<PortStatus>) -> Self {
        Self {
            state,
            address,
            ports,
            message: state.message().to_string(),
        }
    }

    /// Error observation that keeps the last known address and ports
    #[must_use]
    pub fn error(previous: Option<&SteamServerStatus>, message: String) -> Self {
        Self {
            state: ServerState::Error,
            address: previous.map(|s| s.address.clone()).unwrap_or_default(),
            ports: previous.map(|s| s.ports.clone()).unwrap_or_default(),
            message,
        }
    }

    /// True when the stored status already reflects this observation
    #[must_use]
    pub fn matches(&self, previous: Option<&SteamServerStatus>) -> bool {
        previous.is_some_and(|p| {
            p.state == Some(self.state)
                && p.address == self.address
                && p.ports == self.ports
                && p.message == self.message
        })
    }

    #[must_use]
    pub fn into_status(self, previous: Option<&SteamServerStatus>) -> SteamServerStatus {
        let prev_conditions = previous.map(|s| s.conditions.as_slice()).unwrap_or_default();
        let running = self.state == ServerState::Running;
        SteamServerStatus {
            state: Some(self.state),
            conditions: vec![Condition::ready(
                running,
                self.state.as_str(),
                &self.message,
                prev_conditions,
            )],
            address: self.address,
            ports: self.ports,
            last_updated: Some(chrono::Utc::now().to_rfc3339()),
            app_build_id: previous.map(|s| s.app_build_id.clone()).unwrap_or_default(),
            message: self.message,
        }
    }
}

/// Persist a SteamServer observation if it differs from the stored status
///
/// Returns whether a write happened.
///
/// # Errors
///
/// Returns `ReconcilerError::Kube` if the write fails, including a 409 when the
/// server changed since it was fetched.
pub async fn write_server_status(
    ctx: &Reconciler,
    server: &SteamServer,
    observation: Observation,
) -> Result<bool, ReconcilerError> {
    let previous = server.status.as_ref();
    if observation.matches(previous) {
        debug!(
            resource.name = %server.name_any(),
            state = observation.state.as_str(),
            "Skipping status update - state, address and ports unchanged"
        );
        return Ok(false);
    }

    let previous_state = previous.and_then(|s| s.state).map(ServerState::as_str);
    let state = observation.state;
    let status = observation.into_status(previous);
    ctx.store
        .patch_steam_server_status(
            &server.namespace().unwrap_or_default(),
            &server.name_any(),
            server.resource_version(),
            &status,
        )
        .await?;

    metrics::increment_status_writes("SteamServer");
    metrics::record_server_state_transition(previous_state, state.as_str());
    Ok(true)
}

/// Persist GameDefinition readiness if the flag or message changed
///
/// # Errors
///
/// Returns `ReconcilerError::Kube` if the write fails.
pub async fn write_definition_status(
    ctx: &Reconciler,
    definition: &GameDefinition,
    ready: bool,
    message: &str,
) -> Result<bool, ReconcilerError> {
    let previous = definition.status.as_ref();
    if previous.is_some_and(|s| s.ready == ready && s.message == message) {
        debug!(
            resource.name = %definition.name_any(),
            ready,
            "Skipping status update - ready flag and message unchanged"
        );
        return Ok(false);
    }

    let prev_conditions = previous.map(|s| s.conditions.as_slice()).unwrap_or_default();
    let reason = if ready { "Validated" } else { "ValidationFailed" };
    let status = GameDefinitionStatus {
        ready,
        message: message.to_string(),
        conditions: vec![Condition::ready(ready, reason, message, prev_conditions)],
    };
    ctx.store
        .patch_game_definition_status(&definition.name_any(), definition.resource_version(), &status)
        .await?;

    metrics::increment_status_writes("GameDefinition");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn svc(value: serde_json::Value) -> Service {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_load_balancer_address() {
        let pending = svc(json!({"spec": {"type": "LoadBalancer", "ports": [{"port": 2456}]}}));
        assert_eq!(derive_address(Some(&pending)), "<pending>");

        let assigned = svc(json!({
            "spec": {"type": "LoadBalancer"},
            "status": {"loadBalancer": {"ingress": [{"ip": "203.0.113.7"}, {"ip": "203.0.113.8"}]}}
        }));
        assert_eq!(derive_address(Some(&assigned)), "203.0.113.7");

        let hostname = svc(json!({
            "spec": {"type": "LoadBalancer"},
            "status": {"loadBalancer": {"ingress": [{"hostname": "lb.example.com"}]}}
        }));
        assert_eq!(derive_address(Some(&hostname)), "lb.example.com");
    }

    #[test]
    fn test_node_port_and_cluster_ip_address() {
        let node = svc(json!({"spec": {"type": "NodePort"}}));
        assert_eq!(derive_address(Some(&node)), "<node-ip>");

        let internal = svc(json!({"spec": {"type": "ClusterIP", "clusterIP": "10.0.0.12"}}));
        assert_eq!(derive_address(Some(&internal)), "10.0.0.12");

        assert_eq!(derive_address(None), "");
    }

    #[test]
    fn test_port_snapshot_reports_node_port() {
        let node = svc(json!({"spec": {"type": "NodePort", "ports": [
            {"name": "game", "port": 2456, "nodePort": 30456, "protocol": "UDP"},
            {"name": "query", "port": 2457, "protocol": "TCP"}
        ]}}));
        let ports = port_snapshot(Some(&node));
        assert_eq!(ports[0].port, 30456);
        assert_eq!(ports[1].port, 2457);
        assert_eq!(ports[1].protocol, Protocol::Tcp);

        let lb = svc(json!({"spec": {"type": "LoadBalancer", "ports": [
            {"name": "game", "port": 2456, "nodePort": 30456}
        ]}}));
        assert_eq!(port_snapshot(Some(&lb))[0].port, 2456);
    }

    #[test]
    fn test_matches_ignores_timestamps() {
        let obs = Observation::healthy(ServerState::Starting, "<pending>".into(), vec![]);
        assert!(!obs.matches(None));
        let stored = obs.clone().into_status(None);
        assert!(obs.matches(Some(&stored)));

        let moved = Observation::healthy(ServerState::Running, "<pending>".into(), vec![]);
        assert!(!moved.matches(Some(&stored)));
    }

    #[test]
    fn test_error_keeps_last_address() {
        let stored = Observation::healthy(ServerState::Running, "203.0.113.7".into(), vec![])
            .into_status(None);
        let err = Observation::error(Some(&stored), "boom".into());
        assert_eq!(err.address, "203.0.113.7");
        let status = err.into_status(Some(&stored));
        assert_eq!(status.state, Some(ServerState::Error));
        assert_eq!(status.conditions[0].status, "False");
    }
}
