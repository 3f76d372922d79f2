//! # State Classifier
//!
//! Maps the live workload and pod to a [`ServerState`]. Checked in priority
//! order, first match wins:
//!
//! | observation                                   | state      |
//! |-----------------------------------------------|------------|
//! | StatefulSet missing                           | Pending    |
//! | zero ready and zero total replicas            | Pending    |
//! | pod missing                                   | Pending    |
//! | pod lookup failed                             | Error      |
//! | pod phase `Pending`                           | Pending    |
//! | phase `Running`, steamcmd running             | Installing |
//! | phase `Running`, steamcmd exited non-zero     | Error      |
//! | phase `Running`, gameserver running and ready | Running    |
//! | phase `Running`, anything else                | Starting   |
//! | pod phase `Failed`                            | Error      |
//! | any other phase                               | Pending    |

use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::core::v1::{ContainerStatus, Pod};

use crate::constants::{GAME_SERVER_CONTAINER_NAME, INIT_CONTAINER_NAME};
use crate::crd::ServerState;

/// What the pod lookup returned
#[derive(Debug)]
pub enum PodObservation<'a> {
    Found(&'a Pod),
    Missing,
    LookupFailed,
}

/// True when the StatefulSet exists and has at least one replica counted
#[must_use]
pub fn workload_has_replicas(sts: Option<&StatefulSet>) -> bool {
    let Some(status) = sts.and_then(|s| s.status.as_ref()) else {
        return false;
    };
    status.ready_replicas.unwrap_or(0) > 0 || status.replicas > 0
}

/// Classify a server from its StatefulSet and pod
#[must_use]
pub fn classify(sts: Option<&StatefulSet>, pod: &PodObservation<'_>) -> ServerState {
    if !workload_has_replicas(sts) {
        return ServerState::Pending;
    }

    let pod = match pod {
        PodObservation::Found(pod) => *pod,
        PodObservation::Missing => return ServerState::Pending,
        PodObservation::LookupFailed => return ServerState::Error,
    };

    let Some(status) = pod.status.as_ref() else {
        return ServerState::Pending;
    };

    match status.phase.as_deref() {
        Some("Pending") => ServerState::Pending,
        Some("Running") => classify_running(
            status.init_container_statuses.as_deref().unwrap_or_default(),
            status.container_statuses.as_deref().unwrap_or_default(),
        ),
        Some("Failed") => ServerState::Error,
        _ => ServerState::Pending,
    }
}

fn classify_running(init: &[ContainerStatus], main: &[ContainerStatus]) -> ServerState {
    if let Some(steamcmd) = init.iter().find(|c| c.name == INIT_CONTAINER_NAME) {
        if let Some(state) = &steamcmd.state {
            if state.running.is_some() {
                return ServerState::Installing;
            }
            if state.terminated.as_ref().is_some_and(|t| t.exit_code != 0) {
                return ServerState::Error;
            }
        }
    }

    let game = main.iter().find(|c| c.name == GAME_SERVER_CONTAINER_NAME);
    match game {
        Some(c) if c.ready && c.state.as_ref().is_some_and(|s| s.running.is_some()) => {
            ServerState::Running
        }
        _ => ServerState::Starting,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sts(replicas: i32, ready: i32) -> StatefulSet {
        serde_json::from_value(json!({
            "metadata": {"name": "vikings"},
            "status": {"replicas": replicas, "readyReplicas": ready}
        }))
        .unwrap()
    }

    fn pod(phase: &str, init_state: serde_json::Value, main: Option<(serde_json::Value, bool)>) -> Pod {
        let mut status = json!({
            "phase": phase,
            "initContainerStatuses": [{
                "name": "steamcmd", "image": "i", "imageID": "", "ready": false,
                "restartCount": 0, "state": init_state
            }]
        });
        if let Some((state, ready)) = main {
            status["containerStatuses"] = json!([{
                "name": "gameserver", "image": "i", "imageID": "", "ready": ready,
                "restartCount": 0, "state": state
            }]);
        }
        serde_json::from_value(json!({"metadata": {"name": "vikings-0"}, "status": status})).unwrap()
    }

    fn running() -> serde_json::Value {
        json!({"running": {}})
    }

    fn exited(code: i32) -> serde_json::Value {
        json!({"terminated": {"exitCode": code}})
    }

    #[test]
    fn test_missing_workload_is_pending() {
        assert_eq!(classify(None, &PodObservation::Missing), ServerState::Pending);
        let empty = sts(0, 0);
        assert_eq!(classify(Some(&empty), &PodObservation::Missing), ServerState::Pending);
    }

    #[test]
    fn test_pod_lookup_outcomes() {
        let s = sts(1, 0);
        assert_eq!(classify(Some(&s), &PodObservation::Missing), ServerState::Pending);
        assert_eq!(classify(Some(&s), &PodObservation::LookupFailed), ServerState::Error);
    }

    #[test]
    fn test_installing_while_steamcmd_runs() {
        let s = sts(1, 0);
        let p = pod("Running", running(), None);
        assert_eq!(classify(Some(&s), &PodObservation::Found(&p)), ServerState::Installing);
    }

    #[test]
    fn test_install_failure_is_error() {
        let s = sts(1, 0);
        let p = pod("Running", exited(1), Some((running(), false)));
        assert_eq!(classify(Some(&s), &PodObservation::Found(&p)), ServerState::Error);
    }

    #[test]
    fn test_running_requires_ready_game_container() {
        let s = sts(1, 1);
        let ready = pod("Running", exited(0), Some((running(), true)));
        assert_eq!(classify(Some(&s), &PodObservation::Found(&ready)), ServerState::Running);

        let not_ready = pod("Running", exited(0), Some((running(), false)));
        assert_eq!(
            classify(Some(&s), &PodObservation::Found(&not_ready)),
            ServerState::Starting
        );

        let waiting = pod("Running", exited(0), Some((json!({"waiting": {}}), false)));
        assert_eq!(classify(Some(&s), &PodObservation::Found(&waiting)), ServerState::Starting);
    }

    #[test]
    fn test_phases() {
        let s = sts(1, 0);
        let failed = pod("Failed", exited(0), None);
        assert_eq!(classify(Some(&s), &PodObservation::Found(&failed)), ServerState::Error);
        let pending = pod("Pending", json!({"waiting": {}}), None);
        assert_eq!(classify(Some(&s), &PodObservation::Found(&pending)), ServerState::Pending);
        let unknown = pod("Unknown", exited(0), None);
        assert_eq!(classify(Some(&s), &PodObservation::Found(&unknown)), ServerState::Pending);
    }
}
