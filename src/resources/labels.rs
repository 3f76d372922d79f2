//! # Names and Labels
//!
//! Deterministic names and identity labels for synthesized artifacts.
//!
//! Every artifact name derives from the SteamServer name alone, so two
//! servers never contend for the same object.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use kube::{Resource, ResourceExt};
use std::collections::BTreeMap;

use crate::constants::{
    LABEL_GAME, LABEL_INSTANCE, LABEL_MANAGED_BY, LABEL_MANAGED_BY_VALUE, LABEL_NAME,
    LABEL_NAME_VALUE,
};
use crate::crd::SteamServer;

/// StatefulSet and Service name
#[must_use]
pub fn workload_name(server_name: &str) -> String {
    server_name.to_string()
}

#[must_use]
pub fn pvc_name(server_name: &str) -> String {
    format!("{server_name}-data")
}

#[must_use]
pub fn config_map_name(server_name: &str) -> String {
    format!("{server_name}-config")
}

/// The single replica's pod
#[must_use]
pub fn pod_name(server_name: &str) -> String {
    format!("{server_name}-0")
}

/// Identity labels shared by every artifact and used as the pod selector
#[must_use]
pub fn identity_labels(server_name: &str, game_definition: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        (LABEL_NAME.to_string(), LABEL_NAME_VALUE.to_string()),
        (LABEL_INSTANCE.to_string(), server_name.to_string()),
        (LABEL_MANAGED_BY.to_string(), LABEL_MANAGED_BY_VALUE.to_string()),
        (LABEL_GAME.to_string(), game_definition.to_string()),
    ])
}

/// True if every expected label is present with the same value
#[must_use]
pub fn has_labels(actual: Option<&BTreeMap<String, String>>, expected: &BTreeMap<String, String>) -> bool {
    let Some(actual) = actual else {
        return expected.is_empty();
    };
    expected.iter().all(|(k, v)| actual.get(k) == Some(v))
}

/// Controller owner reference pointing at the SteamServer
///
/// Falls back to a hand-built reference when the object has no UID yet,
/// which only happens for objects that were never persisted.
#[must_use]
pub fn owner_reference(server: &SteamServer) -> OwnerReference {
    server.controller_owner_ref(&()).unwrap_or_else(|| OwnerReference {
        api_version: SteamServer::api_version(&()).to_string(),
        kind: SteamServer::kind(&()).to_string(),
        name: server.name_any(),
        uid: server.uid().unwrap_or_default(),
        controller: Some(true),
        block_owner_deletion: Some(true),
    })
}

/// Metadata common to every synthesized artifact
#[must_use]
pub fn artifact_metadata(server: &SteamServer, name: String) -> ObjectMeta {
    ObjectMeta {
        name: Some(name),
        namespace: server.namespace(),
        labels: Some(identity_labels(
            &server.name_any(),
            &server.spec.game_definition,
        )),
        owner_references: Some(vec![owner_reference(server)]),
        ..Default::default()
    }
}
