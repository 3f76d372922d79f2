//! Network exposure for the game server.

use k8s_openapi::api::core::v1::{Service, ServicePort, ServiceSpec};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::ResourceExt;
use std::collections::BTreeMap;

use crate::constants::SPEC_HASH_ANNOTATION;
use crate::crd::SteamServer;
use crate::resources::labels::{artifact_metadata, identity_labels, workload_name};
use crate::resources::merge::MergedSpec;
use crate::resources::{stamp_hash, ArtifactKind, SynthesisError};

#[must_use]
pub fn build_service(server: &SteamServer, merged: &MergedSpec) -> Service {
    let name = server.name_any();
    let ports = merged
        .ports
        .iter()
        .map(|p| ServicePort {
            name: Some(p.name.clone()),
            port: p.effective_service_port(),
            target_port: Some(IntOrString::Int(p.container_port)),
            protocol: Some(p.protocol.as_str().to_string()),
            ..Default::default()
        })
        .collect();

    Service {
        metadata: artifact_metadata(server, workload_name(&name)),
        spec: Some(ServiceSpec {
            type_: Some(merged.service_type.as_str().to_string()),
            selector: Some(identity_labels(&name, &server.spec.game_definition)),
            ports: Some(ports),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Point a synthesized Service at the selector the live StatefulSet kept
///
/// A StatefulSet selector cannot change after creation, so when the
/// identity labels move (a new `gameDefinition`) the pods keep the old
/// labels and the Service has to follow them. The spec hash is recomputed
/// so the retargeted Service is compared against itself on later passes.
///
/// # Errors
///
/// Returns `SynthesisError::Hash` if the Service cannot be serialized.
pub fn with_selector(
    mut svc: Service,
    selector: &BTreeMap<String, String>,
) -> Result<Service, SynthesisError> {
    let spec = svc.spec.get_or_insert_with(Default::default);
    if spec.selector.as_ref() == Some(selector) {
        return Ok(svc);
    }
    spec.selector = Some(selector.clone());

    if let Some(annotations) = svc.metadata.annotations.as_mut() {
        annotations.remove(SPEC_HASH_ANNOTATION);
        if annotations.is_empty() {
            svc.metadata.annotations = None;
        }
    }
    stamp_hash(svc, ArtifactKind::Service)
}
