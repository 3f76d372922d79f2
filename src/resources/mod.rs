//! # Resource Synthesizer
//!
//! Turns a SteamServer and its GameDefinition into the concrete artifacts
//! that run the game server:
//!
//! - **ConfigMap** `<name>-config`: rendered config files, only when there are any
//! - **PersistentVolumeClaim** `<name>-data`: game file storage, skipped for a zero size
//! - **StatefulSet** `<name>`: steamcmd init container plus the game server
//! - **Service** `<name>`: exposes the game ports
//!
//! Every artifact carries the identity labels, a controller owner reference
//! and a spec hash annotation. Synthesis is pure, so the same inputs always
//! produce byte-identical artifacts with identical hashes.

pub mod configmap;
pub mod env;
pub mod labels;
pub mod mapping;
pub mod merge;
pub mod pvc;
pub mod service;
pub mod statefulset;
pub mod steamcmd;

use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::core::v1::{ConfigMap, PersistentVolumeClaim, Service};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::Resource;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt::Write as _;
use thiserror::Error;

use crate::constants::SPEC_HASH_ANNOTATION;
use crate::crd::{GameDefinitionSpec, SteamServer};
use crate::resolver::{Interpolator, ResolvedConfig, TemplateError};

pub use merge::{merge_spec, MergedSpec, StoragePlan};

/// Synthesis failure
#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error("failed to serialize {kind} for hashing: {source}")]
    Hash {
        kind: ArtifactKind,
        #[source]
        source: serde_json::Error,
    },
}

/// Artifact kind, also used as a metrics label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    ConfigMap,
    PersistentVolumeClaim,
    StatefulSet,
    Service,
}

impl ArtifactKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ArtifactKind::ConfigMap => "ConfigMap",
            ArtifactKind::PersistentVolumeClaim => "PersistentVolumeClaim",
            ArtifactKind::StatefulSet => "StatefulSet",
            ArtifactKind::Service => "Service",
        }
    }
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A synthesized artifact
#[derive(Debug, Clone, PartialEq)]
pub enum Artifact {
    ConfigMap(ConfigMap),
    PersistentVolumeClaim(PersistentVolumeClaim),
    StatefulSet(StatefulSet),
    Service(Service),
}

impl Artifact {
    #[must_use]
    pub fn kind(&self) -> ArtifactKind {
        match self {
            Artifact::ConfigMap(_) => ArtifactKind::ConfigMap,
            Artifact::PersistentVolumeClaim(_) => ArtifactKind::PersistentVolumeClaim,
            Artifact::StatefulSet(_) => ArtifactKind::StatefulSet,
            Artifact::Service(_) => ArtifactKind::Service,
        }
    }

    #[must_use]
    pub fn metadata(&self) -> &ObjectMeta {
        match self {
            Artifact::ConfigMap(o) => &o.metadata,
            Artifact::PersistentVolumeClaim(o) => &o.metadata,
            Artifact::StatefulSet(o) => &o.metadata,
            Artifact::Service(o) => &o.metadata,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.metadata().name.as_deref().unwrap_or_default()
    }

    /// The spec hash stamped at synthesis time
    #[must_use]
    pub fn spec_hash(&self) -> Option<&str> {
        spec_hash_of(self.metadata())
    }
}

/// Read the spec hash annotation from object metadata
#[must_use]
pub fn spec_hash_of(meta: &ObjectMeta) -> Option<&str> {
    meta.annotations
        .as_ref()
        .and_then(|a| a.get(SPEC_HASH_ANNOTATION))
        .map(String::as_str)
}

/// Truncated SHA-256 of the input, 16 hex chars
///
/// Stable across toolchains, so safe to persist in annotations.
#[must_use]
pub fn deterministic_hash(input: &[u8]) -> String {
    let digest = Sha256::digest(input);
    digest[..8]
        .iter()
        .fold(String::with_capacity(16), |mut s, b| {
            let _ = write!(s, "{b:02x}");
            s
        })
}

/// Hash the object as built and record it in its annotations
pub(crate) fn stamp_hash<K>(mut obj: K, kind: ArtifactKind) -> Result<K, SynthesisError>
where
    K: Resource + Serialize,
{
    let bytes = serde_json::to_vec(&obj).map_err(|source| SynthesisError::Hash { kind, source })?;
    let hash = deterministic_hash(&bytes);
    obj.meta_mut()
        .annotations
        .get_or_insert_with(Default::default)
        .insert(SPEC_HASH_ANNOTATION.to_string(), hash);
    Ok(obj)
}

/// Produce the artifacts for one server, in apply order
///
/// # Errors
///
/// Returns `SynthesisError::Template` if any argument or config file template
/// fails to render. Nothing is produced in that case.
pub fn synthesize(
    server: &SteamServer,
    definition: &GameDefinitionSpec,
    resolved: &ResolvedConfig,
    interpolator: &Interpolator,
) -> Result<Vec<Artifact>, SynthesisError> {
    let merged = merge_spec(&server.spec, definition, resolved, interpolator)?;
    let mut artifacts = Vec::with_capacity(4);

    let bundle = configmap::build_config_map(server, &merged.config_files);
    let has_bundle = bundle.is_some();
    if let Some(cm) = bundle {
        artifacts.push(Artifact::ConfigMap(stamp_hash(cm, ArtifactKind::ConfigMap)?));
    }

    if let Some(storage) = &merged.storage {
        let pvc = pvc::build_pvc(server, storage);
        artifacts.push(Artifact::PersistentVolumeClaim(stamp_hash(
            pvc,
            ArtifactKind::PersistentVolumeClaim,
        )?));
    }

    let sts = statefulset::build_stateful_set(server, &merged, has_bundle);
    artifacts.push(Artifact::StatefulSet(stamp_hash(sts, ArtifactKind::StatefulSet)?));

    let svc = service::build_service(server, &merged);
    artifacts.push(Artifact::Service(stamp_hash(svc, ArtifactKind::Service)?));

    Ok(artifacts)
}
