//! # Artifact Apply
//!
//! Writes synthesized artifacts in order, stopping at the first failure.
//!
//! An artifact whose live spec hash annotation equals the freshly computed
//! one is skipped, so an unchanged SteamServer causes no writes.
//!
//! - **PersistentVolumeClaim**: created once. Later passes only add missing
//!   identity labels since the claim spec is immutable.
//! - **StatefulSet**: the selector is immutable, so an existing selector is
//!   carried over when it differs from the desired one.
//! - **Service**: always selects what the live StatefulSet selects, so a
//!   kept selector never leaves the Service pointing at no pods.

use k8s_openapi::api::apps::v1::StatefulSet;
use kube::ResourceExt;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::controller::reconciler::types::{Reconciler, ReconcilerError};
use crate::observability::metrics;
use crate::resources::labels::has_labels;
use crate::resources::service::with_selector;
use crate::resources::{spec_hash_of, Artifact, ArtifactKind};

/// What happened to each artifact in one pass
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ApplySummary {
    pub applied: Vec<ArtifactKind>,
    pub skipped: Vec<ArtifactKind>,
}

impl ApplySummary {
    #[must_use]
    pub fn writes(&self) -> usize {
        self.applied.len()
    }
}

/// Apply artifacts in the given order
///
/// # Errors
///
/// Returns `ReconcilerError::Apply` naming the artifact kind that failed.
/// Artifacts after the failing one are not attempted.
pub async fn apply_artifacts(
    ctx: &Reconciler,
    namespace: &str,
    artifacts: Vec<Artifact>,
) -> Result<ApplySummary, ReconcilerError> {
    let mut summary = ApplySummary::default();
    // Selector of the StatefulSet as it exists after this pass
    let mut workload_selector: Option<BTreeMap<String, String>> = None;

    for artifact in artifacts {
        let kind = artifact.kind();
        let artifact = match (artifact, &workload_selector) {
            (Artifact::Service(svc), Some(selector)) => Artifact::Service(with_selector(svc, selector)?),
            (other, _) => other,
        };

        let wrote = match artifact {
            Artifact::StatefulSet(sts) => {
                let (wrote, selector) = apply_stateful_set(ctx, namespace, sts)
                    .await
                    .map_err(|source| ReconcilerError::Apply { kind, source })?;
                workload_selector = selector;
                wrote
            }
            other => apply_one(ctx, namespace, other)
                .await
                .map_err(|source| ReconcilerError::Apply { kind, source })?,
        };

        if wrote {
            metrics::increment_artifact_applies(kind.as_str());
            summary.applied.push(kind);
        } else {
            metrics::increment_artifact_apply_skipped(kind.as_str());
            summary.skipped.push(kind);
        }
    }

    Ok(summary)
}

/// Apply the StatefulSet, returning whether it was written and its effective selector
async fn apply_stateful_set(
    ctx: &Reconciler,
    namespace: &str,
    mut sts: StatefulSet,
) -> Result<(bool, Option<BTreeMap<String, String>>), kube::Error> {
    let kind = ArtifactKind::StatefulSet;
    let name = sts.name_any();
    let desired_selector = sts.spec.as_ref().and_then(|s| s.selector.match_labels.clone());

    let Some(existing) = ctx.store.get_stateful_set(namespace, &name).await? else {
        info!(artifact.kind = %kind, artifact.name = %name, "Applying");
        ctx.store
            .apply_artifact(namespace, &Artifact::StatefulSet(sts))
            .await?;
        return Ok((true, desired_selector));
    };

    let live_selector = existing
        .spec
        .as_ref()
        .and_then(|s| s.selector.match_labels.clone())
        .or(desired_selector);

    if spec_hash_of(&existing.metadata) == spec_hash_of(&sts.metadata) {
        debug!(artifact.kind = %kind, artifact.name = %name, "Spec hash unchanged, skipping");
        return Ok((false, live_selector));
    }
    keep_existing_selector(&mut sts, &existing);
    info!(artifact.kind = %kind, artifact.name = %name, "Applying");
    ctx.store
        .apply_artifact(namespace, &Artifact::StatefulSet(sts))
        .await?;
    Ok((true, live_selector))
}

async fn apply_one(
    ctx: &Reconciler,
    namespace: &str,
    artifact: Artifact,
) -> Result<bool, kube::Error> {
    let kind = artifact.kind();
    let name = artifact.name().to_string();

    if let Artifact::PersistentVolumeClaim(pvc) = artifact {
        let Some(existing) = ctx.store.get_artifact_meta(kind, namespace, &name).await? else {
            info!(artifact.kind = %kind, artifact.name = %name, "Creating storage claim");
            ctx.store
                .apply_artifact(namespace, &Artifact::PersistentVolumeClaim(pvc))
                .await?;
            return Ok(true);
        };

        let desired = pvc.labels();
        if has_labels(existing.labels.as_ref(), desired) {
            return Ok(false);
        }
        debug!(artifact.kind = %kind, artifact.name = %name, "Adding missing labels to storage claim");
        ctx.store
            .merge_labels(kind, namespace, &name, desired.clone())
            .await?;
        return Ok(true);
    }

    let existing = ctx.store.get_artifact_meta(kind, namespace, &name).await?;
    if existing
        .as_ref()
        .is_some_and(|meta| spec_hash_of(meta) == artifact.spec_hash())
    {
        debug!(artifact.kind = %kind, artifact.name = %name, "Spec hash unchanged, skipping");
        return Ok(false);
    }
    info!(artifact.kind = %kind, artifact.name = %name, "Applying");
    ctx.store.apply_artifact(namespace, &artifact).await?;
    Ok(true)
}

/// Carry over an immutable selector and the pod labels it matches
fn keep_existing_selector(
    desired: &mut StatefulSet,
    existing: &StatefulSet,
) {
    let (Some(desired_spec), Some(existing_spec)) = (desired.spec.as_mut(), existing.spec.as_ref())
    else {
        return;
    };
    if desired_spec.selector == existing_spec.selector {
        return;
    }

    warn!(
        desired = ?desired_spec.selector.match_labels,
        kept = ?existing_spec.selector.match_labels,
        "StatefulSet selector is immutable, keeping the existing one"
    );
    desired_spec.selector = existing_spec.selector.clone();
    let selector_labels = existing_spec.selector.match_labels.clone().unwrap_or_default();
    let pod_meta = desired_spec.template.metadata.get_or_insert_with(Default::default);
    pod_meta
        .labels
        .get_or_insert_with(Default::default)
        .extend(selector_labels);
}
