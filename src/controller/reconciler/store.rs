//! # Object Store
//!
//! The reconcilers' only view of the cluster. The trait lets tests swap in
//! a mock or an in-memory fake while production uses [`KubeStore`].
//!
//! Every getter maps a 404 to `Ok(None)`, so callers only see real failures
//! as errors.

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::core::v1::{ConfigMap, PersistentVolumeClaim, Pod, Service};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{Api, ListParams, Patch, PatchParams};
use kube::Client;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::collections::BTreeMap;

#[cfg(test)]
use mockall::automock;

use crate::constants::FIELD_MANAGER;
use crate::crd::{GameDefinition, GameDefinitionStatus, SteamServer, SteamServerStatus};
use crate::resources::{Artifact, ArtifactKind};

#[cfg_attr(test, automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get_steam_server(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<SteamServer>, kube::Error>;

    /// All SteamServers in every namespace
    async fn list_steam_servers(&self) -> Result<Vec<SteamServer>, kube::Error>;

    async fn get_game_definition(&self, name: &str) -> Result<Option<GameDefinition>, kube::Error>;

    /// Replace the finalizer list
    async fn set_steam_server_finalizers(
        &self,
        namespace: &str,
        name: &str,
        finalizers: Vec<String>,
    ) -> Result<(), kube::Error>;

    /// Write status, conditioned on `resource_version` when given
    async fn patch_steam_server_status(
        &self,
        namespace: &str,
        name: &str,
        resource_version: Option<String>,
        status: &SteamServerStatus,
    ) -> Result<(), kube::Error>;

    async fn patch_game_definition_status(
        &self,
        name: &str,
        resource_version: Option<String>,
        status: &GameDefinitionStatus,
    ) -> Result<(), kube::Error>;

    /// Metadata of an existing artifact
    async fn get_artifact_meta(
        &self,
        kind: ArtifactKind,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ObjectMeta>, kube::Error>;

    async fn get_stateful_set(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<StatefulSet>, kube::Error>;

    async fn get_service(&self, namespace: &str, name: &str) -> Result<Option<Service>, kube::Error>;

    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Option<Pod>, kube::Error>;

    /// Server-side apply of a synthesized artifact
    async fn apply_artifact(&self, namespace: &str, artifact: &Artifact) -> Result<(), kube::Error>;

    /// Merge labels into an existing artifact without touching its spec
    async fn merge_labels(
        &self,
        kind: ArtifactKind,
        namespace: &str,
        name: &str,
        labels: BTreeMap<String, String>,
    ) -> Result<(), kube::Error>;
}

/// Kubernetes-backed store
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl std::fmt::Debug for KubeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeStore").finish_non_exhaustive()
    }
}

impl KubeStore {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn namespaced<K>(&self, namespace: &str) -> Api<K>
    where
        K: kube::Resource<Scope = k8s_openapi::NamespaceResourceScope>,
        <K as kube::Resource>::DynamicType: Default,
    {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn apply_params() -> PatchParams {
        PatchParams::apply(FIELD_MANAGER).force()
    }
}

/// Treat 404 as absence
fn not_found_as_none<T>(result: Result<T, kube::Error>) -> Result<Option<T>, kube::Error> {
    match result {
        Ok(obj) => Ok(Some(obj)),
        Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(None),
        Err(e) => Err(e),
    }
}

async fn get_opt<K>(api: &Api<K>, name: &str) -> Result<Option<K>, kube::Error>
where
    K: Clone + DeserializeOwned + std::fmt::Debug,
{
    not_found_as_none(api.get(name).await)
}

fn status_patch<S: serde::Serialize>(status: &S, resource_version: Option<String>) -> serde_json::Value {
    // A resourceVersion in a merge patch makes the write conditional, so a
    // concurrent update surfaces as a 409
    match resource_version {
        Some(rv) => json!({ "metadata": { "resourceVersion": rv }, "status": status }),
        None => json!({ "status": status }),
    }
}

#[async_trait]
impl ObjectStore for KubeStore {
    async fn get_steam_server(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<SteamServer>, kube::Error> {
        get_opt(&self.namespaced::<SteamServer>(namespace), name).await
    }

    async fn list_steam_servers(&self) -> Result<Vec<SteamServer>, kube::Error> {
        let api: Api<SteamServer> = Api::all(self.client.clone());
        Ok(api.list(&ListParams::default()).await?.items)
    }

    async fn get_game_definition(&self, name: &str) -> Result<Option<GameDefinition>, kube::Error> {
        let api: Api<GameDefinition> = Api::all(self.client.clone());
        get_opt(&api, name).await
    }

    async fn set_steam_server_finalizers(
        &self,
        namespace: &str,
        name: &str,
        finalizers: Vec<String>,
    ) -> Result<(), kube::Error> {
        let patch = json!({ "metadata": { "finalizers": finalizers } });
        self.namespaced::<SteamServer>(namespace)
            .patch(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
        Ok(())
    }

    async fn patch_steam_server_status(
        &self,
        namespace: &str,
        name: &str,
        resource_version: Option<String>,
        status: &SteamServerStatus,
    ) -> Result<(), kube::Error> {
        let patch = status_patch(status, resource_version);
        self.namespaced::<SteamServer>(namespace)
            .patch_status(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
        Ok(())
    }

    async fn patch_game_definition_status(
        &self,
        name: &str,
        resource_version: Option<String>,
        status: &GameDefinitionStatus,
    ) -> Result<(), kube::Error> {
        let api: Api<GameDefinition> = Api::all(self.client.clone());
        let patch = status_patch(status, resource_version);
        api.patch_status(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
        Ok(())
    }

    async fn get_artifact_meta(
        &self,
        kind: ArtifactKind,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ObjectMeta>, kube::Error> {
        let meta = match kind {
            ArtifactKind::ConfigMap => get_opt(&self.namespaced::<ConfigMap>(namespace), name)
                .await?
                .map(|o| o.metadata),
            ArtifactKind::PersistentVolumeClaim => {
                get_opt(&self.namespaced::<PersistentVolumeClaim>(namespace), name)
                    .await?
                    .map(|o| o.metadata)
            }
            ArtifactKind::StatefulSet => get_opt(&self.namespaced::<StatefulSet>(namespace), name)
                .await?
                .map(|o| o.metadata),
            ArtifactKind::Service => get_opt(&self.namespaced::<Service>(namespace), name)
                .await?
                .map(|o| o.metadata),
        };
        Ok(meta)
    }

    async fn get_stateful_set(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<StatefulSet>, kube::Error> {
        get_opt(&self.namespaced::<StatefulSet>(namespace), name).await
    }

    async fn get_service(&self, namespace: &str, name: &str) -> Result<Option<Service>, kube::Error> {
        get_opt(&self.namespaced::<Service>(namespace), name).await
    }

    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Option<Pod>, kube::Error> {
        get_opt(&self.namespaced::<Pod>(namespace), name).await
    }

    async fn apply_artifact(&self, namespace: &str, artifact: &Artifact) -> Result<(), kube::Error> {
        let pp = Self::apply_params();
        let name = artifact.name();
        match artifact {
            Artifact::ConfigMap(o) => {
                self.namespaced::<ConfigMap>(namespace)
                    .patch(name, &pp, &Patch::Apply(o))
                    .await?;
            }
            Artifact::PersistentVolumeClaim(o) => {
                self.namespaced::<PersistentVolumeClaim>(namespace)
                    .patch(name, &pp, &Patch::Apply(o))
                    .await?;
            }
            Artifact::StatefulSet(o) => {
                self.namespaced::<StatefulSet>(namespace)
                    .patch(name, &pp, &Patch::Apply(o))
                    .await?;
            }
            Artifact::Service(o) => {
                self.namespaced::<Service>(namespace)
                    .patch(name, &pp, &Patch::Apply(o))
                    .await?;
            }
        }
        Ok(())
    }

    async fn merge_labels(
        &self,
        kind: ArtifactKind,
        namespace: &str,
        name: &str,
        labels: BTreeMap<String, String>,
    ) -> Result<(), kube::Error> {
        let patch = json!({ "metadata": { "labels": labels } });
        let pp = PatchParams::default();
        let patch = Patch::Merge(&patch);
        match kind {
            ArtifactKind::ConfigMap => {
                self.namespaced::<ConfigMap>(namespace).patch(name, &pp, &patch).await?;
            }
            ArtifactKind::PersistentVolumeClaim => {
                self.namespaced::<PersistentVolumeClaim>(namespace)
                    .patch(name, &pp, &patch)
                    .await?;
            }
            ArtifactKind::StatefulSet => {
                self.namespaced::<StatefulSet>(namespace).patch(name, &pp, &patch).await?;
            }
            ArtifactKind::Service => {
                self.namespaced::<Service>(namespace).patch(name, &pp, &patch).await?;
            }
        }
        Ok(())
    }
}
