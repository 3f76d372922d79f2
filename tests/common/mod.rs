//! Shared fixtures for integration tests
//!
//! `InMemoryStore` is a small stand-in for the cluster: it keeps objects in
//! maps, bumps resource versions on writes and records every write so tests
//! can assert how many API calls a pass made.

#![allow(dead_code, reason = "each test binary uses a different subset")]

use async_trait::async_trait;
use boilerr_controller::controller::reconciler::ObjectStore;
use boilerr_controller::crd::{
    GameDefinition, GameDefinitionSpec, GameDefinitionStatus, SteamServer, SteamServerSpec,
    SteamServerStatus,
};
use boilerr_controller::resources::{Artifact, ArtifactKind};
use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::core::v1::{Pod, Service};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

pub const VALHEIM: &str = r#"
apiVersion: boilerr.dev/v1alpha1
kind: GameDefinition
metadata:
  name: valheim
spec:
  appId: 896660
  command: /data/server/valheim_server.x86_64
  args:
    - -name
    - "{{.Config.serverName}}"
    - -world
    - "{{.Config.worldName}}"
    - -password
    - "{{.Config.password}}"
  ports:
    - name: game
      containerPort: 2456
    - name: query
      containerPort: 2457
  configSchema:
    serverName:
      required: true
    worldName:
      default: Dedicated
    password:
      secret: true
    crossplay:
      default: "false"
      enum: ["true", "false"]
      mapTo:
        type: arg
        value: -crossplay
        condition: "true"
    public:
      default: "1"
      mapTo:
        type: env
        value: SERVER_PUBLIC
  defaultStorage: 30Gi
"#;

pub fn valheim() -> GameDefinition {
    serde_yaml::from_str(VALHEIM).expect("fixture is valid")
}

pub fn ready(mut definition: GameDefinition) -> GameDefinition {
    definition.status = Some(GameDefinitionStatus {
        ready: true,
        message: "GameDefinition validated successfully".into(),
        conditions: Vec::new(),
    });
    definition
}

pub fn valheim_spec() -> GameDefinitionSpec {
    valheim().spec
}

pub fn steam_server(namespace: &str, name: &str, spec: serde_json::Value) -> SteamServer {
    let spec: SteamServerSpec = serde_json::from_value(spec).expect("fixture is valid");
    let mut server = SteamServer::new(name, spec);
    server.metadata.namespace = Some(namespace.into());
    server.metadata.resource_version = Some("1".into());
    server
}

type Key = (String, String);

fn key(namespace: &str, name: &str) -> Key {
    (namespace.to_string(), name.to_string())
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    servers: Mutex<HashMap<Key, SteamServer>>,
    definitions: Mutex<HashMap<String, GameDefinition>>,
    artifacts: Mutex<HashMap<(ArtifactKind, String, String), Artifact>>,
    pods: Mutex<HashMap<Key, Pod>>,
    writes: Mutex<Vec<String>>,
    next_version: Mutex<u64>,
}

impl InMemoryStore {
    pub fn with(servers: Vec<SteamServer>, definitions: Vec<GameDefinition>) -> Self {
        let store = Self::default();
        for s in servers {
            store.put_server(s);
        }
        for d in definitions {
            store.put_definition(d);
        }
        *store.next_version.lock().unwrap() = 100;
        store
    }

    pub fn put_server(&self, server: SteamServer) {
        let k = key(
            server.metadata.namespace.as_deref().unwrap_or_default(),
            server.metadata.name.as_deref().unwrap_or_default(),
        );
        self.servers.lock().unwrap().insert(k, server);
    }

    pub fn put_definition(&self, definition: GameDefinition) {
        let name = definition.metadata.name.clone().unwrap_or_default();
        self.definitions.lock().unwrap().insert(name, definition);
    }

    pub fn put_pod(&self, namespace: &str, pod: Pod) {
        let name = pod.metadata.name.clone().unwrap_or_default();
        self.pods.lock().unwrap().insert(key(namespace, &name), pod);
    }

    pub fn server(&self, namespace: &str, name: &str) -> SteamServer {
        self.servers.lock().unwrap()[&key(namespace, name)].clone()
    }

    pub fn definition(&self, name: &str) -> GameDefinition {
        self.definitions.lock().unwrap()[name].clone()
    }

    pub fn artifact(&self, kind: ArtifactKind, namespace: &str, name: &str) -> Option<Artifact> {
        self.artifacts
            .lock()
            .unwrap()
            .get(&(kind, namespace.to_string(), name.to_string()))
            .cloned()
    }

    pub fn artifact_count(&self) -> usize {
        self.artifacts.lock().unwrap().len()
    }

    /// Simulate the workload controller filling in StatefulSet status
    pub fn set_workload_replicas(&self, namespace: &str, name: &str, replicas: i32, ready: i32) {
        let mut artifacts = self.artifacts.lock().unwrap();
        if let Some(Artifact::StatefulSet(sts)) =
            artifacts.get_mut(&(ArtifactKind::StatefulSet, namespace.to_string(), name.to_string()))
        {
            sts.status = Some(
                serde_json::from_value(serde_json::json!({
                    "replicas": replicas,
                    "readyReplicas": ready
                }))
                .unwrap(),
            );
        }
    }

    /// Simulate a cloud load balancer assigning an address
    pub fn set_load_balancer_ip(&self, namespace: &str, name: &str, ip: &str) {
        let mut artifacts = self.artifacts.lock().unwrap();
        if let Some(Artifact::Service(svc)) =
            artifacts.get_mut(&(ArtifactKind::Service, namespace.to_string(), name.to_string()))
        {
            svc.status = Some(
                serde_json::from_value(serde_json::json!({
                    "loadBalancer": {"ingress": [{"ip": ip}]}
                }))
                .unwrap(),
            );
        }
    }

    pub fn writes(&self) -> Vec<String> {
        self.writes.lock().unwrap().clone()
    }

    pub fn clear_writes(&self) {
        self.writes.lock().unwrap().clear();
    }

    fn record(&self, what: String) {
        self.writes.lock().unwrap().push(what);
    }

    fn bump(&self) -> String {
        let mut v = self.next_version.lock().unwrap();
        *v += 1;
        v.to_string()
    }
}

fn conflict() -> kube::Error {
    kube::Error::Service("409 Conflict: the object has been modified".into())
}

#[async_trait]
impl ObjectStore for InMemoryStore {
    async fn get_steam_server(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<SteamServer>, kube::Error> {
        Ok(self.servers.lock().unwrap().get(&key(namespace, name)).cloned())
    }

    async fn list_steam_servers(&self) -> Result<Vec<SteamServer>, kube::Error> {
        Ok(self.servers.lock().unwrap().values().cloned().collect())
    }

    async fn get_game_definition(&self, name: &str) -> Result<Option<GameDefinition>, kube::Error> {
        Ok(self.definitions.lock().unwrap().get(name).cloned())
    }

    async fn set_steam_server_finalizers(
        &self,
        namespace: &str,
        name: &str,
        finalizers: Vec<String>,
    ) -> Result<(), kube::Error> {
        let version = self.bump();
        let mut servers = self.servers.lock().unwrap();
        if let Some(server) = servers.get_mut(&key(namespace, name)) {
            server.metadata.finalizers = Some(finalizers);
            server.metadata.resource_version = Some(version);
        }
        drop(servers);
        self.record(format!("finalizers {namespace}/{name}"));
        Ok(())
    }

    async fn patch_steam_server_status(
        &self,
        namespace: &str,
        name: &str,
        resource_version: Option<String>,
        status: &SteamServerStatus,
    ) -> Result<(), kube::Error> {
        let version = self.bump();
        let mut servers = self.servers.lock().unwrap();
        let Some(server) = servers.get_mut(&key(namespace, name)) else {
            return Err(kube::Error::Service("404 not found".into()));
        };
        if resource_version.is_some() && resource_version != server.metadata.resource_version {
            return Err(conflict());
        }
        server.status = Some(status.clone());
        server.metadata.resource_version = Some(version);
        drop(servers);
        self.record(format!("status {namespace}/{name}"));
        Ok(())
    }

    async fn patch_game_definition_status(
        &self,
        name: &str,
        _resource_version: Option<String>,
        status: &GameDefinitionStatus,
    ) -> Result<(), kube::Error> {
        let version = self.bump();
        if let Some(d) = self.definitions.lock().unwrap().get_mut(name) {
            d.status = Some(status.clone());
            d.metadata.resource_version = Some(version);
        }
        self.record(format!("status {name}"));
        Ok(())
    }

    async fn get_artifact_meta(
        &self,
        kind: ArtifactKind,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ObjectMeta>, kube::Error> {
        Ok(self.artifact(kind, namespace, name).map(|a| a.metadata().clone()))
    }

    async fn get_stateful_set(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<StatefulSet>, kube::Error> {
        Ok(match self.artifact(ArtifactKind::StatefulSet, namespace, name) {
            Some(Artifact::StatefulSet(sts)) => Some(sts),
            _ => None,
        })
    }

    async fn get_service(&self, namespace: &str, name: &str) -> Result<Option<Service>, kube::Error> {
        Ok(match self.artifact(ArtifactKind::Service, namespace, name) {
            Some(Artifact::Service(svc)) => Some(svc),
            _ => None,
        })
    }

    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Option<Pod>, kube::Error> {
        Ok(self.pods.lock().unwrap().get(&key(namespace, name)).cloned())
    }

    async fn apply_artifact(&self, namespace: &str, artifact: &Artifact) -> Result<(), kube::Error> {
        let kind = artifact.kind();
        let name = artifact.name().to_string();
        let mut incoming = artifact.clone();
        let mut artifacts = self.artifacts.lock().unwrap();
        let slot = (kind, namespace.to_string(), name.clone());

        // Status is owned by other controllers and survives an apply
        match (artifacts.get(&slot), &mut incoming) {
            (Some(Artifact::StatefulSet(old)), Artifact::StatefulSet(new)) => {
                new.status.clone_from(&old.status);
            }
            (Some(Artifact::Service(old)), Artifact::Service(new)) => {
                new.status.clone_from(&old.status);
            }
            _ => {}
        }
        artifacts.insert(slot, incoming);
        drop(artifacts);
        self.record(format!("apply {kind} {namespace}/{name}"));
        Ok(())
    }

    async fn merge_labels(
        &self,
        kind: ArtifactKind,
        namespace: &str,
        name: &str,
        labels: BTreeMap<String, String>,
    ) -> Result<(), kube::Error> {
        let mut artifacts = self.artifacts.lock().unwrap();
        if let Some(Artifact::PersistentVolumeClaim(pvc)) =
            artifacts.get_mut(&(kind, namespace.to_string(), name.to_string()))
        {
            pvc.metadata
                .labels
                .get_or_insert_with(Default::default)
                .extend(labels);
        }
        drop(artifacts);
        self.record(format!("labels {kind} {namespace}/{name}"));
        Ok(())
    }
}
