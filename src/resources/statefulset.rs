//! # Game Server Workload
//!
//! Single-replica StatefulSet with a `steamcmd` init container that installs
//! or updates the game files and a `gameserver` container that runs them.

use k8s_openapi::api::apps::v1::{StatefulSet, StatefulSetSpec};
use k8s_openapi::api::core::v1::{
    ConfigMapVolumeSource, Container, ContainerPort, EmptyDirVolumeSource,
    PersistentVolumeClaimVolumeSource, PodSpec, PodTemplateSpec, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use kube::ResourceExt;

use crate::constants::{
    CONFIG_FILES_VOLUME, GAME_SERVER_CONTAINER_NAME, INIT_CONTAINER_NAME, SERVER_FILES_MOUNT_PATH,
    SERVER_FILES_VOLUME,
};
use crate::crd::{EnvVar, SteamServer};
use crate::resources::configmap::config_key;
use crate::resources::labels::{
    artifact_metadata, config_map_name, identity_labels, pvc_name, workload_name,
};
use crate::resources::merge::MergedSpec;

/// Build the workload
///
/// `has_bundle` controls whether the config file volume and its mounts are added.
#[must_use]
pub fn build_stateful_set(server: &SteamServer, merged: &MergedSpec, has_bundle: bool) -> StatefulSet {
    let name = server.name_any();
    let labels = identity_labels(&name, &server.spec.game_definition);

    StatefulSet {
        metadata: artifact_metadata(server, workload_name(&name)),
        spec: Some(StatefulSetSpec {
            replicas: Some(1),
            service_name: workload_name(&name).into(),
            selector: LabelSelector {
                match_labels: Some(labels.clone()),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    init_containers: Some(vec![init_container(merged)]),
                    containers: vec![game_container(merged, has_bundle)],
                    volumes: Some(volumes(&name, merged, has_bundle)),
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn server_files_mount() -> VolumeMount {
    VolumeMount {
        name: SERVER_FILES_VOLUME.to_string(),
        mount_path: SERVER_FILES_MOUNT_PATH.to_string(),
        ..Default::default()
    }
}

fn to_k8s_env(env: &[EnvVar]) -> Vec<k8s_openapi::api::core::v1::EnvVar> {
    env.iter().map(EnvVar::to_k8s).collect()
}

fn init_container(merged: &MergedSpec) -> Container {
    Container {
        name: INIT_CONTAINER_NAME.to_string(),
        image: Some(merged.image.clone()),
        command: Some(vec!["steamcmd".to_string()]),
        args: Some(merged.install.args()),
        env: Some(to_k8s_env(&merged.install.env())),
        volume_mounts: Some(vec![server_files_mount()]),
        ..Default::default()
    }
}

fn game_container(merged: &MergedSpec, has_bundle: bool) -> Container {
    let ports = merged
        .ports
        .iter()
        .map(|p| ContainerPort {
            name: Some(p.name.clone()),
            container_port: p.container_port,
            protocol: Some(p.protocol.as_str().to_string()),
            ..Default::default()
        })
        .collect();

    let mut mounts = vec![server_files_mount()];
    if has_bundle {
        mounts.extend(merged.config_files.iter().enumerate().map(|(i, f)| VolumeMount {
            name: CONFIG_FILES_VOLUME.to_string(),
            mount_path: f.path.clone(),
            sub_path: Some(config_key(i)),
            read_only: Some(true),
            ..Default::default()
        }));
    }

    let resources = (!merged.resources.is_empty()).then(|| merged.resources.to_k8s());

    Container {
        name: GAME_SERVER_CONTAINER_NAME.to_string(),
        image: Some(merged.image.clone()),
        command: (!merged.command.is_empty()).then(|| merged.command.clone()),
        args: (!merged.args.is_empty()).then(|| merged.args.clone()),
        ports: Some(ports),
        env: (!merged.env.is_empty()).then(|| to_k8s_env(&merged.env)),
        resources,
        volume_mounts: Some(mounts),
        readiness_probe: merged
            .health_check
            .as_ref()
            .and_then(|h| h.to_readiness_probe()),
        ..Default::default()
    }
}

fn volumes(name: &str, merged: &MergedSpec, has_bundle: bool) -> Vec<Volume> {
    let server_files = match merged.storage {
        Some(_) => Volume {
            name: SERVER_FILES_VOLUME.to_string(),
            persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
                claim_name: pvc_name(name),
                ..Default::default()
            }),
            ..Default::default()
        },
        None => Volume {
            name: SERVER_FILES_VOLUME.to_string(),
            empty_dir: Some(EmptyDirVolumeSource::default()),
            ..Default::default()
        },
    };

    let mut volumes = vec![server_files];
    if has_bundle {
        volumes.push(Volume {
            name: CONFIG_FILES_VOLUME.to_string(),
            config_map: Some(ConfigMapVolumeSource {
                name: config_map_name(name).into(),
                ..Default::default()
            }),
            ..Default::default()
        });
    }
    volumes
}
