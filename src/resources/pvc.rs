//! Game file storage claim.

use k8s_openapi::api::core::v1::{
    PersistentVolumeClaim, PersistentVolumeClaimSpec, VolumeResourceRequirements,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use kube::ResourceExt;
use std::collections::BTreeMap;

use crate::crd::SteamServer;
use crate::resources::labels::{artifact_metadata, pvc_name};
use crate::resources::merge::StoragePlan;

#[must_use]
pub fn build_pvc(server: &SteamServer, storage: &StoragePlan) -> PersistentVolumeClaim {
    PersistentVolumeClaim {
        metadata: artifact_metadata(server, pvc_name(&server.name_any())),
        spec: Some(PersistentVolumeClaimSpec {
            access_modes: Some(vec!["ReadWriteOnce".to_string()]),
            resources: Some(VolumeResourceRequirements {
                requests: Some(BTreeMap::from([(
                    "storage".to_string(),
                    Quantity(storage.size.clone()),
                )])),
                ..Default::default()
            }),
            storage_class_name: storage.storage_class_name.clone(),
            ..Default::default()
        }),
        ..Default::default()
    }
}
