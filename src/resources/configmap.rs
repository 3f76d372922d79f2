//! Config file bundle.

use k8s_openapi::api::core::v1::ConfigMap;
use kube::ResourceExt;
use std::collections::BTreeMap;

use crate::crd::{ConfigFile, SteamServer};
use crate::resources::labels::{artifact_metadata, config_map_name};

/// Data key for the config file at `index`
#[must_use]
pub fn config_key(index: usize) -> String {
    format!("config-{index}")
}

/// Build the bundle, or `None` when there are no files
#[must_use]
pub fn build_config_map(server: &SteamServer, files: &[ConfigFile]) -> Option<ConfigMap> {
    if files.is_empty() {
        return None;
    }

    let data: BTreeMap<String, String> = files
        .iter()
        .enumerate()
        .map(|(i, f)| (config_key(i), f.content.clone()))
        .collect();

    Some(ConfigMap {
        metadata: artifact_metadata(server, config_map_name(&server.name_any())),
        data: Some(data),
        ..Default::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::SteamServerSpec;

    #[test]
    fn test_keys_follow_position() {
        let server = SteamServer::new(
            "vikings",
            serde_json::from_value::<SteamServerSpec>(serde_json::json!({"gameDefinition": "valheim"}))
                .unwrap(),
        );
        let files = vec![
            ConfigFile {
                path: "/a.cfg".into(),
                content: "a".into(),
            },
            ConfigFile {
                path: "/b.cfg".into(),
                content: "b".into(),
            },
        ];
        let cm = build_config_map(&server, &files).unwrap();
        assert_eq!(cm.metadata.name.as_deref(), Some("vikings-config"));
        let data = cm.data.unwrap();
        assert_eq!(data["config-0"], "a");
        assert_eq!(data["config-1"], "b");

        assert!(build_config_map(&server, &[]).is_none());
    }
}
