//! # GameDefinition Validation

use anyhow::Result;

use crate::crd::{GameDefinitionSpec, MappingKind};

/// Validate a GameDefinition spec
///
/// Checks, stopping at the first violation:
/// - `appId` is positive
/// - `command` is set
/// - at least one port, each with a name and a port in 1..=65535
/// - every `configSchema[*].mapTo.type` is `arg`, `env` or `configFile`
/// - `env` mappings name a variable, `configFile` mappings name a path
pub fn validate_game_definition(spec: &GameDefinitionSpec) -> Result<()> {
    if spec.app_id <= 0 {
        return Err(anyhow::anyhow!("appId must be a positive integer"));
    }

    if spec.command.trim().is_empty() {
        return Err(anyhow::anyhow!("command is required"));
    }

    if spec.ports.is_empty() {
        return Err(anyhow::anyhow!("at least one port is required"));
    }
    for (i, port) in spec.ports.iter().enumerate() {
        if port.name.trim().is_empty() {
            return Err(anyhow::anyhow!("port[{i}].name is required"));
        }
        if !(1..=65535).contains(&port.container_port) {
            return Err(anyhow::anyhow!(
                "port[{i}].containerPort must be between 1 and 65535"
            ));
        }
    }

    for (key, entry) in &spec.config_schema {
        let Some(mapping) = &entry.map_to else {
            continue;
        };
        match mapping.kind() {
            None => {
                return Err(anyhow::anyhow!(
                    "configSchema[{key}].mapTo.type must be 'arg', 'env', or 'configFile'"
                ));
            }
            Some(MappingKind::Env) if mapping.value.trim().is_empty() => {
                return Err(anyhow::anyhow!(
                    "configSchema[{key}].mapTo.value is required for env mappings"
                ));
            }
            Some(MappingKind::ConfigFile) if mapping.path.trim().is_empty() => {
                return Err(anyhow::anyhow!(
                    "configSchema[{key}].mapTo.path is required for configFile mappings"
                ));
            }
            Some(_) => {}
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn spec(overrides: serde_json::Value) -> GameDefinitionSpec {
        let mut base = json!({
            "appId": 896_660,
            "command": "./valheim_server.x86_64",
            "ports": [{"name": "game", "containerPort": 2456}]
        });
        if let (Some(b), Some(o)) = (base.as_object_mut(), overrides.as_object()) {
            b.extend(o.clone());
        }
        serde_json::from_value(base).unwrap()
    }

    fn message(overrides: serde_json::Value) -> String {
        validate_game_definition(&spec(overrides))
            .unwrap_err()
            .to_string()
    }

    #[test]
    fn test_valid_definition() {
        assert!(validate_game_definition(&spec(json!({}))).is_ok());
    }

    #[test]
    fn test_app_id_and_command() {
        assert_eq!(message(json!({"appId": 0})), "appId must be a positive integer");
        assert_eq!(message(json!({"command": " "})), "command is required");
    }

    #[test]
    fn test_port_checks() {
        assert_eq!(message(json!({"ports": []})), "at least one port is required");
        assert_eq!(
            message(json!({"ports": [{"name": "game", "containerPort": 2456}, {"name": "", "containerPort": 2457}]})),
            "port[1].name is required"
        );
        assert_eq!(
            message(json!({"ports": [{"name": "game", "containerPort": 70000}]})),
            "port[0].containerPort must be between 1 and 65535"
        );
    }

    #[test]
    fn test_mapping_type() {
        assert_eq!(
            message(json!({"configSchema": {"mode": {"mapTo": {"type": "flag"}}}})),
            "configSchema[mode].mapTo.type must be 'arg', 'env', or 'configFile'"
        );
        assert!(validate_game_definition(&spec(json!({
            "configSchema": {"mode": {"mapTo": {"type": "env", "value": "MODE"}}}
        })))
        .is_ok());
    }

    #[test]
    fn test_mapping_targets_are_required() {
        assert_eq!(
            message(json!({"configSchema": {"public": {"mapTo": {"type": "env"}}}})),
            "configSchema[public].mapTo.value is required for env mappings"
        );
        assert_eq!(
            message(json!({"configSchema": {"motd": {"mapTo": {"type": "configFile", "template": "x"}}}})),
            "configSchema[motd].mapTo.path is required for configFile mappings"
        );
        // arg mappings without a flag pass the value positionally
        assert!(validate_game_definition(&spec(json!({
            "configSchema": {"mode": {"mapTo": {"type": "arg"}}}
        })))
        .is_ok());
    }
}
