//! # Config Mappings
//!
//! Applies `configSchema[*].mapTo` rules to the resolved config.

use std::collections::BTreeMap;

use crate::crd::{ConfigFile, ConfigSchemaEntry, EnvVar, MappingKind};
use crate::resolver::{Interpolator, ResolvedConfig, TemplateError};

/// Container additions produced by mapping rules
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappedConfig {
    pub args: Vec<String>,
    pub env: Vec<EnvVar>,
    pub files: Vec<ConfigFile>,
}

/// Apply every mapping rule whose key has a resolved value
///
/// Keys are visited in sorted order.
///
/// # Errors
///
/// Returns `TemplateError` if a `configFile` template fails to render.
pub fn apply_mappings(
    schema: &BTreeMap<String, ConfigSchemaEntry>,
    resolved: &ResolvedConfig,
    interpolator: &Interpolator,
) -> Result<MappedConfig, TemplateError> {
    let mut mapped = MappedConfig::default();

    for (key, entry) in schema {
        let Some(rule) = entry.map_to.as_ref() else {
            continue;
        };
        let Some(value) = resolved.values.get(key) else {
            continue;
        };

        match rule.kind() {
            Some(MappingKind::Arg) => {
                if rule.condition.is_empty() {
                    if !rule.value.is_empty() {
                        mapped.args.push(rule.value.clone());
                    }
                    mapped.args.push(value.clone());
                } else if *value == rule.condition && !rule.value.is_empty() {
                    mapped.args.push(rule.value.clone());
                }
            }
            Some(MappingKind::Env) => {
                let env = match resolved.secret_for(key) {
                    Some(selector) => EnvVar::from_secret(rule.value.clone(), selector.clone()),
                    None => EnvVar::literal(rule.value.clone(), value.clone()),
                };
                mapped.env.push(env);
            }
            Some(MappingKind::ConfigFile) => {
                let content = interpolator.interpolate_one(&rule.template, &resolved.values)?;
                mapped.files.push(ConfigFile {
                    path: rule.path.clone(),
                    content,
                });
            }
            // Rejected by GameDefinition validation
            None => {}
        }
    }

    Ok(mapped)
}
