//! # Config Resolver
//!
//! Merges schema defaults with user-supplied config values.
//!
//! Secret-backed values never appear as literals. Each one becomes an
//! environment variable sourced from the Secret (`CONFIG_<KEY>`), and the
//! resolved value is the shell-style reference `$(CONFIG_<KEY>)` which the
//! kubelet expands in container args.

use std::collections::BTreeMap;
use thiserror::Error;

use crate::constants::CONFIG_ENV_PREFIX;
use crate::crd::{ConfigSchemaEntry, ConfigValue, EnvVar, SecretKeySelector};

/// A secret-backed config value realised as an environment variable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretBinding {
    /// Config key the binding was created for
    pub key: String,
    /// Environment variable name
    pub env_name: String,
    pub selector: SecretKeySelector,
}

impl SecretBinding {
    #[must_use]
    pub fn to_env_var(&self) -> EnvVar {
        EnvVar::from_secret(self.env_name.clone(), self.selector.clone())
    }
}

/// Final config values for one SteamServer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub values: BTreeMap<String, String>,
    pub secret_bindings: Vec<SecretBinding>,
}

impl ResolvedConfig {
    /// Secret selector backing `key`, if the value came from a Secret
    #[must_use]
    pub fn secret_for(&self, key: &str) -> Option<&SecretKeySelector> {
        self.secret_bindings
            .iter()
            .find(|b| b.key == key)
            .map(|b| &b.selector)
    }

    /// Environment entries realising the secret bindings
    #[must_use]
    pub fn secret_env(&self) -> Vec<EnvVar> {
        self.secret_bindings
            .iter()
            .map(SecretBinding::to_env_var)
            .collect()
    }
}

/// Config validation failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("required config key {0:?} not provided")]
    MissingRequired(String),
    #[error("required config key {0:?} has empty value")]
    EmptyRequired(String),
    #[error("unknown config key {0:?}")]
    UnknownKey(String),
    #[error("config key {key:?} value {value:?} not in allowed values [{}]", .allowed.join(" "))]
    NotInEnum {
        key: String,
        value: String,
        allowed: Vec<String>,
    },
}

/// Environment variable name for a secret-backed config key
///
/// `server-password` becomes `CONFIG_SERVER_PASSWORD`.
#[must_use]
pub fn binding_name(key: &str) -> String {
    format!("{CONFIG_ENV_PREFIX}{}", key.replace('-', "_").to_uppercase())
}

/// Resolve user config against a schema
///
/// Schema defaults seed the map (empty defaults are skipped), then user values
/// overwrite them. Keys are visited in sorted order so the binding list is
/// stable across calls.
#[must_use]
pub fn resolve(
    config: &BTreeMap<String, ConfigValue>,
    schema: &BTreeMap<String, ConfigSchemaEntry>,
) -> ResolvedConfig {
    let mut values: BTreeMap<String, String> = schema
        .iter()
        .filter(|(_, entry)| !entry.default.is_empty())
        .map(|(key, entry)| (key.clone(), entry.default.clone()))
        .collect();
    let mut secret_bindings = Vec::new();

    for (key, value) in config {
        match value {
            ConfigValue::Secret(selector) => {
                let env_name = binding_name(key);
                values.insert(key.clone(), format!("$({env_name})"));
                secret_bindings.push(SecretBinding {
                    key: key.clone(),
                    env_name,
                    selector: selector.clone(),
                });
            }
            ConfigValue::Literal(literal) => {
                values.insert(key.clone(), literal.clone());
            }
        }
    }

    ResolvedConfig {
        values,
        secret_bindings,
    }
}

/// Validate user config against a schema
///
/// Checks required keys, then unknown keys, then enum membership. Secret-backed
/// values are not checked against `enum` since their content is not known here.
///
/// # Errors
///
/// Returns the first violation found.
pub fn validate_config(
    config: &BTreeMap<String, ConfigValue>,
    schema: &BTreeMap<String, ConfigSchemaEntry>,
) -> Result<(), ConfigError> {
    for (key, entry) in schema.iter().filter(|(_, e)| e.required) {
        match config.get(key) {
            None => return Err(ConfigError::MissingRequired(key.clone())),
            Some(ConfigValue::Literal(v)) if v.is_empty() => {
                return Err(ConfigError::EmptyRequired(key.clone()));
            }
            Some(_) => {}
        }
    }

    if let Some(key) = config.keys().find(|k| !schema.contains_key(*k)) {
        return Err(ConfigError::UnknownKey(key.clone()));
    }

    for (key, value) in config {
        let Some(entry) = schema.get(key) else {
            continue;
        };
        let Some(literal) = value.as_literal() else {
            continue;
        };
        if !entry.r#enum.is_empty()
            && !literal.is_empty()
            && !entry.r#enum.iter().any(|a| a == literal)
        {
            return Err(ConfigError::NotInEnum {
                key: key.clone(),
                value: literal.to_string(),
                allowed: entry.r#enum.clone(),
            });
        }
    }

    Ok(())
}
