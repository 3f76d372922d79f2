//! # Merged Server Spec
//!
//! Field-level precedence between a SteamServer and its GameDefinition.
//!
//! | field            | precedence                                  |
//! |------------------|---------------------------------------------|
//! | image            | server, definition, built-in default        |
//! | install dir      | definition, `/serverfiles`                  |
//! | app id           | server, definition                          |
//! | command          | server, `[definition.command]`              |
//! | args             | server, definition (rendered) + mapped args |
//! | ports            | server, definition                          |
//! | env              | definition ∪ mapped ∪ server ∪ secrets      |
//! | resources        | server, definition                          |
//! | storage size     | server, definition, `20Gi`                  |
//! | config files     | server, definition (rendered) + mapped      |

use regex::Regex;
use std::sync::LazyLock;

use crate::constants::{DEFAULT_IMAGE, DEFAULT_STORAGE_SIZE, SERVER_FILES_MOUNT_PATH};
use crate::crd::{
    ConfigFile, EnvVar, GameDefinitionSpec, HealthCheckSpec, ResourceRequirements, ServerPort,
    ServiceType, SteamServerSpec,
};
use crate::resolver::{Interpolator, ResolvedConfig, TemplateError};
use crate::resources::env::merge_env;
use crate::resources::mapping::apply_mappings;
use crate::resources::steamcmd::InstallCommand;

/// Numeric prefix of a resource quantity
static QUANTITY_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([+-]?(?:[0-9]+\.?[0-9]*|\.[0-9]+))")
        .expect("quantity regex is hardcoded and valid")
});

/// Storage claim parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoragePlan {
    pub size: String,
    pub storage_class_name: Option<String>,
}

/// Everything needed to build the four artifacts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedSpec {
    pub image: String,
    pub install: InstallCommand,
    pub command: Vec<String>,
    pub args: Vec<String>,
    pub ports: Vec<ServerPort>,
    pub env: Vec<EnvVar>,
    pub resources: ResourceRequirements,
    /// `None` when the resolved size is zero
    pub storage: Option<StoragePlan>,
    pub config_files: Vec<ConfigFile>,
    pub service_type: ServiceType,
    pub health_check: Option<HealthCheckSpec>,
}

/// Merge a server spec over its definition
///
/// # Errors
///
/// Returns `TemplateError` if an argument or config file template fails to render.
pub fn merge_spec(
    server: &SteamServerSpec,
    definition: &GameDefinitionSpec,
    resolved: &ResolvedConfig,
    interpolator: &Interpolator,
) -> Result<MergedSpec, TemplateError> {
    let mapped = apply_mappings(&definition.config_schema, resolved, interpolator)?;

    let arg_templates = if server.args.is_empty() {
        &definition.args
    } else {
        &server.args
    };
    let mut args = interpolator.interpolate_list(arg_templates, &resolved.values)?;
    args.extend(mapped.args);

    let file_templates = if server.config_files.is_empty() {
        &definition.config_files
    } else {
        &server.config_files
    };
    let mut config_files = file_templates
        .iter()
        .map(|f| {
            Ok(ConfigFile {
                path: f.path.clone(),
                content: interpolator.interpolate_one(&f.content, &resolved.values)?,
            })
        })
        .collect::<Result<Vec<_>, TemplateError>>()?;
    config_files.extend(mapped.files);

    let secret_env = resolved.secret_env();
    let env = merge_env(&[
        definition.env.as_slice(),
        mapped.env.as_slice(),
        server.env.as_slice(),
        secret_env.as_slice(),
    ]);

    Ok(MergedSpec {
        image: resolve_image(server, definition),
        install: InstallCommand {
            app_id: server.app_id.unwrap_or(definition.app_id),
            install_dir: non_empty(&definition.install_dir)
                .unwrap_or(SERVER_FILES_MOUNT_PATH)
                .to_string(),
            anonymous: server.anonymous,
            beta: server.beta.clone(),
            beta_password: server.beta_password.clone(),
            validate: server.validate,
            credentials_secret: server.steam_credentials_secret.clone(),
        },
        command: if server.command.is_empty() {
            non_empty(&definition.command)
                .map(|c| vec![c.to_string()])
                .unwrap_or_default()
        } else {
            server.command.clone()
        },
        args,
        ports: if server.ports.is_empty() {
            definition.ports.clone()
        } else {
            server.ports.clone()
        },
        env,
        resources: if server.resources.is_empty() {
            definition.default_resources.clone()
        } else {
            server.resources.clone()
        },
        storage: resolve_storage(server, definition),
        config_files,
        service_type: server.service_type,
        health_check: definition.health_check.clone(),
    })
}

fn resolve_image(server: &SteamServerSpec, definition: &GameDefinitionSpec) -> String {
    server
        .image
        .as_deref()
        .and_then(non_empty)
        .or_else(|| non_empty(&definition.image))
        .unwrap_or(DEFAULT_IMAGE)
        .to_string()
}

fn resolve_storage(server: &SteamServerSpec, definition: &GameDefinitionSpec) -> Option<StoragePlan> {
    let storage = server.storage.as_ref();
    let size = storage
        .and_then(|s| s.size.as_deref())
        .and_then(non_empty)
        .or_else(|| non_empty(&definition.default_storage))
        .unwrap_or(DEFAULT_STORAGE_SIZE);

    if is_zero_quantity(size) {
        return None;
    }

    Some(StoragePlan {
        size: size.to_string(),
        storage_class_name: storage.and_then(|s| s.storage_class_name.clone()),
    })
}

/// True for quantities such as `0`, `0Gi` or `0.0`
#[must_use]
pub fn is_zero_quantity(quantity: &str) -> bool {
    QUANTITY_NUMBER
        .captures(quantity)
        .and_then(|c| c[1].parse::<f64>().ok())
        .is_some_and(|n| n == 0.0)
}

fn non_empty(s: &str) -> Option<&str> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}
