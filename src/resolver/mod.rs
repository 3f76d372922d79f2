//! # Config Resolution
//!
//! Turns a SteamServer's config map into values ready for synthesis.
//!
//! - `values`: schema defaults, user overrides, secret indirection and validation
//! - `interpolate`: template rendering of args and config files

mod interpolate;
mod values;

pub use interpolate::{Interpolator, TemplateError};
pub use values::{binding_name, resolve, validate_config, ConfigError, ResolvedConfig, SecretBinding};
