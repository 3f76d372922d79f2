//! # Definition Registry
//!
//! Validates `GameDefinition` resources and marks them ready for use by
//! SteamServers.

pub mod reconcile;
pub mod validate;

pub use reconcile::{reconcile_definition, report_deleted_definition};
pub use validate::validate_game_definition;
