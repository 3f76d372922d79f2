//! Boilerr Controller Library
//!
//! Kubernetes controller that turns `SteamServer` resources into running
//! SteamCMD dedicated game servers, using reusable `GameDefinition` templates.
//!
//! ## Quick Start
//!
//! ```rust
//! use boilerr_controller::prelude::*;
//! ```
//!
//! This brings commonly used types and traits into scope. For more specific imports,
//! use the individual modules.

pub mod config;
pub mod constants;
pub mod controller;
pub mod crd;
pub mod observability;
pub mod prelude;
pub mod resolver;
pub mod resources;
pub mod runtime;
