//! # Controller
//!
//! - `backoff`: Fibonacci backoff for failed reconciliations
//! - `definition`: GameDefinition validation and readiness
//! - `reconciler`: SteamServer reconciliation and the object store seam
//! - `server`: HTTP server for metrics and health checks
//!
//! The `crdgen` binary lives alongside these modules but is built separately.

pub mod backoff;
pub mod definition;
pub mod reconciler;
pub mod server;
