//! # Observability
//!
//! Observability modules for metrics and tracing.
//!
//! - `metrics`: Prometheus metrics collection
//! - `otel`: Datadog trace export

pub mod metrics;
pub mod otel;
