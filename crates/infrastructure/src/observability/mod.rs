//! Observability module
//!
//! This module provides the observability features of the analysis pipeline:
//! - Metrics collection and reporting
//! - Structured logging
//! - Tracing subscriber setup

pub mod metrics_collector;
pub mod structured_logger;
pub mod telemetry_setup;

pub use metrics_collector::MetricsCollector;
pub use structured_logger::StructuredLogger;
pub use telemetry_setup::{init_metrics, init_tracing};
