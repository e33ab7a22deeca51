//! 分析流水线的基础设施：性能监控、资源采样与可观测性

pub mod monitor;
pub mod observability;
pub mod resource_sampler;

pub use monitor::{
    Alert, AlertLevel, AlertRule, MetricSummary, MetricType, PerformanceMetric,
    PerformanceReport, PipelineMonitor, TaskStatistics,
};
pub use observability::{init_metrics, init_tracing, MetricsCollector, StructuredLogger};
pub use resource_sampler::{ResourceSampler, ResourceSnapshot, SysinfoSampler};
