//! Metrics collector for the analysis pipeline
//!
//! Wraps the `metrics` crate facade. Without an installed recorder every
//! call is a no-op, so components can always hold a collector.

use metrics::{counter, gauge, histogram, Counter, Gauge, Histogram};
use tracing::debug;

/// Metrics collector for the analysis pipeline
pub struct MetricsCollector {
    // Workflow metrics
    workflow_runs_total: Counter,
    workflow_failures_total: Counter,
    workflow_duration: Histogram,
    workflows_in_flight: Gauge,

    // Scheduler metrics
    scheduler_ticks_total: Counter,
    scheduler_tasks_launched_total: Counter,
    scheduler_pending_tasks: Gauge,
    scheduler_running_tasks: Gauge,

    // Monitor metrics
    alerts_fired_total: Counter,
    cpu_usage_percent: Gauge,
    memory_usage_percent: Gauge,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            workflow_runs_total: counter!("analysis_workflow_runs_total"),
            workflow_failures_total: counter!("analysis_workflow_failures_total"),
            workflow_duration: histogram!("analysis_workflow_duration_seconds"),
            workflows_in_flight: gauge!("analysis_workflows_in_flight"),
            scheduler_ticks_total: counter!("analysis_scheduler_ticks_total"),
            scheduler_tasks_launched_total: counter!("analysis_scheduler_tasks_launched_total"),
            scheduler_pending_tasks: gauge!("analysis_scheduler_pending_tasks"),
            scheduler_running_tasks: gauge!("analysis_scheduler_running_tasks"),
            alerts_fired_total: counter!("analysis_alerts_fired_total"),
            cpu_usage_percent: gauge!("analysis_cpu_usage_percent"),
            memory_usage_percent: gauge!("analysis_memory_usage_percent"),
        }
    }

    // Workflow metrics

    pub fn record_workflow_started(&self) {
        self.workflows_in_flight.increment(1.0);
    }

    /// Release the in-flight slot, also called when a run is cancelled
    pub fn record_workflow_released(&self) {
        self.workflows_in_flight.decrement(1.0);
    }

    /// Record a finished workflow run
    pub fn record_workflow_finished(&self, workflow_type: &str, success: bool, duration_seconds: f64) {
        self.workflow_runs_total.increment(1);
        self.workflow_duration.record(duration_seconds);
        counter!(
            "analysis_workflow_runs_by_type_total",
            "workflow_type" => workflow_type.to_string(),
            "status" => if success { "completed" } else { "failed" }
        )
        .increment(1);

        debug!(
            workflow_type = workflow_type,
            success = success,
            duration_seconds = duration_seconds,
            "Workflow metrics recorded"
        );
    }

    /// Record a workflow failure by error code
    pub fn record_workflow_failure(&self, error_code: &str) {
        self.workflow_failures_total.increment(1);
        counter!(
            "analysis_workflow_errors_total",
            "error_code" => error_code.to_string()
        )
        .increment(1);
    }

    // Scheduler metrics

    pub fn record_scheduler_tick(&self, launched: usize, pending: usize, running: usize) {
        self.scheduler_ticks_total.increment(1);
        self.scheduler_tasks_launched_total.increment(launched as u64);
        self.scheduler_pending_tasks.set(pending as f64);
        self.scheduler_running_tasks.set(running as f64);
    }

    pub fn update_running_tasks(&self, running: usize) {
        self.scheduler_running_tasks.set(running as f64);
    }

    // Monitor metrics

    pub fn record_alert(&self, rule_name: &str, severity: &str) {
        self.alerts_fired_total.increment(1);
        counter!(
            "analysis_alerts_by_rule_total",
            "rule" => rule_name.to_string(),
            "severity" => severity.to_string()
        )
        .increment(1);
    }

    pub fn update_resource_usage(&self, cpu_percent: f64, memory_percent: f64) {
        self.cpu_usage_percent.set(cpu_percent);
        self.memory_usage_percent.set(memory_percent);
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collector_without_recorder_is_noop() {
        let collector = MetricsCollector::new();
        collector.record_workflow_started();
        collector.record_workflow_finished("baseline", true, 0.25);
        collector.record_workflow_released();
        collector.record_workflow_failure("VALIDATION_ERROR");
        collector.record_scheduler_tick(2, 5, 2);
        collector.record_alert("high_cpu_usage", "warning");
        collector.update_resource_usage(12.0, 40.0);
    }
}
