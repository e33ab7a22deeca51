//! Structured logging utilities
//!
//! Event-level logging helpers for the workflow, scheduler and monitor.

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

/// Structured logging utilities
pub struct StructuredLogger;

impl StructuredLogger {
    /// Log workflow start
    pub fn log_workflow_started(process_id: &str, workflow_type: &str) {
        info!(
            event = "workflow_started",
            process.id = process_id,
            workflow.type = workflow_type,
            "Analysis workflow started"
        );
    }

    /// Log workflow state transition
    pub fn log_workflow_transition(process_id: &str, from: &str, to: &str) {
        debug!(
            event = "workflow_transition",
            process.id = process_id,
            workflow.from = from,
            workflow.to = to,
            "Workflow state changed"
        );
    }

    /// Log workflow completion
    pub fn log_workflow_completed(process_id: &str, workflow_type: &str, duration_ms: u64) {
        info!(
            event = "workflow_completed",
            process.id = process_id,
            workflow.type = workflow_type,
            workflow.duration_ms = duration_ms,
            "Analysis workflow completed"
        );
    }

    /// Log workflow failure
    pub fn log_workflow_failed(
        process_id: &str,
        workflow_type: &str,
        duration_ms: u64,
        error_code: &str,
        error_message: &str,
    ) {
        error!(
            event = "workflow_failed",
            process.id = process_id,
            workflow.type = workflow_type,
            workflow.duration_ms = duration_ms,
            error.code = error_code,
            error.message = error_message,
            "Analysis workflow failed"
        );
    }

    /// Log task scheduling event
    pub fn log_task_scheduled(
        task_id: &str,
        process_id: &str,
        analysis_type: &str,
        priority: &str,
        next_run: DateTime<Utc>,
        repeat_interval_seconds: Option<f64>,
    ) {
        info!(
            event = "task_scheduled",
            task.id = task_id,
            process.id = process_id,
            task.type = analysis_type,
            task.priority = priority,
            task.next_run = %next_run,
            task.repeat_interval_seconds = repeat_interval_seconds,
            "Task scheduled for execution"
        );
    }

    /// Log task launch from a scheduler tick
    pub fn log_task_launched(task_id: &str, process_id: &str, analysis_type: &str) {
        info!(
            event = "task_launched",
            task.id = task_id,
            process.id = process_id,
            task.type = analysis_type,
            "Scheduled task launched"
        );
    }

    /// Log task execution completion
    pub fn log_task_finished(task_id: &str, status: &str, error_code: Option<&str>) {
        if error_code.is_none() {
            info!(
                event = "task_finished",
                task.id = task_id,
                task.status = status,
                "Scheduled task finished"
            );
        } else {
            warn!(
                event = "task_finished",
                task.id = task_id,
                task.status = status,
                error.code = error_code,
                "Scheduled task finished with error"
            );
        }
    }

    /// Log task cancellation
    pub fn log_task_cancelled(task_id: &str, was_running: bool) {
        info!(
            event = "task_cancelled",
            task.id = task_id,
            task.was_running = was_running,
            "Task cancelled"
        );
    }

    /// Log fired alert
    pub fn log_alert_fired(rule_name: &str, metric_name: &str, value: f64, threshold: f64, severity: &str) {
        warn!(
            event = "alert_fired",
            alert.rule = rule_name,
            alert.metric = metric_name,
            alert.value = value,
            alert.threshold = threshold,
            alert.severity = severity,
            "Performance alert fired"
        );
    }

    /// Log system error
    pub fn log_system_error(component: &str, operation: &str, error: &dyn std::fmt::Display) {
        error!(
            event = "system_error",
            error.component = component,
            error.operation = operation,
            error.message = %error,
            "System error occurred"
        );
    }
}
