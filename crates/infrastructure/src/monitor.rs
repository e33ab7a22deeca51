//! 流水线性能监控
//!
//! 周期性采样 CPU 和内存，接收工作流上报的任务耗时与失败，
//! 按告警规则在时间窗口内求均值并触发告警，同时生成性能报告。

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use analysis_core::config::MonitorConfig;
use analysis_core::errors::ErrorEnvelope;
use analysis_core::traits::PipelineObserver;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, info, warn};

use crate::observability::{MetricsCollector, StructuredLogger};
use crate::resource_sampler::ResourceSampler;

/// 指标类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricType {
    CpuUsage,
    MemoryUsage,
    TaskDuration,
    ErrorRate,
    QueueSize,
}

impl MetricType {
    pub const ALL: [MetricType; 5] = [
        MetricType::CpuUsage,
        MetricType::MemoryUsage,
        MetricType::TaskDuration,
        MetricType::ErrorRate,
        MetricType::QueueSize,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricType::CpuUsage => "cpu_usage",
            MetricType::MemoryUsage => "memory_usage",
            MetricType::TaskDuration => "task_duration",
            MetricType::ErrorRate => "error_rate",
            MetricType::QueueSize => "queue_size",
        }
    }
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 性能指标样本
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetric {
    pub metric_type: MetricType,
    pub value: f64,
    pub timestamp: DateTime<Utc>,
    pub task_id: Option<String>,
}

impl PerformanceMetric {
    pub fn new(metric_type: MetricType, value: f64) -> Self {
        Self {
            metric_type,
            value,
            timestamp: Utc::now(),
            task_id: None,
        }
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn for_task(mut self, task_id: impl Into<String>) -> Self {
        self.task_id = Some(task_id.into());
        self
    }
}

/// 告警级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Info,
    Warning,
    Critical,
}

impl AlertLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertLevel::Info => "info",
            AlertLevel::Warning => "warning",
            AlertLevel::Critical => "critical",
        }
    }
}

/// 告警规则
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRule {
    pub name: String,
    pub metric_type: MetricType,
    pub threshold: f64,
    pub window_size: Duration,
    pub alert_interval: Duration,
    pub severity: AlertLevel,
    pub last_alert: Option<DateTime<Utc>>,
}

impl AlertRule {
    pub fn new(name: impl Into<String>, metric_type: MetricType, threshold: f64) -> Self {
        Self {
            name: name.into(),
            metric_type,
            threshold,
            window_size: Duration::from_secs(300),
            alert_interval: Duration::from_secs(900),
            severity: AlertLevel::Warning,
            last_alert: None,
        }
    }

    pub fn with_window(mut self, window_size: Duration) -> Self {
        self.window_size = window_size;
        self
    }

    pub fn with_interval(mut self, alert_interval: Duration) -> Self {
        self.alert_interval = alert_interval;
        self
    }

    pub fn with_severity(mut self, severity: AlertLevel) -> Self {
        self.severity = severity;
        self
    }

    /// 内置的 CPU、内存、错误率告警规则
    pub fn default_rules() -> Vec<AlertRule> {
        vec![
            AlertRule::new("high_cpu_usage", MetricType::CpuUsage, 80.0)
                .with_window(Duration::from_secs(5 * 60))
                .with_interval(Duration::from_secs(15 * 60)),
            AlertRule::new("high_memory_usage", MetricType::MemoryUsage, 85.0)
                .with_window(Duration::from_secs(5 * 60))
                .with_interval(Duration::from_secs(15 * 60)),
            AlertRule::new("high_error_rate", MetricType::ErrorRate, 5.0)
                .with_window(Duration::from_secs(30 * 60))
                .with_interval(Duration::from_secs(30 * 60))
                .with_severity(AlertLevel::Critical),
        ]
    }
}

/// 已触发的告警
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub timestamp: DateTime<Utc>,
    pub rule_name: String,
    pub process_id: Option<String>,
    pub metric_name: String,
    pub value: f64,
    pub severity: AlertLevel,
    pub message: String,
}

/// 单个指标在报告周期内的统计
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSummary {
    pub average: f64,
    pub max: f64,
    pub min: f64,
    pub count: usize,
}

/// 任务统计
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskStatistics {
    pub total_tasks: usize,
    pub average_duration: f64,
    pub error_count: usize,
    pub error_rate: f64,
}

/// 性能报告
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceReport {
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub metrics: BTreeMap<MetricType, MetricSummary>,
    pub task_statistics: TaskStatistics,
    pub alerts: Vec<Alert>,
}

/// 流水线监控器
pub struct PipelineMonitor {
    sampler: Arc<dyn ResourceSampler>,
    metrics: Arc<MetricsCollector>,
    sample_interval: Duration,
    retention: Duration,
    history: RwLock<Vec<PerformanceMetric>>,
    rules: RwLock<Vec<AlertRule>>,
    alerts: RwLock<Vec<Alert>>,
}

impl PipelineMonitor {
    pub fn new(
        config: &MonitorConfig,
        sampler: Arc<dyn ResourceSampler>,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        let rules = if config.default_rules_enabled {
            AlertRule::default_rules()
        } else {
            Vec::new()
        };

        Self {
            sampler,
            metrics,
            sample_interval: config.sample_interval(),
            retention: config.retention(),
            history: RwLock::new(Vec::new()),
            rules: RwLock::new(rules),
            alerts: RwLock::new(Vec::new()),
        }
    }

    /// 启动采样循环，直到收到关闭信号
    pub fn start(self: Arc<Self>, mut shutdown_rx: broadcast::Receiver<()>) -> JoinHandle<()> {
        info!(
            "Starting pipeline monitor with sample interval {:?}",
            self.sample_interval
        );

        tokio::spawn(async move {
            let mut sample_interval = interval(self.sample_interval);

            loop {
                tokio::select! {
                    _ = sample_interval.tick() => {
                        if let Err(e) = self.collect_metrics().await {
                            warn!("Failed to collect resource metrics: {:#}", e);
                        }
                        self.check_alerts().await;
                    }
                    _ = shutdown_rx.recv() => {
                        info!("Pipeline monitor shutdown requested");
                        break;
                    }
                }
            }

            info!("Pipeline monitor stopped");
        })
    }

    /// 采样一次 CPU 和内存使用率
    pub async fn collect_metrics(&self) -> Result<()> {
        let sampler = self.sampler.clone();
        let snapshot = tokio::task::spawn_blocking(move || sampler.sample())
            .await
            .context("资源采样任务异常退出")??;

        let now = Utc::now();
        self.metrics
            .update_resource_usage(snapshot.cpu_usage_percent, snapshot.memory_usage_percent);
        self.record_metric(
            PerformanceMetric::new(MetricType::CpuUsage, snapshot.cpu_usage_percent).at(now),
        )
        .await;
        self.record_metric(
            PerformanceMetric::new(MetricType::MemoryUsage, snapshot.memory_usage_percent).at(now),
        )
        .await;

        Ok(())
    }

    /// 追加一个样本并清理超过保留时长的历史
    pub async fn record_metric(&self, metric: PerformanceMetric) {
        let cutoff = chrono::Duration::from_std(self.retention)
            .ok()
            .and_then(|retention| Utc::now().checked_sub_signed(retention));
        let mut history = self.history.write().await;
        history.push(metric);
        if let Some(cutoff) = cutoff {
            history.retain(|m| m.timestamp >= cutoff);
        }
    }

    pub async fn record_task_duration(&self, task_id: &str, duration: Duration) {
        self.record_metric(
            PerformanceMetric::new(MetricType::TaskDuration, duration.as_secs_f64())
                .for_task(task_id),
        )
        .await;
    }

    /// 失败任务记为 100.0 的错误率样本
    pub async fn record_task_error(&self, task_id: &str) {
        self.record_metric(PerformanceMetric::new(MetricType::ErrorRate, 100.0).for_task(task_id))
            .await;
    }

    /// 成功任务记为 0.0 的错误率样本
    pub async fn record_task_success(&self, task_id: &str) {
        self.record_metric(PerformanceMetric::new(MetricType::ErrorRate, 0.0).for_task(task_id))
            .await;
    }

    pub async fn record_queue_size(&self, size: usize) {
        self.record_metric(PerformanceMetric::new(MetricType::QueueSize, size as f64))
            .await;
    }

    pub async fn check_alerts(&self) -> Vec<Alert> {
        self.check_alerts_at(Utc::now()).await
    }

    /// 以 `now` 为基准评估所有规则，返回本次触发的告警
    ///
    /// 单条规则评估失败只记录日志，不影响其他规则。
    pub async fn check_alerts_at(&self, now: DateTime<Utc>) -> Vec<Alert> {
        let history = self.history.read().await;
        let mut rules = self.rules.write().await;
        let mut fired = Vec::new();

        for rule in rules.iter_mut() {
            match evaluate_rule(rule, &history, now) {
                Ok(Some(alert)) => {
                    rule.last_alert = Some(now);
                    StructuredLogger::log_alert_fired(
                        &alert.rule_name,
                        &alert.metric_name,
                        alert.value,
                        rule.threshold,
                        alert.severity.as_str(),
                    );
                    self.metrics
                        .record_alert(&alert.rule_name, alert.severity.as_str());
                    fired.push(alert);
                }
                Ok(None) => {}
                Err(e) => {
                    StructuredLogger::log_system_error("pipeline_monitor", &rule.name, &e);
                }
            }
        }
        drop(rules);
        drop(history);

        if !fired.is_empty() {
            self.alerts.write().await.extend(fired.iter().cloned());
        }
        fired
    }

    pub async fn add_rule(&self, rule: AlertRule) {
        let mut rules = self.rules.write().await;
        rules.retain(|r| r.name != rule.name);
        info!("Alert rule added: {} ({} > {})", rule.name, rule.metric_type, rule.threshold);
        rules.push(rule);
    }

    /// 删除规则，返回规则是否存在
    pub async fn remove_rule(&self, name: &str) -> bool {
        let mut rules = self.rules.write().await;
        let before = rules.len();
        rules.retain(|r| r.name != name);
        before != rules.len()
    }

    pub async fn rules(&self) -> Vec<AlertRule> {
        self.rules.read().await.clone()
    }

    pub async fn alerts(&self) -> Vec<Alert> {
        self.alerts.read().await.clone()
    }

    pub async fn history(&self) -> Vec<PerformanceMetric> {
        self.history.read().await.clone()
    }

    /// 生成性能报告，默认统计最近24小时
    pub async fn get_performance_report(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> PerformanceReport {
        let period_end = end.unwrap_or_else(Utc::now);
        let period_start = start.unwrap_or_else(|| period_end - chrono::Duration::hours(24));

        let history = self.history.read().await;
        let in_period: Vec<&PerformanceMetric> = history
            .iter()
            .filter(|m| m.timestamp >= period_start && m.timestamp <= period_end)
            .collect();

        let mut metrics = BTreeMap::new();
        for metric_type in MetricType::ALL {
            let values: Vec<f64> = in_period
                .iter()
                .filter(|m| m.metric_type == metric_type)
                .map(|m| m.value)
                .collect();
            if let Some(summary) = summarize(&values) {
                metrics.insert(metric_type, summary);
            }
        }

        let durations: Vec<f64> = in_period
            .iter()
            .filter(|m| m.metric_type == MetricType::TaskDuration)
            .map(|m| m.value)
            .collect();
        let error_count = in_period
            .iter()
            .filter(|m| m.metric_type == MetricType::ErrorRate && m.value > 0.0)
            .count();
        let total_tasks = durations.len();
        let task_statistics = TaskStatistics {
            total_tasks,
            average_duration: mean(&durations).unwrap_or(0.0),
            error_count,
            error_rate: if total_tasks > 0 {
                error_count as f64 / total_tasks as f64 * 100.0
            } else {
                0.0
            },
        };
        drop(history);

        let alerts = self
            .alerts
            .read()
            .await
            .iter()
            .filter(|a| a.timestamp >= period_start && a.timestamp <= period_end)
            .cloned()
            .collect();

        PerformanceReport {
            period_start,
            period_end,
            metrics,
            task_statistics,
            alerts,
        }
    }
}

#[async_trait]
impl PipelineObserver for PipelineMonitor {
    async fn task_completed(&self, task_id: &str, duration: Duration) {
        self.record_task_duration(task_id, duration).await;
        self.record_task_success(task_id).await;
    }

    async fn task_failed(&self, task_id: &str, duration: Duration, error: &ErrorEnvelope) {
        debug!(
            task.id = task_id,
            error.code = error.error_code.as_str(),
            "Recording failed task"
        );
        self.record_task_duration(task_id, duration).await;
        self.record_task_error(task_id).await;
    }

    async fn queue_size(&self, size: usize) {
        self.record_queue_size(size).await;
    }
}

fn evaluate_rule(
    rule: &AlertRule,
    history: &[PerformanceMetric],
    now: DateTime<Utc>,
) -> Result<Option<Alert>> {
    let window = chrono::Duration::from_std(rule.window_size)
        .with_context(|| format!("规则 {} 的窗口大小超出范围", rule.name))?;
    let alert_interval = chrono::Duration::from_std(rule.alert_interval)
        .with_context(|| format!("规则 {} 的告警间隔超出范围", rule.name))?;
    let window_start = now
        .checked_sub_signed(window)
        .with_context(|| format!("规则 {} 的窗口起点超出范围", rule.name))?;

    let samples: Vec<&PerformanceMetric> = history
        .iter()
        .filter(|m| m.metric_type == rule.metric_type)
        .filter(|m| m.timestamp > window_start && m.timestamp <= now)
        .collect();

    let values: Vec<f64> = samples.iter().map(|m| m.value).collect();
    let Some(average) = mean(&values) else {
        return Ok(None);
    };
    if !average.is_finite() {
        return Err(anyhow::anyhow!(
            "规则 {} 的窗口均值无效: {}",
            rule.name,
            average
        ));
    }

    if average <= rule.threshold {
        return Ok(None);
    }

    if let Some(last_alert) = rule.last_alert {
        if now - last_alert < alert_interval {
            debug!(
                "Alert {} suppressed, last fired at {}",
                rule.name, last_alert
            );
            return Ok(None);
        }
    }

    let process_id = samples
        .iter()
        .rev()
        .find_map(|m| m.task_id.clone());

    Ok(Some(Alert {
        timestamp: now,
        rule_name: rule.name.clone(),
        process_id,
        metric_name: rule.metric_type.as_str().to_string(),
        value: average,
        severity: rule.severity,
        message: format!(
            "{} 在 {} 秒窗口内均值 {:.2} 超过阈值 {:.2}",
            rule.metric_type,
            rule.window_size.as_secs(),
            average,
            rule.threshold
        ),
    }))
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

fn summarize(values: &[f64]) -> Option<MetricSummary> {
    let average = mean(values)?;
    Some(MetricSummary {
        average,
        max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        min: values.iter().copied().fold(f64::INFINITY, f64::min),
        count: values.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_rules() {
        let rules = AlertRule::default_rules();
        assert_eq!(rules.len(), 3);
        assert_eq!(rules[0].metric_type, MetricType::CpuUsage);
        assert_eq!(rules[0].threshold, 80.0);
        assert_eq!(rules[1].threshold, 85.0);
        assert_eq!(rules[2].metric_type, MetricType::ErrorRate);
        assert_eq!(rules[2].window_size, Duration::from_secs(1800));
        assert_eq!(rules[2].alert_interval, Duration::from_secs(1800));
    }

    #[test]
    fn test_summarize() {
        assert!(summarize(&[]).is_none());
        let summary = summarize(&[1.0, 5.0, 3.0]).unwrap();
        assert_eq!(summary.average, 3.0);
        assert_eq!(summary.max, 5.0);
        assert_eq!(summary.min, 1.0);
        assert_eq!(summary.count, 3);
    }

    #[test]
    fn test_evaluate_rule_below_threshold() {
        let now = Utc::now();
        let rule = AlertRule::new("cpu", MetricType::CpuUsage, 80.0);
        let history = vec![
            PerformanceMetric::new(MetricType::CpuUsage, 70.0).at(now),
            PerformanceMetric::new(MetricType::CpuUsage, 85.0).at(now),
        ];
        assert!(evaluate_rule(&rule, &history, now).unwrap().is_none());
    }
}
