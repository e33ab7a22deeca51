use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use analysis_core::config::MonitorConfig;
use analysis_core::errors::AnalysisError;
use analysis_core::traits::PipelineObserver;
use analysis_infrastructure::{
    AlertLevel, AlertRule, MetricType, MetricsCollector, PerformanceMetric, PipelineMonitor,
    ResourceSampler, ResourceSnapshot,
};
use chrono::Utc;
use tokio::sync::broadcast;

/// 固定返回值的采样器
struct FixedSampler {
    cpu: f64,
    memory: f64,
    calls: AtomicU32,
}

impl FixedSampler {
    fn new(cpu: f64, memory: f64) -> Self {
        Self {
            cpu,
            memory,
            calls: AtomicU32::new(0),
        }
    }
}

impl ResourceSampler for FixedSampler {
    fn sample(&self) -> anyhow::Result<ResourceSnapshot> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ResourceSnapshot {
            cpu_usage_percent: self.cpu,
            memory_usage_percent: self.memory,
        })
    }
}

/// 总是失败的采样器
struct BrokenSampler;

impl ResourceSampler for BrokenSampler {
    fn sample(&self) -> anyhow::Result<ResourceSnapshot> {
        Err(anyhow::anyhow!("sensor offline"))
    }
}

fn monitor_with(sampler: Arc<dyn ResourceSampler>) -> PipelineMonitor {
    PipelineMonitor::new(
        &MonitorConfig::default(),
        sampler,
        Arc::new(MetricsCollector::new()),
    )
}

#[tokio::test]
async fn test_collect_metrics_records_cpu_and_memory() {
    let monitor = monitor_with(Arc::new(FixedSampler::new(42.0, 63.0)));

    monitor.collect_metrics().await.unwrap();

    let history = monitor.history().await;
    assert_eq!(history.len(), 2);
    assert!(history
        .iter()
        .any(|m| m.metric_type == MetricType::CpuUsage && m.value == 42.0));
    assert!(history
        .iter()
        .any(|m| m.metric_type == MetricType::MemoryUsage && m.value == 63.0));
}

#[tokio::test]
async fn test_sampler_failure_is_reported() {
    let monitor = monitor_with(Arc::new(BrokenSampler));
    assert!(monitor.collect_metrics().await.is_err());
    assert!(monitor.history().await.is_empty());
}

#[tokio::test]
async fn test_high_cpu_fires_once_per_interval() {
    let monitor = monitor_with(Arc::new(FixedSampler::new(0.0, 0.0)));
    let now = Utc::now();

    // 31 个样本，每 10 秒一个，覆盖 5 分钟窗口
    for i in 0..31 {
        let timestamp = now - chrono::Duration::seconds(10 * i);
        monitor
            .record_metric(PerformanceMetric::new(MetricType::CpuUsage, 90.0).at(timestamp))
            .await;
    }

    let fired = monitor.check_alerts_at(now).await;
    assert_eq!(fired.len(), 1);
    assert_eq!(fired[0].rule_name, "high_cpu_usage");
    assert_eq!(fired[0].metric_name, "cpu_usage");
    assert_eq!(fired[0].value, 90.0);
    assert_eq!(fired[0].severity, AlertLevel::Warning);

    // 告警间隔内不再触发
    let fired = monitor
        .check_alerts_at(now + chrono::Duration::seconds(60))
        .await;
    assert!(fired.is_empty());

    assert_eq!(monitor.alerts().await.len(), 1);
    let rules = monitor.rules().await;
    let cpu_rule = rules.iter().find(|r| r.name == "high_cpu_usage").unwrap();
    assert_eq!(cpu_rule.last_alert, Some(now));
}

#[tokio::test]
async fn test_alert_fires_again_after_interval() {
    let monitor = monitor_with(Arc::new(FixedSampler::new(0.0, 0.0)));
    monitor.remove_rule("high_cpu_usage").await;
    monitor
        .add_rule(
            AlertRule::new("fast_cpu", MetricType::CpuUsage, 50.0)
                .with_window(Duration::from_secs(3600))
                .with_interval(Duration::from_secs(60)),
        )
        .await;

    let now = Utc::now();
    monitor
        .record_metric(PerformanceMetric::new(MetricType::CpuUsage, 75.0).at(now))
        .await;

    assert_eq!(monitor.check_alerts_at(now).await.len(), 1);
    assert!(monitor
        .check_alerts_at(now + chrono::Duration::seconds(30))
        .await
        .is_empty());
    assert_eq!(
        monitor
            .check_alerts_at(now + chrono::Duration::seconds(61))
            .await
            .len(),
        1
    );
    assert_eq!(monitor.alerts().await.len(), 2);
}

#[tokio::test]
async fn test_average_below_threshold_does_not_fire() {
    let monitor = monitor_with(Arc::new(FixedSampler::new(0.0, 0.0)));
    let now = Utc::now();
    for value in [95.0, 40.0, 50.0] {
        monitor
            .record_metric(PerformanceMetric::new(MetricType::CpuUsage, value).at(now))
            .await;
    }

    assert!(monitor.check_alerts_at(now).await.is_empty());
}

#[tokio::test]
async fn test_invalid_rule_does_not_block_other_rules() {
    let monitor = monitor_with(Arc::new(FixedSampler::new(0.0, 0.0)));
    monitor
        .add_rule(
            AlertRule::new("broken_window", MetricType::MemoryUsage, 1.0)
                .with_window(Duration::from_secs(u64::MAX)),
        )
        .await;

    let now = Utc::now();
    monitor
        .record_metric(PerformanceMetric::new(MetricType::CpuUsage, 99.0).at(now))
        .await;
    monitor
        .record_metric(PerformanceMetric::new(MetricType::MemoryUsage, 99.0).at(now))
        .await;

    let fired = monitor.check_alerts_at(now).await;
    let names: Vec<&str> = fired.iter().map(|a| a.rule_name.as_str()).collect();
    assert!(names.contains(&"high_cpu_usage"));
    assert!(names.contains(&"high_memory_usage"));
    assert!(!names.contains(&"broken_window"));
}

#[tokio::test]
async fn test_error_rate_alert_from_observer() {
    let monitor = monitor_with(Arc::new(FixedSampler::new(0.0, 0.0)));
    let envelope = AnalysisError::technical("model diverged").to_envelope();

    for i in 0..9 {
        monitor
            .task_completed(&format!("ok-{i}"), Duration::from_millis(100))
            .await;
    }
    monitor
        .task_failed("proc-failed", Duration::from_millis(300), &envelope)
        .await;

    // 1/10 失败 = 10% > 5%
    let fired = monitor.check_alerts().await;
    assert_eq!(fired.len(), 1);
    assert_eq!(fired[0].rule_name, "high_error_rate");
    assert_eq!(fired[0].severity, AlertLevel::Critical);
    assert_eq!(fired[0].process_id.as_deref(), Some("proc-failed"));
    assert!((fired[0].value - 10.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_performance_report() {
    let monitor = monitor_with(Arc::new(FixedSampler::new(30.0, 50.0)));
    let envelope = AnalysisError::economic("npv failed").to_envelope();

    monitor.collect_metrics().await.unwrap();
    monitor.task_completed("a", Duration::from_secs(1)).await;
    monitor.task_completed("b", Duration::from_secs(3)).await;
    monitor.task_failed("c", Duration::from_secs(2), &envelope).await;
    monitor.task_failed("d", Duration::from_secs(2), &envelope).await;
    monitor.queue_size(4).await;

    let report = monitor.get_performance_report(None, None).await;

    let stats = &report.task_statistics;
    assert_eq!(stats.total_tasks, 4);
    assert_eq!(stats.average_duration, 2.0);
    assert_eq!(stats.error_count, 2);
    assert_eq!(stats.error_rate, 50.0);

    let durations = &report.metrics[&MetricType::TaskDuration];
    assert_eq!(durations.max, 3.0);
    assert_eq!(durations.min, 1.0);
    assert_eq!(report.metrics[&MetricType::CpuUsage].average, 30.0);
    assert_eq!(report.metrics[&MetricType::QueueSize].max, 4.0);
    assert_eq!(report.metrics[&MetricType::ErrorRate].average, 50.0);
}

#[tokio::test]
async fn test_empty_report_has_zero_error_rate() {
    let monitor = monitor_with(Arc::new(FixedSampler::new(0.0, 0.0)));
    let report = monitor.get_performance_report(None, None).await;

    assert!(report.metrics.is_empty());
    assert_eq!(report.task_statistics.total_tasks, 0);
    assert_eq!(report.task_statistics.error_rate, 0.0);
    assert_eq!(
        report.period_end - report.period_start,
        chrono::Duration::hours(24)
    );
}

#[tokio::test]
async fn test_report_window_excludes_old_samples() {
    let monitor = monitor_with(Arc::new(FixedSampler::new(0.0, 0.0)));
    let now = Utc::now();
    monitor
        .record_metric(
            PerformanceMetric::new(MetricType::TaskDuration, 10.0)
                .at(now - chrono::Duration::hours(2)),
        )
        .await;
    monitor
        .record_metric(PerformanceMetric::new(MetricType::TaskDuration, 4.0).at(now))
        .await;

    let report = monitor
        .get_performance_report(Some(now - chrono::Duration::hours(1)), Some(now))
        .await;
    assert_eq!(report.task_statistics.total_tasks, 1);
    assert_eq!(report.task_statistics.average_duration, 4.0);
}

#[tokio::test]
async fn test_retention_prunes_old_samples() {
    let config = MonitorConfig {
        retention_hours: 1,
        ..Default::default()
    };
    let monitor = PipelineMonitor::new(
        &config,
        Arc::new(FixedSampler::new(0.0, 0.0)),
        Arc::new(MetricsCollector::new()),
    );

    let now = Utc::now();
    monitor
        .record_metric(
            PerformanceMetric::new(MetricType::CpuUsage, 10.0).at(now - chrono::Duration::hours(3)),
        )
        .await;
    monitor
        .record_metric(PerformanceMetric::new(MetricType::CpuUsage, 20.0).at(now))
        .await;

    let history = monitor.history().await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].value, 20.0);
}

#[tokio::test]
async fn test_start_samples_until_shutdown() {
    let sampler = Arc::new(FixedSampler::new(10.0, 20.0));
    let config = MonitorConfig {
        sample_interval_seconds: 1,
        ..Default::default()
    };
    let monitor = Arc::new(PipelineMonitor::new(
        &config,
        sampler.clone(),
        Arc::new(MetricsCollector::new()),
    ));

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let handle = monitor.clone().start(shutdown_rx);

    tokio::time::sleep(Duration::from_millis(1300)).await;
    shutdown_tx.send(()).unwrap();
    handle.await.unwrap();

    let calls = sampler.calls.load(Ordering::SeqCst);
    assert!(calls >= 2, "calls={calls}");
}
