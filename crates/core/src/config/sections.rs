use std::net::SocketAddr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::history::DEFAULT_HISTORY_LIMIT;
use crate::retry::RetryPolicy;

/// 工作流重试配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
    pub jitter_factor: f64,
    /// 保留最近状态的流程数
    pub history_limit: usize,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            max_delay_ms: 60_000,
            backoff_multiplier: 2.0,
            jitter_factor: 0.0,
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}

impl WorkflowConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.max_attempts == 0 {
            return Err(anyhow::anyhow!("最大尝试次数必须大于0"));
        }

        if self.max_delay_ms < self.base_delay_ms {
            return Err(anyhow::anyhow!(
                "最大重试间隔 {}ms 不能小于基础间隔 {}ms",
                self.max_delay_ms,
                self.base_delay_ms
            ));
        }

        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err(anyhow::anyhow!(
                "退避倍数必须不小于1.0，当前值: {}",
                self.backoff_multiplier
            ));
        }

        if !(0.0..=1.0).contains(&self.jitter_factor) {
            return Err(anyhow::anyhow!(
                "抖动系数必须在0.0到1.0之间，当前值: {}",
                self.jitter_factor
            ));
        }

        if self.history_limit == 0 {
            return Err(anyhow::anyhow!("流程状态保留数必须大于0"));
        }

        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            backoff_multiplier: self.backoff_multiplier,
            jitter_factor: self.jitter_factor,
        }
    }
}

/// 调度器配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub enabled: bool,
    pub tick_interval_ms: u64,
    /// 保留执行结果的任务数
    pub history_limit: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tick_interval_ms: 1000,
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}

impl SchedulerConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.tick_interval_ms == 0 {
            return Err(anyhow::anyhow!("调度间隔必须大于0"));
        }
        if self.history_limit == 0 {
            return Err(anyhow::anyhow!("任务结果保留数必须大于0"));
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

/// 流水线监控配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub enabled: bool,
    pub sample_interval_seconds: u64,
    pub retention_hours: u64,
    pub default_rules_enabled: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sample_interval_seconds: 60,
            retention_hours: 24,
            default_rules_enabled: true,
        }
    }
}

impl MonitorConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.sample_interval_seconds == 0 {
            return Err(anyhow::anyhow!("采样间隔必须大于0"));
        }

        if self.retention_hours == 0 {
            return Err(anyhow::anyhow!("指标保留时长必须大于0"));
        }

        Ok(())
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_secs(self.sample_interval_seconds)
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_hours.saturating_mul(3600))
    }
}

/// 可观测性配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub log_level: String,
    pub log_format: String,
    pub metrics_enabled: bool,
    pub metrics_listen_addr: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            metrics_enabled: false,
            metrics_listen_addr: "127.0.0.1:9090".to_string(),
        }
    }
}

impl ObservabilityConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(anyhow::anyhow!(
                "无效的日志级别: {}，支持的级别: {:?}",
                self.log_level,
                valid_levels
            ));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.log_format.as_str()) {
            return Err(anyhow::anyhow!(
                "无效的日志格式: {}，支持的格式: {:?}",
                self.log_format,
                valid_formats
            ));
        }

        if self.metrics_enabled && self.metrics_listen_addr.parse::<SocketAddr>().is_err() {
            return Err(anyhow::anyhow!(
                "无效的指标监听地址: {}",
                self.metrics_listen_addr
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(WorkflowConfig::default().validate().is_ok());
        assert!(SchedulerConfig::default().validate().is_ok());
        assert!(MonitorConfig::default().validate().is_ok());
        assert!(ObservabilityConfig::default().validate().is_ok());
    }

    #[test]
    fn test_retry_policy_from_workflow_config() {
        let policy = WorkflowConfig::default().retry_policy();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.base_delay, Duration::from_secs(1));
        assert_eq!(policy.max_delay, Duration::from_secs(60));
        assert_eq!(policy.backoff_multiplier, 2.0);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let workflow = WorkflowConfig {
            max_attempts: 0,
            ..Default::default()
        };
        assert!(workflow.validate().is_err());

        let workflow = WorkflowConfig {
            jitter_factor: 1.5,
            ..Default::default()
        };
        assert!(workflow.validate().is_err());

        let scheduler = SchedulerConfig {
            tick_interval_ms: 0,
            ..Default::default()
        };
        assert!(scheduler.validate().is_err());

        let scheduler = SchedulerConfig {
            history_limit: 0,
            ..Default::default()
        };
        assert!(scheduler.validate().is_err());

        let workflow = WorkflowConfig {
            history_limit: 0,
            ..Default::default()
        };
        assert!(workflow.validate().is_err());

        let observability = ObservabilityConfig {
            log_format: "xml".to_string(),
            ..Default::default()
        };
        assert!(observability.validate().is_err());

        let observability = ObservabilityConfig {
            metrics_enabled: true,
            metrics_listen_addr: "not-an-address".to_string(),
            ..Default::default()
        };
        assert!(observability.validate().is_err());
    }

    #[test]
    fn test_large_retention_saturates() {
        let monitor = MonitorConfig {
            retention_hours: u64::MAX,
            ..Default::default()
        };
        assert!(monitor.validate().is_ok());
        assert_eq!(monitor.retention(), Duration::from_secs(u64::MAX));
    }
}
