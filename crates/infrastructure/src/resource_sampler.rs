use std::sync::Mutex;

use anyhow::Result;
use sysinfo::System;
use tracing::debug;

/// 一次资源采样结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResourceSnapshot {
    /// CPU使用率（百分比）
    pub cpu_usage_percent: f64,
    /// 内存使用率（百分比）
    pub memory_usage_percent: f64,
}

/// 资源采样器
///
/// 采样是同步阻塞调用，监控器会把它放到阻塞线程池中执行。
pub trait ResourceSampler: Send + Sync {
    fn sample(&self) -> Result<ResourceSnapshot>;
}

/// 基于 `sysinfo` 的系统资源采样器
///
/// 持有同一个 `System` 实例，CPU 使用率依赖两次刷新之间的差值，
/// 因此第一次采样的 CPU 值可能为 0。
pub struct SysinfoSampler {
    system: Mutex<System>,
}

impl SysinfoSampler {
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_cpu();
        system.refresh_memory();
        Self {
            system: Mutex::new(system),
        }
    }
}

impl Default for SysinfoSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceSampler for SysinfoSampler {
    fn sample(&self) -> Result<ResourceSnapshot> {
        let mut system = self
            .system
            .lock()
            .map_err(|e| anyhow::anyhow!("资源采样器锁已损坏: {e}"))?;

        system.refresh_cpu();
        system.refresh_memory();

        let cpu_count = system.cpus().len();
        let cpu_usage_percent = if cpu_count > 0 {
            system
                .cpus()
                .iter()
                .map(|cpu| cpu.cpu_usage() as f64)
                .sum::<f64>()
                / cpu_count as f64
        } else {
            0.0
        };

        let total_memory = system.total_memory();
        let memory_usage_percent = if total_memory > 0 {
            (system.used_memory() as f64 / total_memory as f64) * 100.0
        } else {
            0.0
        };

        let snapshot = ResourceSnapshot {
            cpu_usage_percent,
            memory_usage_percent,
        };
        debug!("Resource snapshot collected: {:?}", snapshot);
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sysinfo_sampler_returns_percentages() {
        let sampler = SysinfoSampler::new();
        let snapshot = sampler.sample().unwrap();
        assert!(snapshot.cpu_usage_percent >= 0.0);
        assert!((0.0..=100.0).contains(&snapshot.memory_usage_percent));
    }
}
