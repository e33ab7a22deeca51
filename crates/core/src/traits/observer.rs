use std::time::Duration;

use async_trait::async_trait;

use crate::errors::ErrorEnvelope;

/// 流水线观察者
///
/// 工作流在每次运行结束时、调度器在每个调度周期结束时通知观察者。
/// 通知不影响调用方的返回值。
#[async_trait]
pub trait PipelineObserver: Send + Sync {
    async fn task_completed(&self, task_id: &str, duration: Duration);

    async fn task_failed(&self, task_id: &str, duration: Duration, error: &ErrorEnvelope);

    async fn queue_size(&self, size: usize);
}

/// 不做任何事的观察者
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

#[async_trait]
impl PipelineObserver for NoopObserver {
    async fn task_completed(&self, _task_id: &str, _duration: Duration) {}

    async fn task_failed(&self, _task_id: &str, _duration: Duration, _error: &ErrorEnvelope) {}

    async fn queue_size(&self, _size: usize) {}
}
