use async_trait::async_trait;

use crate::errors::AnalysisResult;
use crate::models::{ScheduledTask, WorkflowResult};

/// 调度任务执行接口
///
/// 调度器到期时通过该接口启动一次分析，不关心具体由哪个工作流处理。
#[async_trait]
pub trait TaskRunner: Send + Sync {
    async fn run(&self, task: &ScheduledTask) -> AnalysisResult<WorkflowResult>;
}
