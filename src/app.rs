use std::path::Path;
use std::sync::Arc;

use analysis_core::config::AppConfig;
use analysis_core::errors::{AnalysisError, AnalysisResult};
use analysis_core::models::{
    AnalysisRequest, TaskFilter, TaskStatus, TaskSummary, WorkflowResult, WorkflowState,
};
use analysis_core::traits::{Collaborators, PipelineObserver, TaskRunner};
use analysis_dispatcher::AnalysisScheduler;
use analysis_infrastructure::{
    Alert, MetricsCollector, PerformanceReport, PipelineMonitor, ResourceSampler, SysinfoSampler,
};
use analysis_worker::{AnalysisWorkflow, WorkflowOrchestrator};
use anyhow::Context;
use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tracing::info;

use crate::shutdown::ShutdownManager;

/// 主应用程序
///
/// 组装工作流、编排器、调度器和性能监控，对外提供提交、调度、取消、
/// 查询状态和性能报告等操作。
pub struct Application {
    config: AppConfig,
    monitor: Arc<PipelineMonitor>,
    workflow: Arc<AnalysisWorkflow>,
    orchestrator: Arc<WorkflowOrchestrator>,
    scheduler: Arc<AnalysisScheduler>,
}

impl Application {
    /// 使用系统资源采样器创建应用
    pub fn new(config: AppConfig, collaborators: Collaborators) -> Self {
        Self::with_sampler(config, collaborators, Arc::new(SysinfoSampler::new()))
    }

    pub fn with_sampler(
        config: AppConfig,
        collaborators: Collaborators,
        sampler: Arc<dyn ResourceSampler>,
    ) -> Self {
        let metrics = Arc::new(MetricsCollector::new());
        let monitor = Arc::new(PipelineMonitor::new(
            &config.monitor,
            sampler,
            Arc::clone(&metrics),
        ));
        let observer: Arc<dyn PipelineObserver> = monitor.clone();

        let workflow = Arc::new(
            AnalysisWorkflow::new(collaborators)
                .with_retry_policy(config.workflow.retry_policy())
                .with_history_limit(config.workflow.history_limit)
                .with_observer(Arc::clone(&observer))
                .with_metrics(Arc::clone(&metrics)),
        );
        let orchestrator = Arc::new(WorkflowOrchestrator::with_workflow(Arc::clone(&workflow)));

        let runner: Arc<dyn TaskRunner> = orchestrator.clone();
        let scheduler = Arc::new(
            AnalysisScheduler::from_config(&config.scheduler, runner)
                .with_observer(observer)
                .with_metrics(metrics),
        );

        info!(
            "应用组装完成: 重试 {} 次, 调度周期 {:?}, 采样周期 {:?}",
            config.workflow.max_attempts,
            config.scheduler.tick_interval(),
            config.monitor.sample_interval()
        );

        Self {
            config,
            monitor,
            workflow,
            orchestrator,
            scheduler,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// 立即执行一次分析
    pub async fn submit(&self, request: AnalysisRequest) -> AnalysisResult<WorkflowResult> {
        self.orchestrator
            .process(request.workflow_type, &request.process_id, &request.input)
            .await
    }

    /// 登记延迟或周期执行的分析，返回任务 ID
    ///
    /// 调度器被禁用时返回配置错误，任务不会被登记。
    pub async fn schedule(&self, request: AnalysisRequest) -> AnalysisResult<String> {
        if !self.config.scheduler.enabled {
            return Err(AnalysisError::configuration("调度器已禁用，无法登记任务")
                .with_detail("field", "scheduler.enabled"));
        }
        self.scheduler.schedule(request).await
    }

    pub async fn cancel(&self, task_id: &str) -> AnalysisResult<()> {
        self.scheduler.cancel(task_id).await
    }

    pub async fn status(&self, task_id: &str) -> AnalysisResult<TaskStatus> {
        self.scheduler.status(task_id).await
    }

    pub async fn list_tasks(&self, filter: &TaskFilter) -> Vec<TaskSummary> {
        self.scheduler.list_tasks(filter).await
    }

    /// 性能报告，缺省为最近 24 小时
    pub async fn metrics(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> PerformanceReport {
        self.monitor.get_performance_report(start, end).await
    }

    pub async fn alerts(&self) -> Vec<Alert> {
        self.monitor.alerts().await
    }

    pub fn workflow_state(&self, process_id: &str) -> Option<WorkflowState> {
        self.workflow.state(process_id)
    }

    pub fn monitor(&self) -> &Arc<PipelineMonitor> {
        &self.monitor
    }

    pub fn scheduler(&self) -> &Arc<AnalysisScheduler> {
        &self.scheduler
    }

    /// 启动调度和监控循环，收到关闭信号后各自退出
    pub async fn start(&self, shutdown: &ShutdownManager) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::new();

        if self.config.scheduler.enabled {
            let rx = shutdown.subscribe().await;
            handles.push(Arc::clone(&self.scheduler).start(rx));
        } else {
            info!("调度器已禁用");
        }

        if self.config.monitor.enabled {
            let rx = shutdown.subscribe().await;
            handles.push(Arc::clone(&self.monitor).start(rx));
        } else {
            info!("性能监控已禁用");
        }

        handles
    }
}

/// 从 JSON 文件读取请求列表
pub async fn load_requests(path: &Path) -> anyhow::Result<Vec<AnalysisRequest>> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("读取请求文件失败: {}", path.display()))?;
    let requests: Vec<AnalysisRequest> = serde_json::from_str(&content)
        .with_context(|| format!("解析请求文件失败: {}", path.display()))?;
    Ok(requests)
}
