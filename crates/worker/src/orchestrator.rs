//! 工作流编排器
//!
//! 按流程类型把请求路由到已注册的处理器。

use std::collections::HashMap;
use std::sync::Arc;

use analysis_core::errors::{AnalysisError, AnalysisResult};
use analysis_core::models::{
    AnalysisInput, IntoWorkflowType, ScheduledTask, WorkflowResult, WorkflowType,
};
use analysis_core::traits::TaskRunner;
use async_trait::async_trait;
use tracing::{debug, info};

use crate::workflow::AnalysisWorkflow;

/// 某类流程的处理器
#[async_trait]
pub trait WorkflowHandler: Send + Sync {
    async fn handle(
        &self,
        workflow_type: WorkflowType,
        process_id: &str,
        input: &AnalysisInput,
    ) -> AnalysisResult<WorkflowResult>;
}

#[async_trait]
impl WorkflowHandler for AnalysisWorkflow {
    async fn handle(
        &self,
        workflow_type: WorkflowType,
        process_id: &str,
        input: &AnalysisInput,
    ) -> AnalysisResult<WorkflowResult> {
        self.execute(workflow_type, process_id, input).await
    }
}

#[derive(Default)]
pub struct WorkflowOrchestrator {
    handlers: HashMap<WorkflowType, Arc<dyn WorkflowHandler>>,
}

impl WorkflowOrchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    /// 一个工作流处理全部三种流程类型
    pub fn with_workflow(workflow: Arc<AnalysisWorkflow>) -> Self {
        let mut orchestrator = Self::new();
        for workflow_type in WorkflowType::ALL {
            orchestrator.register(workflow_type, workflow.clone());
        }
        orchestrator
    }

    /// 注册处理器，已有的同类型处理器会被替换
    pub fn register(&mut self, workflow_type: WorkflowType, handler: Arc<dyn WorkflowHandler>) {
        if self.handlers.insert(workflow_type, handler).is_some() {
            info!("替换流程类型 {} 的处理器", workflow_type);
        } else {
            debug!("注册流程类型 {} 的处理器", workflow_type);
        }
    }

    pub fn supports(&self, workflow_type: WorkflowType) -> bool {
        self.handlers.contains_key(&workflow_type)
    }

    pub async fn process(
        &self,
        workflow_type: impl IntoWorkflowType,
        process_id: &str,
        input: &AnalysisInput,
    ) -> AnalysisResult<WorkflowResult> {
        let workflow_type = workflow_type.into_workflow_type()?;
        let handler = self.handlers.get(&workflow_type).ok_or_else(|| {
            let registered: Vec<&str> = WorkflowType::ALL
                .iter()
                .filter(|t| self.handlers.contains_key(t))
                .map(|t| t.as_str())
                .collect();
            AnalysisError::invalid_workflow_type(workflow_type.as_str(), &registered)
        })?;

        handler.handle(workflow_type, process_id, input).await
    }
}

#[async_trait]
impl TaskRunner for WorkflowOrchestrator {
    async fn run(&self, task: &ScheduledTask) -> AnalysisResult<WorkflowResult> {
        self.process(task.analysis_type, &task.process_id, &task.input)
            .await
    }
}
