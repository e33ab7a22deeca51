//! 分析工作流
//!
//! 一次运行严格按 `Received → Validating → Transforming → Executing →
//! ResultValidating → Completed` 推进，任何一步失败都进入 `Failed`。
//! 同一个 `process_id` 同时只允许一个运行实例。

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use analysis_core::errors::{AnalysisError, AnalysisResult, ErrorEnvelope};
use analysis_core::models::{
    AnalysisInput, IntoWorkflowType, WorkflowResult, WorkflowState, WorkflowType,
};
use analysis_core::traits::{
    AnalysisContext, AnalysisDomain, Collaborators, NoopObserver, PipelineObserver,
};
use analysis_core::{timed, with_retry, BoundedHistory, RetryPolicy};
use analysis_infrastructure::{MetricsCollector, StructuredLogger};
use chrono::Utc;
use futures::future::try_join3;
use serde_json::Value;
use tracing::{debug, warn};

use crate::effectiveness::treatment_effectiveness;
use crate::transform::{canonical_input, map_results, validate_output};
use crate::validation::InputValidator;

/// 运行中流程与各流程最近状态的登记表
///
/// 状态和错误只保留最近的若干个流程。
#[derive(Debug, Default)]
struct WorkflowRegistry {
    in_flight: HashSet<String>,
    states: BoundedHistory<WorkflowState>,
    last_errors: BoundedHistory<ErrorEnvelope>,
}

impl WorkflowRegistry {
    fn with_limit(limit: usize) -> Self {
        Self {
            in_flight: HashSet::new(),
            states: BoundedHistory::new(limit),
            last_errors: BoundedHistory::new(limit),
        }
    }
}

/// 同步锁，持有期间从不跨越 `.await`
fn lock(registry: &Mutex<WorkflowRegistry>) -> MutexGuard<'_, WorkflowRegistry> {
    registry.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// 运行槽位
///
/// 释放时归还 `process_id`；运行被中途丢弃（例如调度任务被取消）时，
/// 未到达终止状态的流程记为 `Failed`。
struct InFlightGuard {
    registry: Arc<Mutex<WorkflowRegistry>>,
    metrics: Arc<MetricsCollector>,
    process_id: String,
}

impl InFlightGuard {
    fn transition(&self, next: WorkflowState) {
        let from = {
            let mut registry = lock(&self.registry);
            let current = registry
                .states
                .get(&self.process_id)
                .copied()
                .unwrap_or(WorkflowState::Received);
            if !current.can_transition_to(next) {
                warn!(
                    process_id = %self.process_id,
                    "忽略非法状态流转: {} -> {}",
                    current,
                    next
                );
                return;
            }
            match registry.states.get_mut(&self.process_id) {
                Some(state) => *state = next,
                // 记录已被淘汰
                None => registry.states.insert(self.process_id.as_str(), next),
            }
            current
        };
        StructuredLogger::log_workflow_transition(
            &self.process_id,
            &from.to_string(),
            &next.to_string(),
        );
    }

    fn fail(&self, envelope: ErrorEnvelope) {
        self.transition(WorkflowState::Failed);
        lock(&self.registry)
            .last_errors
            .insert(self.process_id.as_str(), envelope);
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut registry = lock(&self.registry);
        registry.in_flight.remove(&self.process_id);
        if let Some(state) = registry.states.get_mut(&self.process_id) {
            if !state.is_terminal() {
                debug!(process_id = %self.process_id, "运行在 {} 状态被中断", state);
                *state = WorkflowState::Failed;
            }
        }
        self.metrics.record_workflow_released();
    }
}

/// 分析工作流
pub struct AnalysisWorkflow {
    collaborators: Collaborators,
    retry_policy: RetryPolicy,
    observer: Arc<dyn PipelineObserver>,
    metrics: Arc<MetricsCollector>,
    registry: Arc<Mutex<WorkflowRegistry>>,
}

impl AnalysisWorkflow {
    pub fn new(collaborators: Collaborators) -> Self {
        Self {
            collaborators,
            retry_policy: RetryPolicy::default(),
            observer: Arc::new(NoopObserver),
            metrics: Arc::new(MetricsCollector::new()),
            registry: Arc::new(Mutex::new(WorkflowRegistry::default())),
        }
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn PipelineObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = metrics;
        self
    }

    /// 最多保留多少个流程的最近状态和错误
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.registry = Arc::new(Mutex::new(WorkflowRegistry::with_limit(limit)));
        self
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    /// 流程最近一次运行的状态
    pub fn state(&self, process_id: &str) -> Option<WorkflowState> {
        lock(&self.registry).states.get(process_id).copied()
    }

    /// 流程最近一次失败的错误信息
    pub fn last_error(&self, process_id: &str) -> Option<ErrorEnvelope> {
        lock(&self.registry).last_errors.get(process_id).cloned()
    }

    pub fn is_running(&self, process_id: &str) -> bool {
        lock(&self.registry).in_flight.contains(process_id)
    }

    /// 执行一次分析
    ///
    /// 类型解析失败或同一流程已在运行时直接返回错误，不影响已有运行的状态。
    pub async fn execute(
        &self,
        workflow_type: impl IntoWorkflowType,
        process_id: &str,
        input: &AnalysisInput,
    ) -> AnalysisResult<WorkflowResult> {
        let workflow_type = workflow_type.into_workflow_type()?;
        let guard = self.admit(process_id)?;
        StructuredLogger::log_workflow_started(process_id, workflow_type.as_str());

        let (outcome, elapsed) = timed(
            "analysis_workflow",
            self.run(&guard, workflow_type, process_id, input),
        )
        .await;

        match outcome {
            Ok(result) => {
                guard.transition(WorkflowState::Completed);
                self.metrics
                    .record_workflow_finished(workflow_type.as_str(), true, elapsed.as_secs_f64());
                StructuredLogger::log_workflow_completed(
                    process_id,
                    workflow_type.as_str(),
                    elapsed.as_millis() as u64,
                );
                self.observer.task_completed(process_id, elapsed).await;
                Ok(result)
            }
            Err(error) => {
                let envelope = error.to_envelope();
                guard.fail(envelope.clone());
                self.metrics
                    .record_workflow_finished(workflow_type.as_str(), false, elapsed.as_secs_f64());
                self.metrics.record_workflow_failure(error.error_code());
                StructuredLogger::log_workflow_failed(
                    process_id,
                    workflow_type.as_str(),
                    elapsed.as_millis() as u64,
                    error.error_code(),
                    error.message(),
                );
                self.observer.task_failed(process_id, elapsed, &envelope).await;
                Err(error)
            }
        }
    }

    fn admit(&self, process_id: &str) -> AnalysisResult<InFlightGuard> {
        let mut registry = lock(&self.registry);
        if !registry.in_flight.insert(process_id.to_string()) {
            return Err(AnalysisError::workflow_in_progress(process_id));
        }
        registry.states.insert(process_id, WorkflowState::Received);
        registry.last_errors.remove(process_id);
        self.metrics.record_workflow_started();

        Ok(InFlightGuard {
            registry: Arc::clone(&self.registry),
            metrics: Arc::clone(&self.metrics),
            process_id: process_id.to_string(),
        })
    }

    async fn run(
        &self,
        guard: &InFlightGuard,
        workflow_type: WorkflowType,
        process_id: &str,
        input: &AnalysisInput,
    ) -> AnalysisResult<WorkflowResult> {
        let input = canonical_input(workflow_type, process_id, input)?;

        guard.transition(WorkflowState::Validating);
        InputValidator::check(&input, workflow_type)?;

        guard.transition(WorkflowState::Transforming);
        let context = AnalysisContext::new(process_id, workflow_type, input);

        guard.transition(WorkflowState::Executing);
        let (mut technical, economic, environmental) = try_join3(
            self.analyze(AnalysisDomain::Technical, &context),
            self.analyze(AnalysisDomain::Economic, &context),
            self.analyze(AnalysisDomain::Environmental, &context),
        )
        .await?;

        if let Some(effectiveness) = treatment_effectiveness(workflow_type, &context.input) {
            let Some(fields) = technical.as_object_mut() else {
                return Err(AnalysisError::integration("技术分析结果不是对象，无法写入处理效果")
                    .with_detail("process_id", process_id));
            };
            fields.insert("treatment_effectiveness".to_string(), Value::from(effectiveness));
        }

        guard.transition(WorkflowState::ResultValidating);
        let timestamp = Utc::now();
        let output = map_results(workflow_type, process_id, &technical, timestamp);
        validate_output(&output)?;

        Ok(WorkflowResult {
            process_id: process_id.to_string(),
            workflow_type,
            status: WorkflowState::Completed,
            timestamp,
            technical_results: technical,
            economic_results: economic,
            environmental_results: environmental,
            output,
        })
    }

    async fn analyze(
        &self,
        domain: AnalysisDomain,
        context: &AnalysisContext,
    ) -> AnalysisResult<Value> {
        let analyzer = self.collaborators.get(domain);
        let operation = format!("{domain}_analysis");
        with_retry(&self.retry_policy, &operation, move || {
            analyzer.analyze(context)
        })
        .await
    }
}
