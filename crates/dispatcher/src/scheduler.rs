//! 分析任务调度器
//!
//! 延迟任务和周期任务保存在内存中，按固定周期扫描到期任务并并发启动。
//! 同一个任务同时最多只有一个执行实例。

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use analysis_core::config::SchedulerConfig;
use analysis_core::errors::{AnalysisError, AnalysisResult, ErrorKind};
use analysis_core::history::BoundedHistory;
use analysis_core::models::{
    AnalysisRequest, SchedulePriority, ScheduledTask, TaskFilter, TaskStatus, TaskSummary,
};
use analysis_core::traits::{NoopObserver, PipelineObserver, TaskRunner};
use analysis_infrastructure::{MetricsCollector, StructuredLogger};
use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::{AbortHandle, JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// 正在执行的任务
struct RunningTask {
    task: ScheduledTask,
    token: CancellationToken,
}

pub struct AnalysisScheduler {
    runner: Arc<dyn TaskRunner>,
    observer: Arc<dyn PipelineObserver>,
    metrics: Arc<MetricsCollector>,
    tick_interval: Duration,
    tasks: Arc<RwLock<HashMap<String, ScheduledTask>>>,
    running: Arc<RwLock<HashMap<String, RunningTask>>>,
    history: Arc<RwLock<BoundedHistory<TaskStatus>>>,
    supervisors: Mutex<JoinSet<()>>,
}

impl AnalysisScheduler {
    pub fn new(runner: Arc<dyn TaskRunner>, tick_interval: Duration) -> Self {
        Self {
            runner,
            observer: Arc::new(NoopObserver),
            metrics: Arc::new(MetricsCollector::new()),
            tick_interval,
            tasks: Arc::new(RwLock::new(HashMap::new())),
            running: Arc::new(RwLock::new(HashMap::new())),
            history: Arc::new(RwLock::new(BoundedHistory::default())),
            supervisors: Mutex::new(JoinSet::new()),
        }
    }

    pub fn from_config(config: &SchedulerConfig, runner: Arc<dyn TaskRunner>) -> Self {
        Self::new(runner, config.tick_interval()).with_history_limit(config.history_limit)
    }

    /// 最多保留多少个任务的最近执行结果
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history = Arc::new(RwLock::new(BoundedHistory::new(limit)));
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

    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    /// 登记一个调度任务，返回任务 ID
    ///
    /// 执行时间缺省为当前时间，优先级缺省为 `Medium`。
    pub async fn schedule(&self, request: AnalysisRequest) -> AnalysisResult<String> {
        if request.process_id.trim().is_empty() {
            return Err(AnalysisError::validation("process_id 不能为空")
                .with_detail("field", "process_id"));
        }

        let task_id = Uuid::new_v4().to_string();
        let task = ScheduledTask::from_request(task_id.clone(), request, Utc::now());

        StructuredLogger::log_task_scheduled(
            &task.id,
            &task.process_id,
            task.analysis_type.as_str(),
            task.priority.as_str(),
            task.next_run,
            task.repeat_interval.map(|d| d.as_secs_f64()),
        );

        self.tasks.write().await.insert(task_id.clone(), task);
        Ok(task_id)
    }

    /// 以当前时间执行一次调度
    pub async fn tick(&self) -> Vec<String> {
        self.tick_at(Utc::now()).await
    }

    /// 启动所有在 `now` 之前到期且未在执行的任务，返回按启动顺序排列的任务 ID
    ///
    /// 到期任务在同一次持锁中移出待执行表并登记为执行中，
    /// 取消和查询不会看到任务同时不在两张表中的中间状态。
    pub async fn tick_at(&self, now: DateTime<Utc>) -> Vec<String> {
        // 加锁顺序: supervisors -> running -> tasks -> history
        let mut supervisors = self.supervisors.lock().await;
        let mut running = self.running.write().await;
        let mut tasks = self.tasks.write().await;

        let mut due: Vec<(String, SchedulePriority, DateTime<Utc>)> = tasks
            .values()
            .filter(|task| task.is_due(now) && !running.contains_key(&task.id))
            .map(|task| (task.id.clone(), task.priority, task.next_run))
            .collect();
        due.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)).then(a.0.cmp(&b.0)));

        let mut launched_ids = Vec::with_capacity(due.len());
        for (task_id, _, _) in due {
            let snapshot = match tasks.get_mut(&task_id) {
                Some(task) if task.is_recurring() => {
                    task.mark_launched(now);
                    task.clone()
                }
                Some(_) => match tasks.remove(&task_id) {
                    Some(mut task) => {
                        task.mark_launched(now);
                        task
                    }
                    None => continue,
                },
                None => continue,
            };
            self.launch(&mut supervisors, &mut running, snapshot);
            launched_ids.push(task_id);
        }

        // 回收已结束的执行
        while supervisors.try_join_next().is_some() {}

        let pending = tasks.len();
        let running_count = running.len();
        drop(tasks);
        drop(running);
        drop(supervisors);

        self.observer.queue_size(pending).await;
        self.metrics
            .record_scheduler_tick(launched_ids.len(), pending, running_count);

        if launched_ids.is_empty() {
            debug!("本次调度没有到期任务，待执行 {} 个", pending);
        } else {
            info!(
                "本次调度启动了 {} 个任务，待执行 {} 个，执行中 {} 个",
                launched_ids.len(),
                pending,
                running_count
            );
        }
        launched_ids
    }

    fn launch(
        &self,
        supervisors: &mut JoinSet<()>,
        running: &mut HashMap<String, RunningTask>,
        task: ScheduledTask,
    ) {
        let token = CancellationToken::new();
        StructuredLogger::log_task_launched(&task.id, &task.process_id, task.analysis_type.as_str());
        running.insert(
            task.id.clone(),
            RunningTask {
                task: task.clone(),
                token: token.clone(),
            },
        );
        supervisors.spawn(supervise(
            task,
            token,
            Arc::clone(&self.runner),
            Arc::clone(&self.running),
            Arc::clone(&self.history),
            Arc::clone(&self.metrics),
        ));
    }

    /// 取消任务
    ///
    /// 待执行的任务直接移除；正在执行的任务收到取消信号，由执行方自行结束。
    pub async fn cancel(&self, task_id: &str) -> AnalysisResult<()> {
        let running = self.running.read().await;
        let mut tasks = self.tasks.write().await;

        let was_running = match running.get(task_id) {
            Some(running) => {
                running.token.cancel();
                true
            }
            None => false,
        };
        let was_pending = tasks.remove(task_id).is_some();

        if !was_running && !was_pending {
            warn!("取消失败，任务 {} 不存在", task_id);
            return Err(AnalysisError::task_not_found(task_id));
        }
        if !was_running {
            self.history
                .write()
                .await
                .insert(task_id, TaskStatus::Cancelled);
        }
        drop(tasks);
        drop(running);

        StructuredLogger::log_task_cancelled(task_id, was_running);
        Ok(())
    }

    /// 任务状态：执行中优先，其次待执行，最后是最近一次的执行结果
    pub async fn status(&self, task_id: &str) -> AnalysisResult<TaskStatus> {
        let running = self.running.read().await;
        if running.contains_key(task_id) {
            return Ok(TaskStatus::Running);
        }
        let tasks = self.tasks.read().await;
        if tasks.contains_key(task_id) {
            return Ok(TaskStatus::Pending);
        }
        self.history
            .read()
            .await
            .get(task_id)
            .copied()
            .ok_or_else(|| AnalysisError::task_not_found(task_id))
    }

    /// 保留执行结果的任务数
    pub async fn history_len(&self) -> usize {
        self.history.read().await.len()
    }

    /// 待执行任务的快照
    pub async fn task(&self, task_id: &str) -> Option<ScheduledTask> {
        self.tasks.read().await.get(task_id).cloned()
    }

    /// 列出执行中和待执行的任务
    pub async fn list_tasks(&self, filter: &TaskFilter) -> Vec<TaskSummary> {
        let running = self.running.read().await;
        let tasks = self.tasks.read().await;

        let mut summaries: Vec<TaskSummary> = running
            .values()
            .map(|r| r.task.summary(TaskStatus::Running))
            .chain(
                tasks
                    .values()
                    .filter(|t| !running.contains_key(&t.id))
                    .map(|t| t.summary(TaskStatus::Pending)),
            )
            .filter(|summary| filter.matches(summary))
            .collect();
        summaries.sort_by(|a, b| a.next_run.cmp(&b.next_run).then(a.task_id.cmp(&b.task_id)));
        summaries
    }

    pub async fn pending_count(&self) -> usize {
        self.tasks.read().await.len()
    }

    pub async fn running_count(&self) -> usize {
        self.running.read().await.len()
    }

    /// 按固定周期调度，直到收到关闭信号
    pub fn start(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.tick_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            info!("调度器已启动，调度周期 {:?}", self.tick_interval);

            loop {
                tokio::select! {
                    _ = shutdown.recv() => {
                        info!("调度器收到关闭信号");
                        break;
                    }
                    _ = interval.tick() => {
                        self.tick().await;
                    }
                }
            }

            self.stop(Duration::from_secs(5)).await;
        })
    }

    /// 取消所有执行中的任务并等待其结束
    pub async fn stop(&self, grace: Duration) {
        let cancelled = {
            let running = self.running.read().await;
            for task in running.values() {
                task.token.cancel();
            }
            running.len()
        };
        if cancelled > 0 {
            info!("停止调度器，取消 {} 个执行中的任务", cancelled);
        }

        let mut supervisors = self.supervisors.lock().await;
        let drained = tokio::time::timeout(grace, async {
            while supervisors.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            warn!("等待执行中的任务结束超时 ({:?})", grace);
            supervisors.abort_all();
            while supervisors.join_next().await.is_some() {}

            // 被中止的监督任务没有机会清理执行记录
            let abandoned: Vec<String> = self
                .running
                .write()
                .await
                .drain()
                .map(|(task_id, _)| task_id)
                .collect();
            if !abandoned.is_empty() {
                let mut history = self.history.write().await;
                for task_id in abandoned {
                    history.insert(task_id, TaskStatus::Cancelled);
                }
            }
            self.metrics.update_running_tasks(0);
        }
    }
}

/// 监督任务被丢弃时一并中止它启动的执行
struct AbortOnDrop(AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// 执行一个任务并在结束后清理执行记录
///
/// 执行本身放在独立的 tokio 任务中，panic 只会表现为执行失败。
async fn supervise(
    task: ScheduledTask,
    token: CancellationToken,
    runner: Arc<dyn TaskRunner>,
    running: Arc<RwLock<HashMap<String, RunningTask>>>,
    history: Arc<RwLock<BoundedHistory<TaskStatus>>>,
    metrics: Arc<MetricsCollector>,
) {
    let task_id = task.id.clone();
    let execution = tokio::spawn(async move { runner.run(&task).await });
    let execution_guard = AbortOnDrop(execution.abort_handle());

    let (status, error_code) = tokio::select! {
        _ = token.cancelled() => {
            execution_guard.0.abort();
            (TaskStatus::Cancelled, None)
        }
        joined = execution => match joined {
            Ok(Ok(_)) => (TaskStatus::Completed, None),
            Ok(Err(error)) => (TaskStatus::Failed, Some(error.error_code())),
            Err(join_error) => {
                StructuredLogger::log_system_error("scheduler", "run_task", &join_error);
                (TaskStatus::Failed, Some(ErrorKind::Unknown.code()))
            }
        },
    };

    // 先记录结果再移除执行记录，查询状态时不会出现空档
    history.write().await.insert(task_id.as_str(), status);
    let remaining = {
        let mut running = running.write().await;
        running.remove(&task_id);
        running.len()
    };
    metrics.update_running_tasks(remaining);

    StructuredLogger::log_task_finished(&task_id, &status.to_string(), error_code);
}
