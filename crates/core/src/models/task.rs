use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::request::{AnalysisInput, AnalysisRequest};
use super::workflow_type::WorkflowType;
use crate::errors::AnalysisError;

/// 调度优先级
///
/// 同一次调度周期内，优先级高的任务先启动。排序关系为 `Low < Medium < High`。
///
/// # 使用示例
///
/// ```rust
/// use analysis_core::models::SchedulePriority;
///
/// let priority: SchedulePriority = "HIGH".parse().unwrap();
/// assert!(priority > SchedulePriority::Medium);
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum SchedulePriority {
    Low = 1,
    #[default]
    Medium = 2,
    High = 3,
}

impl SchedulePriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            SchedulePriority::Low => "low",
            SchedulePriority::Medium => "medium",
            SchedulePriority::High => "high",
        }
    }
}

impl fmt::Display for SchedulePriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SchedulePriority {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(SchedulePriority::Low),
            "medium" => Ok(SchedulePriority::Medium),
            "high" => Ok(SchedulePriority::High),
            other => Err(AnalysisError::validation(format!("无效的调度优先级: {other}"))
                .with_detail("value", s)),
        }
    }
}

/// 调度任务
///
/// 由调度器持有。周期任务每次启动后原地更新 `last_run` / `next_run`，
/// 一次性任务启动后即从待执行队列中移除。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledTask {
    pub id: String,
    pub process_id: String,
    pub analysis_type: WorkflowType,
    pub input: AnalysisInput,
    pub schedule_time: DateTime<Utc>,
    pub priority: SchedulePriority,
    pub repeat_interval: Option<Duration>,
    pub last_run: Option<DateTime<Utc>>,
    pub next_run: DateTime<Utc>,
}

impl ScheduledTask {
    /// 由请求创建任务，执行时间缺省为 `now`，优先级缺省为 `Medium`
    pub fn from_request(id: impl Into<String>, request: AnalysisRequest, now: DateTime<Utc>) -> Self {
        let schedule_time = request.schedule_time.unwrap_or(now);
        Self {
            id: id.into(),
            process_id: request.process_id,
            analysis_type: request.workflow_type,
            input: request.input,
            schedule_time,
            priority: request.priority.unwrap_or_default(),
            repeat_interval: request.repeat_interval,
            last_run: None,
            next_run: schedule_time,
        }
    }

    pub fn is_recurring(&self) -> bool {
        self.repeat_interval.is_some()
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_run <= now
    }

    /// 记录一次启动，周期任务推进下一次执行时间
    pub fn mark_launched(&mut self, now: DateTime<Utc>) {
        self.last_run = Some(now);
        if let Some(interval) = self.repeat_interval {
            let step = chrono::Duration::from_std(interval)
                .unwrap_or_else(|_| chrono::Duration::seconds(i64::from(u32::MAX)));
            self.next_run = now + step;
        }
    }

    pub fn summary(&self, status: TaskStatus) -> TaskSummary {
        TaskSummary {
            task_id: self.id.clone(),
            process_id: self.process_id.clone(),
            analysis_type: self.analysis_type,
            priority: self.priority,
            status,
            schedule_time: self.schedule_time,
            next_run: self.next_run,
            last_run: self.last_run,
            repeat_interval_seconds: self.repeat_interval.map(|d| d.as_secs_f64()),
        }
    }
}

/// 任务状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// 任务列表项
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSummary {
    pub task_id: String,
    pub process_id: String,
    pub analysis_type: WorkflowType,
    pub priority: SchedulePriority,
    pub status: TaskStatus,
    pub schedule_time: DateTime<Utc>,
    pub next_run: DateTime<Utc>,
    pub last_run: Option<DateTime<Utc>>,
    pub repeat_interval_seconds: Option<f64>,
}

/// 任务列表过滤条件，字段为空表示不过滤
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub analysis_type: Option<WorkflowType>,
    pub process_id: Option<String>,
}

impl TaskFilter {
    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_analysis_type(mut self, analysis_type: WorkflowType) -> Self {
        self.analysis_type = Some(analysis_type);
        self
    }

    pub fn matches(&self, summary: &TaskSummary) -> bool {
        self.status.map_or(true, |s| s == summary.status)
            && self.analysis_type.map_or(true, |t| t == summary.analysis_type)
            && self
                .process_id
                .as_deref()
                .map_or(true, |p| p == summary.process_id)
    }
}
