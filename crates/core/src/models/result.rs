use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::workflow_type::WorkflowType;

/// 工作流状态
///
/// 严格单向推进，失败后不可恢复：
///
/// ```text
/// Received → Validating → Transforming → Executing → ResultValidating → Completed
///     └──────────┴────────────┴─────────────┴──────────────┴──────────→ Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    Received,
    Validating,
    Transforming,
    Executing,
    ResultValidating,
    Completed,
    Failed,
}

impl WorkflowState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkflowState::Completed | WorkflowState::Failed)
    }

    /// 流转顺序，`Failed` 可以从任意非终止状态进入
    fn rank(&self) -> u8 {
        match self {
            WorkflowState::Received => 0,
            WorkflowState::Validating => 1,
            WorkflowState::Transforming => 2,
            WorkflowState::Executing => 3,
            WorkflowState::ResultValidating => 4,
            WorkflowState::Completed | WorkflowState::Failed => 5,
        }
    }

    pub fn can_transition_to(&self, next: WorkflowState) -> bool {
        if self.is_terminal() {
            return false;
        }
        next == WorkflowState::Failed || next.rank() == self.rank() + 1
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WorkflowState::Received => "received",
            WorkflowState::Validating => "validating",
            WorkflowState::Transforming => "transforming",
            WorkflowState::Executing => "executing",
            WorkflowState::ResultValidating => "result_validating",
            WorkflowState::Completed => "completed",
            WorkflowState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// 一次分析运行的结果，返回后不再修改
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowResult {
    pub process_id: String,
    pub workflow_type: WorkflowType,
    pub status: WorkflowState,
    pub timestamp: DateTime<Utc>,
    pub technical_results: Value,
    pub economic_results: Value,
    pub environmental_results: Value,
    /// 按流程类型映射后的持久化结构
    pub output: Map<String, Value>,
}

impl WorkflowResult {
    pub fn treatment_effectiveness(&self) -> Option<f64> {
        self.technical_results
            .get("treatment_effectiveness")
            .and_then(Value::as_f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_transitions_only() {
        use WorkflowState::*;
        assert!(Received.can_transition_to(Validating));
        assert!(Validating.can_transition_to(Transforming));
        assert!(Executing.can_transition_to(ResultValidating));
        assert!(ResultValidating.can_transition_to(Completed));
        assert!(Executing.can_transition_to(Failed));

        assert!(!Received.can_transition_to(Executing));
        assert!(!Executing.can_transition_to(Validating));
        assert!(!Completed.can_transition_to(Failed));
        assert!(!Failed.can_transition_to(Received));
    }
}
