use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::debug;

use crate::errors::{AnalysisError, AnalysisResult};

/// 工艺流程类型
///
/// 系统支持的三种蛋白质提取工艺：基线工艺、射频（RF）处理、红外（IR）处理。
/// 字符串形式只在解析边界出现，内部一律使用枚举。
///
/// # 使用示例
///
/// ```rust
/// use analysis_core::models::WorkflowType;
///
/// let workflow_type = WorkflowType::from_string("  RF_Treatment ").unwrap();
/// assert_eq!(workflow_type, WorkflowType::RfTreatment);
/// assert_eq!(workflow_type.as_str(), "rf_treatment");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum WorkflowType {
    Baseline,
    RfTreatment,
    IrTreatment,
}

impl WorkflowType {
    pub const ALL: [WorkflowType; 3] = [
        WorkflowType::Baseline,
        WorkflowType::RfTreatment,
        WorkflowType::IrTreatment,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowType::Baseline => "baseline",
            WorkflowType::RfTreatment => "rf_treatment",
            WorkflowType::IrTreatment => "ir_treatment",
        }
    }

    /// 所有流程类型的字符串标签，顺序固定
    pub fn values() -> Vec<&'static str> {
        Self::ALL.iter().map(|t| t.as_str()).collect()
    }

    /// 大小写不敏感地解析流程类型，前后空白会被忽略
    pub fn from_string(value: &str) -> AnalysisResult<Self> {
        let normalized = value.trim().to_lowercase();
        debug!("解析流程类型 '{}' -> '{}'", value, normalized);

        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| AnalysisError::invalid_workflow_type(value, &Self::values()))
    }
}

impl fmt::Display for WorkflowType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkflowType {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_string(s)
    }
}

impl TryFrom<&str> for WorkflowType {
    type Error = AnalysisError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::from_string(value)
    }
}

impl TryFrom<String> for WorkflowType {
    type Error = AnalysisError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_string(&value)
    }
}

impl Serialize for WorkflowType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for WorkflowType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::from_string(&raw).map_err(serde::de::Error::custom)
    }
}

/// 接受枚举或字符串形式的流程类型
///
/// 工作流和编排器的入口统一通过此 trait 归一化类型参数。
pub trait IntoWorkflowType {
    fn into_workflow_type(self) -> AnalysisResult<WorkflowType>;
}

impl IntoWorkflowType for WorkflowType {
    fn into_workflow_type(self) -> AnalysisResult<WorkflowType> {
        Ok(self)
    }
}

impl IntoWorkflowType for &str {
    fn into_workflow_type(self) -> AnalysisResult<WorkflowType> {
        WorkflowType::from_string(self)
    }
}

impl IntoWorkflowType for String {
    fn into_workflow_type(self) -> AnalysisResult<WorkflowType> {
        WorkflowType::from_string(&self)
    }
}

impl IntoWorkflowType for &String {
    fn into_workflow_type(self) -> AnalysisResult<WorkflowType> {
        WorkflowType::from_string(self)
    }
}
