use std::any::Any;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// 错误类别
///
/// 每个类别对应一个固定的 `error_code`，调用方依据错误码分支处理，
/// 而不是解析错误消息。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    InvalidWorkflowType,
    Validation,
    TechnicalAnalysis,
    EconomicAnalysis,
    EnvironmentalAnalysis,
    Integration,
    TaskNotFound,
    WorkflowInProgress,
    Configuration,
    Unknown,
}

impl ErrorKind {
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::InvalidWorkflowType => "INVALID_WORKFLOW_TYPE",
            ErrorKind::Validation => "VALIDATION_ERROR",
            ErrorKind::TechnicalAnalysis => "TECHNICAL_ANALYSIS_ERROR",
            ErrorKind::EconomicAnalysis => "ECONOMIC_ANALYSIS_ERROR",
            ErrorKind::EnvironmentalAnalysis => "ENVIRONMENTAL_ANALYSIS_ERROR",
            ErrorKind::Integration => "INTEGRATION_ERROR",
            ErrorKind::TaskNotFound => "TASK_NOT_FOUND",
            ErrorKind::WorkflowInProgress => "WORKFLOW_IN_PROGRESS",
            ErrorKind::Configuration => "CONFIGURATION_ERROR",
            ErrorKind::Unknown => "UNKNOWN_ERROR",
        }
    }

    /// 是否属于可重试的瞬时错误
    ///
    /// 输入校验、类型解析、集成映射等错误在任何副作用发生前抛出，重试没有意义。
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorKind::TechnicalAnalysis
                | ErrorKind::EconomicAnalysis
                | ErrorKind::EnvironmentalAnalysis
                | ErrorKind::Unknown
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// 分析错误
///
/// 携带错误类别、消息、结构化细节和发生时间。
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct AnalysisError {
    kind: ErrorKind,
    message: String,
    details: Map<String, Value>,
    timestamp: DateTime<Utc>,
}

impl AnalysisError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: Map::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn invalid_workflow_type(value: &str, valid: &[&str]) -> Self {
        Self::new(
            ErrorKind::InvalidWorkflowType,
            format!("Invalid workflow type: '{value}'. Valid types are: {valid:?}"),
        )
        .with_detail("value", value)
        .with_detail("valid_types", valid.to_vec())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    pub fn technical(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TechnicalAnalysis, message)
    }

    pub fn economic(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::EconomicAnalysis, message)
    }

    pub fn environmental(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::EnvironmentalAnalysis, message)
    }

    pub fn integration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Integration, message)
    }

    pub fn task_not_found(task_id: &str) -> Self {
        Self::new(ErrorKind::TaskNotFound, format!("任务未找到: {task_id}"))
            .with_detail("task_id", task_id)
    }

    pub fn workflow_in_progress(process_id: &str) -> Self {
        Self::new(
            ErrorKind::WorkflowInProgress,
            format!("流程 {process_id} 已有正在执行的分析"),
        )
        .with_detail("process_id", process_id)
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unknown, message)
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn error_code(&self) -> &'static str {
        self.kind.code()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn details(&self) -> &Map<String, Value> {
        &self.details
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }

    pub fn to_envelope(&self) -> ErrorEnvelope {
        ErrorEnvelope {
            error_code: self.error_code().to_string(),
            message: self.message.clone(),
            details: self.details.clone(),
            timestamp: self.timestamp,
        }
    }
}

impl From<serde_json::Error> for AnalysisError {
    fn from(error: serde_json::Error) -> Self {
        AnalysisError::integration(format!("序列化错误: {error}"))
    }
}

/// 统一的错误响应结构
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub error_code: String,
    pub message: String,
    pub details: Map<String, Value>,
    pub timestamp: DateTime<Utc>,
}

impl ErrorEnvelope {
    /// 包装为 `{"error": {...}}` 形式的响应
    pub fn into_response(self) -> Value {
        let mut response = Map::new();
        response.insert(
            "error".to_string(),
            serde_json::to_value(&self).unwrap_or(Value::Null),
        );
        Value::Object(response)
    }
}

impl From<&AnalysisError> for ErrorEnvelope {
    fn from(error: &AnalysisError) -> Self {
        error.to_envelope()
    }
}

/// 将任意错误转换为统一的错误响应
///
/// 已知的 `AnalysisError` 保留其错误码、细节和时间戳；其余错误统一归为
/// `UNKNOWN_ERROR`，并在 `details.type` 中记录具体类型名。
pub fn to_envelope<E>(error: &E) -> ErrorEnvelope
where
    E: std::error::Error + 'static,
{
    if let Some(analysis_error) = (error as &dyn Any).downcast_ref::<AnalysisError>() {
        return analysis_error.to_envelope();
    }
    unknown_envelope(error.to_string(), std::any::type_name::<E>())
}

/// `anyhow::Error` 的转换入口，优先取出内部的 `AnalysisError`
pub fn envelope_from_anyhow(error: &anyhow::Error) -> ErrorEnvelope {
    match error.downcast_ref::<AnalysisError>() {
        Some(analysis_error) => analysis_error.to_envelope(),
        None => unknown_envelope(error.to_string(), "anyhow::Error"),
    }
}

fn unknown_envelope(message: String, type_name: &str) -> ErrorEnvelope {
    let short_name = type_name.rsplit("::").next().unwrap_or(type_name);
    let mut details = Map::new();
    details.insert("type".to_string(), Value::String(short_name.to_string()));
    ErrorEnvelope {
        error_code: ErrorKind::Unknown.code().to_string(),
        message,
        details,
        timestamp: Utc::now(),
    }
}

/// 统一的Result类型
pub type AnalysisResult<T> = std::result::Result<T, AnalysisError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_are_stable() {
        assert_eq!(AnalysisError::technical("x").error_code(), "TECHNICAL_ANALYSIS_ERROR");
        assert_eq!(AnalysisError::economic("x").error_code(), "ECONOMIC_ANALYSIS_ERROR");
        assert_eq!(
            AnalysisError::environmental("x").error_code(),
            "ENVIRONMENTAL_ANALYSIS_ERROR"
        );
        assert_eq!(AnalysisError::integration("x").error_code(), "INTEGRATION_ERROR");
        assert_eq!(AnalysisError::validation("x").error_code(), "VALIDATION_ERROR");
        assert_eq!(AnalysisError::task_not_found("t-1").error_code(), "TASK_NOT_FOUND");
    }

    #[test]
    fn test_typed_error_envelope_keeps_details() {
        let error = AnalysisError::validation("Missing required field: feed_rate")
            .with_detail("field", "feed_rate");
        let envelope = to_envelope(&error);

        assert_eq!(envelope.error_code, "VALIDATION_ERROR");
        assert_eq!(envelope.message, "Missing required field: feed_rate");
        assert_eq!(envelope.details["field"], "feed_rate");
        assert_eq!(envelope.timestamp, error.timestamp());
    }

    #[test]
    fn test_foreign_error_becomes_unknown() {
        let error = std::io::Error::new(std::io::ErrorKind::Other, "disk on fire");
        let envelope = to_envelope(&error);

        assert_eq!(envelope.error_code, "UNKNOWN_ERROR");
        assert_eq!(envelope.message, "disk on fire");
        assert_eq!(envelope.details["type"], "Error");
    }

    #[test]
    fn test_anyhow_error_unwraps_typed_error() {
        let error: anyhow::Error = AnalysisError::economic("npv failed").into();
        assert_eq!(envelope_from_anyhow(&error).error_code, "ECONOMIC_ANALYSIS_ERROR");

        let plain = anyhow::anyhow!("boom");
        let envelope = envelope_from_anyhow(&plain);
        assert_eq!(envelope.error_code, "UNKNOWN_ERROR");
        assert_eq!(envelope.details["type"], "anyhow::Error");
    }

    #[test]
    fn test_envelope_response_shape() {
        let response = AnalysisError::integration("mismatch").to_envelope().into_response();
        assert_eq!(response["error"]["error_code"], "INTEGRATION_ERROR");
        assert_eq!(response["error"]["message"], "mismatch");
    }

    #[test]
    fn test_retryability() {
        assert!(AnalysisError::technical("x").is_retryable());
        assert!(!AnalysisError::validation("x").is_retryable());
        assert!(!AnalysisError::invalid_workflow_type("foo", &["baseline"]).is_retryable());
        assert!(!AnalysisError::integration("x").is_retryable());
    }
}
