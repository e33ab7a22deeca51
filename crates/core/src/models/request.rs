use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::task::SchedulePriority;
use super::workflow_type::WorkflowType;

/// 分析请求
///
/// 由调用方创建，提交后不可变。`input` 既可以是规范化的嵌套输入
/// （technical / economic / environmental 三个分区），也可以是类型化的工艺记录。
///
/// # 示例
///
/// ```rust
/// use analysis_core::models::{AnalysisRequest, WorkflowType};
/// use serde_json::json;
///
/// let request = AnalysisRequest::new(
///     WorkflowType::Baseline,
///     "baseline-001",
///     json!({"technical": {"process_parameters": {"feed_rate": 50.0}}}),
/// );
/// assert!(request.schedule_time.is_none());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub workflow_type: WorkflowType,
    pub process_id: String,
    #[serde(flatten)]
    pub input: AnalysisInput,
    #[serde(default)]
    pub schedule_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub priority: Option<SchedulePriority>,
    /// 重复间隔，序列化为秒数
    #[serde(default, with = "duration_secs")]
    pub repeat_interval: Option<Duration>,
}

impl AnalysisRequest {
    pub fn new(workflow_type: WorkflowType, process_id: impl Into<String>, input_data: Value) -> Self {
        Self {
            workflow_type,
            process_id: process_id.into(),
            input: AnalysisInput::Data(input_data),
            schedule_time: None,
            priority: None,
            repeat_interval: None,
        }
    }

    pub fn from_record(process_id: impl Into<String>, record: ProcessRecord) -> Self {
        Self {
            workflow_type: record.workflow_type(),
            process_id: process_id.into(),
            input: AnalysisInput::Record(record),
            schedule_time: None,
            priority: None,
            repeat_interval: None,
        }
    }

    pub fn with_schedule_time(mut self, schedule_time: DateTime<Utc>) -> Self {
        self.schedule_time = Some(schedule_time);
        self
    }

    pub fn with_priority(mut self, priority: SchedulePriority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_repeat_interval(mut self, repeat_interval: Duration) -> Self {
        self.repeat_interval = Some(repeat_interval);
        self
    }

    /// 是否为延迟/周期执行的请求
    pub fn is_deferred(&self) -> bool {
        self.schedule_time.is_some() || self.repeat_interval.is_some()
    }
}

/// 分析输入
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AnalysisInput {
    #[serde(rename = "input_data")]
    Data(Value),
    #[serde(rename = "record")]
    Record(ProcessRecord),
}

/// 类型化的工艺记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "process_type", rename_all = "snake_case")]
pub enum ProcessRecord {
    Baseline(BaselineRecord),
    RfTreatment(RfTreatmentRecord),
    IrTreatment(IrTreatmentRecord),
}

impl ProcessRecord {
    pub fn workflow_type(&self) -> WorkflowType {
        match self {
            ProcessRecord::Baseline(_) => WorkflowType::Baseline,
            ProcessRecord::RfTreatment(_) => WorkflowType::RfTreatment,
            ProcessRecord::IrTreatment(_) => WorkflowType::IrTreatment,
        }
    }

    pub fn recorded_at(&self) -> DateTime<Utc> {
        match self {
            ProcessRecord::Baseline(r) => r.recorded_at,
            ProcessRecord::RfTreatment(r) => r.recorded_at,
            ProcessRecord::IrTreatment(r) => r.recorded_at,
        }
    }
}

/// 基线工艺记录（空气分级）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineRecord {
    /// 进料速率 kg/h
    pub feed_rate: f64,
    /// 风量 m³/h
    pub air_flow_rate: f64,
    /// 分级轮转速 rpm
    pub classifier_speed: f64,
    pub temperature: f64,
    pub humidity: f64,
    pub pressure: f64,
    #[serde(default = "Utc::now")]
    pub recorded_at: DateTime<Utc>,
}

/// RF处理工艺记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RfTreatmentRecord {
    /// 功率 kW
    pub power: f64,
    /// 频率 MHz
    #[serde(default = "default_rf_frequency")]
    pub frequency: f64,
    /// 处理时间 min
    pub treatment_time: f64,
    pub moisture_content: f64,
    pub dielectric_constant: f64,
    pub loss_factor: f64,
    #[serde(default = "Utc::now")]
    pub recorded_at: DateTime<Utc>,
}

/// IR处理工艺记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IrTreatmentRecord {
    /// 功率密度 kW/m²
    pub power_density: f64,
    /// 波长 μm
    pub wavelength: f64,
    pub treatment_time: f64,
    pub surface_temperature: f64,
    pub moisture_content: f64,
    #[serde(default = "Utc::now")]
    pub recorded_at: DateTime<Utc>,
}

fn default_rf_frequency() -> f64 {
    27.12
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(duration) => serializer.serialize_some(&duration.as_secs_f64()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Duration>, D::Error> {
        let seconds = Option::<f64>::deserialize(deserializer)?;
        match seconds {
            Some(s) if s.is_finite() && s > 0.0 => Ok(Some(Duration::from_secs_f64(s))),
            Some(s) => Err(serde::de::Error::custom(format!(
                "repeat_interval must be a positive number of seconds, got {s}"
            ))),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_data_request() {
        let request: AnalysisRequest = serde_json::from_value(json!({
            "workflow_type": "BASELINE",
            "process_id": "test_baseline_001",
            "input_data": {"technical": {"process_parameters": {"feed_rate": 50.0}}},
            "priority": "high",
            "repeat_interval": 300
        }))
        .unwrap();

        assert_eq!(request.workflow_type, WorkflowType::Baseline);
        assert_eq!(request.priority, Some(SchedulePriority::High));
        assert_eq!(request.repeat_interval, Some(Duration::from_secs(300)));
        assert!(request.is_deferred());
        match request.input {
            AnalysisInput::Data(data) => {
                assert_eq!(data["technical"]["process_parameters"]["feed_rate"], 50.0)
            }
            AnalysisInput::Record(_) => panic!("expected raw input data"),
        }
    }

    #[test]
    fn test_deserialize_record_request() {
        let request: AnalysisRequest = serde_json::from_value(json!({
            "workflow_type": "rf_treatment",
            "process_id": "test_rf_001",
            "record": {
                "process_type": "rf_treatment",
                "power": 3.0,
                "treatment_time": 5.0,
                "moisture_content": 12.0,
                "dielectric_constant": 4.5,
                "loss_factor": 0.8
            }
        }))
        .unwrap();

        match &request.input {
            AnalysisInput::Record(ProcessRecord::RfTreatment(record)) => {
                assert_eq!(record.frequency, 27.12);
            }
            other => panic!("unexpected input: {other:?}"),
        }
        assert!(!request.is_deferred());
    }

    #[test]
    fn test_invalid_repeat_interval_rejected() {
        let result = serde_json::from_value::<AnalysisRequest>(json!({
            "workflow_type": "baseline",
            "process_id": "p",
            "input_data": {},
            "repeat_interval": -5
        }));
        assert!(result.is_err());
    }
}
