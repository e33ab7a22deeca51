//! 工艺记录与分析输入、分析结果与持久化结构之间的转换

use analysis_core::errors::{AnalysisError, AnalysisResult};
use analysis_core::models::{
    AnalysisInput, BaselineRecord, IrTreatmentRecord, ProcessRecord, RfTreatmentRecord,
    WorkflowType,
};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Map, Value};

use crate::effectiveness::MAX_EFFECTIVENESS;

/// `technical_results` 字段到输出字段的映射
pub type FieldMapping = &'static [(&'static str, &'static str)];

const BASELINE_MAPPING: FieldMapping = &[
    ("protein_recovery", "protein_yield"),
    ("separation_efficiency", "separation_efficiency"),
    ("feed_rate_actual", "feed_rate"),
    ("air_flow_actual", "air_flow_rate"),
    ("classifier_efficiency", "classifier_speed"),
];

const RF_MAPPING: FieldMapping = &[
    ("final_moisture", "moisture_content"),
    ("power_efficiency", "power"),
    ("treatment_effectiveness", "treatment_effectiveness"),
    ("dielectric_response", "dielectric_constant"),
];

const IR_MAPPING: FieldMapping = &[
    ("final_moisture", "moisture_content"),
    ("surface_temp_actual", "surface_temperature"),
    ("treatment_effectiveness", "treatment_effectiveness"),
    ("power_density_actual", "power_density"),
];

pub fn field_mapping(workflow_type: WorkflowType) -> FieldMapping {
    match workflow_type {
        WorkflowType::Baseline => BASELINE_MAPPING,
        WorkflowType::RfTreatment => RF_MAPPING,
        WorkflowType::IrTreatment => IR_MAPPING,
    }
}

/// 把请求输入转换为规范化的嵌套结构
///
/// 类型化记录必须与流程类型一致，否则返回集成错误。
pub fn canonical_input(
    workflow_type: WorkflowType,
    process_id: &str,
    input: &AnalysisInput,
) -> AnalysisResult<Value> {
    match input {
        AnalysisInput::Data(data) => Ok(data.clone()),
        AnalysisInput::Record(record) => {
            let record_type = record.workflow_type();
            if record_type != workflow_type {
                return Err(AnalysisError::integration(format!(
                    "记录类型 {record_type} 与流程类型 {workflow_type} 不匹配"
                ))
                .with_detail("record_type", record_type.as_str())
                .with_detail("workflow_type", workflow_type.as_str()));
            }
            Ok(record_to_input(process_id, record))
        }
    }
}

pub fn record_to_input(process_id: &str, record: &ProcessRecord) -> Value {
    let technical = match record {
        ProcessRecord::Baseline(r) => baseline_technical(r),
        ProcessRecord::RfTreatment(r) => rf_treatment_technical(r),
        ProcessRecord::IrTreatment(r) => ir_treatment_technical(r),
    };
    json!({
        "technical": technical,
        "metadata": metadata(process_id, record.recorded_at(), record.workflow_type())
    })
}

fn baseline_technical(record: &BaselineRecord) -> Value {
    json!({
        "process_parameters": {
            "feed_rate": record.feed_rate,
            "air_flow_rate": record.air_flow_rate,
            "classifier_speed": record.classifier_speed
        },
        "process_conditions": {
            "temperature": record.temperature,
            "humidity": record.humidity,
            "pressure": record.pressure
        }
    })
}

fn rf_treatment_technical(record: &RfTreatmentRecord) -> Value {
    json!({
        "material_properties": {
            "moisture_content": record.moisture_content,
            "dielectric_properties": {
                "constant": record.dielectric_constant,
                "loss_factor": record.loss_factor
            }
        },
        "rf_parameters": {
            "power": record.power,
            "frequency": record.frequency,
            "treatment_time": record.treatment_time
        }
    })
}

fn ir_treatment_technical(record: &IrTreatmentRecord) -> Value {
    json!({
        "material_properties": {
            "moisture_content": record.moisture_content,
            "surface_temperature": record.surface_temperature
        },
        "ir_parameters": {
            "power_density": record.power_density,
            "wavelength": record.wavelength,
            "treatment_time": record.treatment_time
        }
    })
}

fn metadata(process_id: &str, recorded_at: DateTime<Utc>, workflow_type: WorkflowType) -> Value {
    json!({
        "process_id": process_id,
        "timestamp": recorded_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        "process_type": workflow_type.as_str()
    })
}

/// 按流程类型把技术分析结果映射为持久化结构，缺失的字段跳过
pub fn map_results(
    workflow_type: WorkflowType,
    process_id: &str,
    technical_results: &Value,
    timestamp: DateTime<Utc>,
) -> Map<String, Value> {
    let mut output = Map::new();
    output.insert("process_id".to_string(), Value::from(process_id));
    output.insert(
        "timestamp".to_string(),
        Value::from(timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)),
    );

    for (result_key, output_field) in field_mapping(workflow_type) {
        if let Some(value) = technical_results.get(*result_key) {
            output.insert((*output_field).to_string(), value.clone());
        }
    }
    output
}

/// 校验映射后的输出
///
/// `process_id` 非空；其余映射字段必须是有限的非负数，
/// `treatment_effectiveness` 不超过 100。
pub fn validate_output(output: &Map<String, Value>) -> AnalysisResult<()> {
    match output.get("process_id").and_then(Value::as_str) {
        Some(id) if !id.trim().is_empty() => {}
        _ => {
            return Err(AnalysisError::validation("Output process_id must not be empty")
                .with_detail("field", "process_id"))
        }
    }

    for (field, value) in output {
        if field == "process_id" || field == "timestamp" {
            continue;
        }

        let number = value.as_f64().filter(|v| v.is_finite()).ok_or_else(|| {
            AnalysisError::validation(format!("Output field {field} must be a finite number"))
                .with_detail("field", field.as_str())
                .with_detail("value", value.clone())
        })?;

        if number < 0.0 {
            return Err(
                AnalysisError::validation(format!("Output field {field} must not be negative"))
                    .with_detail("field", field.as_str())
                    .with_detail("value", number),
            );
        }

        if field == "treatment_effectiveness" && number > MAX_EFFECTIVENESS {
            return Err(AnalysisError::validation(format!(
                "Output field {field} must lie in [0, {MAX_EFFECTIVENESS}]"
            ))
            .with_detail("field", field.as_str())
            .with_detail("value", number));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use analysis_core::errors::ErrorKind;

    fn rf_record() -> RfTreatmentRecord {
        RfTreatmentRecord {
            power: 3.0,
            frequency: 27.12,
            treatment_time: 5.0,
            moisture_content: 12.0,
            dielectric_constant: 4.5,
            loss_factor: 0.8,
            recorded_at: Utc::now(),
        }
    }

    #[test]
    fn test_rf_record_transform() {
        let input = record_to_input("rf-1", &ProcessRecord::RfTreatment(rf_record()));

        assert_eq!(input["technical"]["rf_parameters"]["frequency"], 27.12);
        assert_eq!(
            input["technical"]["material_properties"]["dielectric_properties"]["loss_factor"],
            0.8
        );
        assert_eq!(input["metadata"]["process_id"], "rf-1");
        assert_eq!(input["metadata"]["process_type"], "rf_treatment");
    }

    #[test]
    fn test_baseline_record_uses_process_parameters() {
        let record = ProcessRecord::Baseline(BaselineRecord {
            feed_rate: 100.0,
            air_flow_rate: 50.0,
            classifier_speed: 1000.0,
            temperature: 25.0,
            humidity: 40.0,
            pressure: 101.3,
            recorded_at: "2024-03-01T08:30:00Z".parse().unwrap(),
        });
        let input = record_to_input("b-1", &record);

        assert_eq!(input["technical"]["process_parameters"]["feed_rate"], 100.0);
        assert_eq!(input["technical"]["process_conditions"]["pressure"], 101.3);
        assert_eq!(input["metadata"]["timestamp"], "2024-03-01T08:30:00.000Z");
        assert_eq!(input["metadata"]["process_type"], "baseline");
    }

    #[test]
    fn test_mismatched_record_is_integration_error() {
        let input = AnalysisInput::Record(ProcessRecord::RfTreatment(rf_record()));
        let error = canonical_input(WorkflowType::Baseline, "p", &input).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Integration);
    }

    #[test]
    fn test_map_results_skips_missing_keys() {
        let technical = json!({
            "final_moisture": 8.5,
            "treatment_effectiveness": 0.407,
            "unrelated": 1.0
        });
        let output = map_results(WorkflowType::RfTreatment, "rf-1", &technical, Utc::now());

        assert_eq!(output["process_id"], "rf-1");
        assert!(output.contains_key("timestamp"));
        assert_eq!(output["moisture_content"], 8.5);
        assert_eq!(output["treatment_effectiveness"], 0.407);
        assert!(!output.contains_key("power"));
        assert!(!output.contains_key("unrelated"));
    }

    #[test]
    fn test_baseline_mapping_renames_fields() {
        let technical = json!({"protein_recovery": 82.0, "classifier_efficiency": 0.9});
        let output = map_results(WorkflowType::Baseline, "b-1", &technical, Utc::now());
        assert_eq!(output["protein_yield"], 82.0);
        assert_eq!(output["classifier_speed"], 0.9);
    }

    #[test]
    fn test_validate_output() {
        let ok = map_results(
            WorkflowType::IrTreatment,
            "ir-1",
            &json!({"treatment_effectiveness": 55.0, "surface_temp_actual": 80.0}),
            Utc::now(),
        );
        assert!(validate_output(&ok).is_ok());

        let negative = map_results(
            WorkflowType::IrTreatment,
            "ir-1",
            &json!({"final_moisture": -1.0}),
            Utc::now(),
        );
        let error = validate_output(&negative).unwrap_err();
        assert_eq!(error.details()["field"], "moisture_content");

        let too_high = map_results(
            WorkflowType::RfTreatment,
            "rf-1",
            &json!({"treatment_effectiveness": 120.0}),
            Utc::now(),
        );
        assert!(validate_output(&too_high).is_err());

        let not_number = map_results(
            WorkflowType::Baseline,
            "b-1",
            &json!({"protein_recovery": "lots"}),
            Utc::now(),
        );
        assert!(validate_output(&not_number).is_err());

        let empty_id = map_results(WorkflowType::Baseline, "  ", &json!({}), Utc::now());
        assert_eq!(
            validate_output(&empty_id).unwrap_err().details()["field"],
            "process_id"
        );
    }
}
