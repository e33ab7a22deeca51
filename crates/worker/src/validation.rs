//! 输入校验
//!
//! 每种流程类型有固定的必填字段表，只检查字段是否存在，不检查取值类型。

use analysis_core::errors::{AnalysisError, AnalysisResult};
use analysis_core::models::WorkflowType;
use serde_json::Value;
use tracing::debug;

/// 一个子分区内的必填字段
#[derive(Debug, Clone, Copy)]
pub struct FieldRequirement {
    pub section: &'static str,
    pub subsection: &'static str,
    pub fields: &'static [&'static str],
}

const BASELINE_REQUIREMENTS: &[FieldRequirement] = &[FieldRequirement {
    section: "technical",
    subsection: "process_parameters",
    fields: &["feed_rate", "air_flow_rate", "classifier_speed"],
}];

const RF_REQUIREMENTS: &[FieldRequirement] = &[
    FieldRequirement {
        section: "technical",
        subsection: "rf_parameters",
        fields: &["power", "treatment_time"],
    },
    FieldRequirement {
        section: "technical",
        subsection: "material_properties",
        fields: &["moisture_content"],
    },
];

const IR_REQUIREMENTS: &[FieldRequirement] = &[
    FieldRequirement {
        section: "technical",
        subsection: "ir_parameters",
        fields: &["power_density", "wavelength", "treatment_time"],
    },
    FieldRequirement {
        section: "technical",
        subsection: "material_properties",
        fields: &["moisture_content"],
    },
];

/// 输入校验器
pub struct InputValidator;

impl InputValidator {
    pub fn requirements(workflow_type: WorkflowType) -> &'static [FieldRequirement] {
        match workflow_type {
            WorkflowType::Baseline => BASELINE_REQUIREMENTS,
            WorkflowType::RfTreatment => RF_REQUIREMENTS,
            WorkflowType::IrTreatment => IR_REQUIREMENTS,
        }
    }

    /// 输入是否满足该流程类型的必填字段
    pub fn validate(input: &Value, workflow_type: WorkflowType) -> bool {
        Self::check(input, workflow_type).is_ok()
    }

    /// 同 [`InputValidator::validate`]，失败时返回指明缺失位置的校验错误
    pub fn check(input: &Value, workflow_type: WorkflowType) -> AnalysisResult<()> {
        for requirement in Self::requirements(workflow_type) {
            let Some(section) = input.get(requirement.section).filter(|v| v.is_object()) else {
                return Err(missing(workflow_type, requirement.section, None, None));
            };

            let Some(subsection) = section
                .get(requirement.subsection)
                .filter(|v| v.is_object())
            else {
                return Err(missing(
                    workflow_type,
                    requirement.section,
                    Some(requirement.subsection),
                    None,
                ));
            };

            for field in requirement.fields {
                if subsection.get(*field).is_none() {
                    return Err(missing(
                        workflow_type,
                        requirement.section,
                        Some(requirement.subsection),
                        Some(*field),
                    ));
                }
            }
        }

        debug!("输入校验通过: {}", workflow_type);
        Ok(())
    }
}

fn missing(
    workflow_type: WorkflowType,
    section: &str,
    subsection: Option<&str>,
    field: Option<&str>,
) -> AnalysisError {
    let path = [Some(section), subsection, field]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(".");

    let mut error = AnalysisError::validation(format!("Missing required field: {path}"))
        .with_detail("workflow_type", workflow_type.as_str())
        .with_detail("section", section)
        .with_detail("path", path);
    if let Some(subsection) = subsection {
        error = error.with_detail("subsection", subsection);
    }
    if let Some(field) = field {
        error = error.with_detail("field", field);
    }
    error
}
