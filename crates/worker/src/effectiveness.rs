use analysis_core::models::WorkflowType;
use serde_json::Value;

/// 处理效果的上限（百分比）
pub const MAX_EFFECTIVENESS: f64 = 100.0;

/// 计算处理效果
///
/// 基线工艺没有处理步骤，返回 `None`。参数缺失或不是数值时结果为 0。
pub fn treatment_effectiveness(workflow_type: WorkflowType, input: &Value) -> Option<f64> {
    let technical = input.get("technical");
    match workflow_type {
        WorkflowType::Baseline => None,
        WorkflowType::RfTreatment => Some(rf_effectiveness(
            technical.and_then(|t| t.get("rf_parameters")),
        )),
        WorkflowType::IrTreatment => Some(ir_effectiveness(
            technical.and_then(|t| t.get("ir_parameters")),
        )),
    }
}

/// power × treatment_time × frequency / 1000
pub fn rf_effectiveness(parameters: Option<&Value>) -> f64 {
    let (Some(power), Some(time), Some(frequency)) = (
        number(parameters, "power"),
        number(parameters, "treatment_time"),
        number(parameters, "frequency"),
    ) else {
        return 0.0;
    };
    finish(power * time * frequency / 1000.0)
}

/// power_density × treatment_time / wavelength × 100
pub fn ir_effectiveness(parameters: Option<&Value>) -> f64 {
    let (Some(power_density), Some(time), Some(wavelength)) = (
        number(parameters, "power_density"),
        number(parameters, "treatment_time"),
        number(parameters, "wavelength"),
    ) else {
        return 0.0;
    };
    if wavelength == 0.0 {
        return 0.0;
    }
    finish(power_density * time / wavelength * 100.0)
}

fn number(parameters: Option<&Value>, key: &str) -> Option<f64> {
    parameters?.get(key)?.as_f64().filter(|v| v.is_finite())
}

fn finish(raw: f64) -> f64 {
    if !raw.is_finite() {
        return 0.0;
    }
    let clamped = raw.clamp(0.0, MAX_EFFECTIVENESS);
    (clamped * 1000.0).round() / 1000.0
}
