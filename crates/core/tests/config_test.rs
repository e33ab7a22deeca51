use analysis_core::config::*;
use std::env;
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;

#[test]
fn test_default_config() {
    let config = AppConfig::default();
    assert!(config.validate().is_ok());

    // 验证默认值
    assert_eq!(config.workflow.max_attempts, 3);
    assert_eq!(config.workflow.base_delay_ms, 1000);
    assert_eq!(config.scheduler.tick_interval(), Duration::from_secs(1));
    assert_eq!(config.monitor.sample_interval(), Duration::from_secs(60));
    assert_eq!(config.monitor.retention(), Duration::from_secs(24 * 3600));
    assert!(config.monitor.default_rules_enabled);
    assert_eq!(config.observability.log_level, "info");
}

#[test]
fn test_config_from_partial_toml() {
    let toml_content = r#"
[workflow]
max_attempts = 5
base_delay_ms = 200

[observability]
log_format = "json"
"#;

    let config = AppConfig::from_toml(toml_content).unwrap();
    assert_eq!(config.workflow.max_attempts, 5);
    assert_eq!(config.workflow.base_delay_ms, 200);
    assert_eq!(config.workflow.max_delay_ms, 60_000);
    assert_eq!(config.observability.log_format, "json");
    assert!(config.scheduler.enabled);
}

#[test]
fn test_invalid_toml_section_rejected() {
    let toml_content = r#"
[scheduler]
tick_interval_ms = 0
"#;

    let error = AppConfig::from_toml(toml_content).unwrap_err();
    assert!(format!("{error:#}").contains("调度器配置验证失败"));
}

#[test]
fn test_toml_roundtrip() {
    let mut config = AppConfig::default();
    config.monitor.retention_hours = 48;

    let serialized = config.to_toml().unwrap();
    let parsed = AppConfig::from_toml(&serialized).unwrap();
    assert_eq!(parsed, config);
}

#[test]
fn test_load_from_file_with_env_override() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
[scheduler]
tick_interval_ms = 250

[monitor]
sample_interval_seconds = 15
"#
    )
    .unwrap();

    env::set_var("ANALYSIS_MONITOR__RETENTION_HOURS", "12");
    let config = AppConfig::load(file.path().to_str()).unwrap();
    env::remove_var("ANALYSIS_MONITOR__RETENTION_HOURS");

    assert_eq!(config.scheduler.tick_interval_ms, 250);
    assert_eq!(config.monitor.sample_interval_seconds, 15);
    assert_eq!(config.monitor.retention_hours, 12);
    assert_eq!(config.workflow.max_attempts, 3);
}

#[test]
fn test_load_missing_file_fails() {
    let result = AppConfig::load(Some("/nonexistent/analysis.toml"));
    assert!(result.is_err());
}
