//! 配置管理
//!
//! 加载顺序：
//! 1. 内置默认值
//! 2. TOML 配置文件（显式路径，或默认路径 `config/analysis.toml`、`analysis.toml`）
//! 3. 环境变量覆盖（前缀 `ANALYSIS_`，层级分隔符 `__`）
//!
//! ```text
//! ANALYSIS_WORKFLOW__MAX_ATTEMPTS=5
//! ANALYSIS_OBSERVABILITY__LOG_FORMAT=json
//! ```

pub mod app_config;
pub mod sections;

pub use app_config::AppConfig;
pub use sections::{MonitorConfig, ObservabilityConfig, SchedulerConfig, WorkflowConfig};
