//! 蛋白质提取工艺分析编排系统的核心定义
//!
//! 包含错误分类、数据模型、重试策略、协作者接口和配置。

pub mod config;
pub mod errors;
pub mod history;
pub mod models;
pub mod retry;
pub mod timing;
pub mod traits;

pub use errors::{envelope_from_anyhow, to_envelope, AnalysisError, AnalysisResult, ErrorEnvelope, ErrorKind};
pub use history::{BoundedHistory, DEFAULT_HISTORY_LIMIT};
pub use retry::{with_retry, RetryPolicy};
pub use timing::timed;
