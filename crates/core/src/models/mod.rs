//! # 数据模型
//!
//! 分析编排系统的核心数据结构。
//!
//! ## 核心模型
//!
//! ### WorkflowType - 工艺流程类型
//! 封闭枚举，字符串只在解析边界出现。
//!
//! ### AnalysisRequest - 分析请求
//! 调用方提交的请求，输入可以是规范化 JSON 或类型化的工艺记录。
//!
//! ### ScheduledTask - 调度任务
//! 由调度器持有的延迟或周期任务。
//!
//! ### WorkflowResult - 分析结果
//! 一次运行的三个分析域结果及映射后的输出。
//!
//! ## 状态流转
//!
//! ```text
//! Pending → Running → Completed
//!    ↓         ↓
//! (cancel)  Failed / Cancelled
//! ```

pub mod request;
pub mod result;
pub mod task;
pub mod workflow_type;

pub use request::*;
pub use result::*;
pub use task::*;
pub use workflow_type::*;
