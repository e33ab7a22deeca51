//! 分析执行层：输入校验、记录转换、工作流状态机与编排器

pub mod analyzers;
pub mod effectiveness;
pub mod orchestrator;
pub mod transform;
pub mod validation;
pub mod workflow;

pub use analyzers::SectionSnapshotAnalyzer;
pub use effectiveness::treatment_effectiveness;
pub use orchestrator::{WorkflowHandler, WorkflowOrchestrator};
pub use validation::InputValidator;
pub use workflow::AnalysisWorkflow;
