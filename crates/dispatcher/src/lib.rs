//! 分析任务调度：延迟任务、周期任务与执行中任务的管理

pub mod scheduler;

pub use scheduler::AnalysisScheduler;
