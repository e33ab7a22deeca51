//! 分析域协作者接口
//!
//! 技术、经济、环境三个分析域的数值模型都在系统外部实现，
//! 编排层只通过 [`DomainAnalyzer`] 调用它们。
//!
//! ## 约定
//!
//! - 每次调用必须可以安全重试，编排层会在瞬时失败时重复调用
//! - 失败时返回对应分析域的错误类别（见 [`AnalysisDomain::error`]）
//!
//! ## 使用示例
//!
//! ```rust
//! use async_trait::async_trait;
//! use analysis_core::traits::{AnalysisContext, DomainAnalyzer};
//! use analysis_core::AnalysisResult;
//! use serde_json::{json, Value};
//!
//! struct FixedYield;
//!
//! #[async_trait]
//! impl DomainAnalyzer for FixedYield {
//!     async fn analyze(&self, _context: &AnalysisContext) -> AnalysisResult<Value> {
//!         Ok(json!({"protein_recovery": 82.5}))
//!     }
//! }
//! ```

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{AnalysisError, AnalysisResult};
use crate::models::WorkflowType;

/// 分析域
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisDomain {
    Technical,
    Economic,
    Environmental,
}

impl AnalysisDomain {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisDomain::Technical => "technical",
            AnalysisDomain::Economic => "economic",
            AnalysisDomain::Environmental => "environmental",
        }
    }

    /// 构造该分析域对应类别的错误
    pub fn error(&self, message: impl Into<String>) -> AnalysisError {
        match self {
            AnalysisDomain::Technical => AnalysisError::technical(message),
            AnalysisDomain::Economic => AnalysisError::economic(message),
            AnalysisDomain::Environmental => AnalysisError::environmental(message),
        }
    }
}

impl fmt::Display for AnalysisDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 协作者调用上下文
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisContext {
    pub process_id: String,
    pub workflow_type: WorkflowType,
    /// 规范化后的完整输入
    pub input: Value,
}

impl AnalysisContext {
    pub fn new(process_id: impl Into<String>, workflow_type: WorkflowType, input: Value) -> Self {
        Self {
            process_id: process_id.into(),
            workflow_type,
            input,
        }
    }

    /// 取出某个分析域的输入分区
    pub fn section(&self, domain: AnalysisDomain) -> Option<&Value> {
        self.input.get(domain.as_str())
    }
}

/// 分析域协作者
#[async_trait]
pub trait DomainAnalyzer: Send + Sync {
    async fn analyze(&self, context: &AnalysisContext) -> AnalysisResult<Value>;
}

/// 三个分析域协作者的组合
#[derive(Clone)]
pub struct Collaborators {
    pub technical: Arc<dyn DomainAnalyzer>,
    pub economic: Arc<dyn DomainAnalyzer>,
    pub environmental: Arc<dyn DomainAnalyzer>,
}

impl Collaborators {
    pub fn new(
        technical: Arc<dyn DomainAnalyzer>,
        economic: Arc<dyn DomainAnalyzer>,
        environmental: Arc<dyn DomainAnalyzer>,
    ) -> Self {
        Self {
            technical,
            economic,
            environmental,
        }
    }

    pub fn get(&self, domain: AnalysisDomain) -> &Arc<dyn DomainAnalyzer> {
        match domain {
            AnalysisDomain::Technical => &self.technical,
            AnalysisDomain::Economic => &self.economic,
            AnalysisDomain::Environmental => &self.environmental,
        }
    }
}

impl fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}
