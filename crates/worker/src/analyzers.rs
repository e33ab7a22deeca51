//! 参考协作者
//!
//! 真实的数值模型在系统外部实现。[`SectionSnapshotAnalyzer`] 只把输入中
//! 本分析域分区内的数值展平后原样返回，供命令行程序和联调使用。

use analysis_core::errors::AnalysisResult;
use analysis_core::traits::{AnalysisContext, AnalysisDomain, Collaborators, DomainAnalyzer};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;

#[derive(Debug, Clone, Copy)]
pub struct SectionSnapshotAnalyzer {
    domain: AnalysisDomain,
}

impl SectionSnapshotAnalyzer {
    pub fn new(domain: AnalysisDomain) -> Self {
        Self { domain }
    }

    /// 三个分析域都使用快照协作者
    pub fn collaborators() -> Collaborators {
        Collaborators::new(
            Arc::new(Self::new(AnalysisDomain::Technical)),
            Arc::new(Self::new(AnalysisDomain::Economic)),
            Arc::new(Self::new(AnalysisDomain::Environmental)),
        )
    }
}

#[async_trait]
impl DomainAnalyzer for SectionSnapshotAnalyzer {
    async fn analyze(&self, context: &AnalysisContext) -> AnalysisResult<Value> {
        let mut snapshot = Map::new();
        if let Some(section) = context.section(self.domain) {
            flatten_numbers("", section, &mut snapshot);
        }
        Ok(Value::Object(snapshot))
    }
}

/// 把嵌套对象中的数值叶子展平为 `a.b.c` 形式的键
fn flatten_numbers(prefix: &str, value: &Value, out: &mut Map<String, Value>) {
    match value {
        Value::Object(fields) => {
            for (key, child) in fields {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                flatten_numbers(&path, child, out);
            }
        }
        Value::Number(_) if !prefix.is_empty() => {
            out.insert(prefix.to_string(), value.clone());
        }
        _ => {}
    }
}
