//! 导出层
//!
//! 纯函数：把 `TestOutcome` / `RunReport` 映射为 JUnit XML、SARIF、执行摘要和 PDF。
//! 格式化错误以 `ExportError` 返回，不会修改输入数据。

pub mod artifacts;
pub mod junit;
pub mod pdf;
pub mod sarif;
pub mod summary;

pub use artifacts::{write_run_artifacts, write_summary_pdf, ArtifactPaths};
pub use junit::{outcome_to_junit, run_to_junit};
pub use pdf::{render_executive_pdf, PdfLayout, PdfRenderer};
pub use sarif::{outcome_to_sarif, run_to_sarif, SarifLog};
pub use summary::{ExecutiveSummary, Grade};

use crate::error::{ExportError, ExportResult};
use crate::models::TestOutcome;

/// 导出前的输入校验
///
/// - 每条违规至少有一个节点
/// - 每条证据都指向存在的违规节点
pub fn validate_outcome(outcome: &TestOutcome) -> ExportResult<()> {
    for violation in &outcome.violations {
        if violation.nodes.is_empty() {
            return Err(ExportError::MalformedViolation {
                rule_id: violation.rule_id.clone(),
                reason: "violation has no nodes".to_string(),
            });
        }
    }
    for record in &outcome.evidence {
        let exists = outcome
            .violations
            .get(record.violation_index)
            .is_some_and(|v| record.node_index < v.nodes.len());
        if !exists {
            return Err(ExportError::DanglingEvidence {
                violation_index: record.violation_index,
                node_index: record.node_index,
            });
        }
    }
    Ok(())
}
