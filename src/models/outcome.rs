use crate::models::impact::{Impact, ImpactBreakdown};
use crate::models::violation::{RuleSummary, Violation};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// 证据图片的不透明引用
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageRef(pub String);

impl ImageRef {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ImageRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// 单个违规节点的截图证据
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvidenceRecord {
    /// 所属违规在 `TestOutcome::violations` 中的下标
    pub violation_index: usize,
    /// 节点在该违规 `nodes` 中的下标
    pub node_index: usize,
    pub impact: Impact,
    pub image_ref: ImageRef,
    pub element_selector: String,
}

/// 页面审计状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OutcomeStatus {
    Completed,
    Failed,
}

/// 单个 URL 的审计结果
///
/// 由 `ResultAggregator` 生成，写入 `RunReport` 之后不再修改。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestOutcome {
    pub url: String,
    pub timestamp: DateTime<Utc>,
    pub violations: Vec<Violation>,
    pub passes: Vec<RuleSummary>,
    pub incomplete: Vec<RuleSummary>,
    pub inapplicable: Vec<RuleSummary>,
    pub evidence: Vec<EvidenceRecord>,
    pub status: OutcomeStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl TestOutcome {
    pub fn is_failed(&self) -> bool {
        self.status == OutcomeStatus::Failed
    }

    /// 按严重程度统计违规规则数
    pub fn impact_breakdown(&self) -> ImpactBreakdown {
        let mut breakdown = ImpactBreakdown::default();
        for violation in &self.violations {
            breakdown.add(violation.impact, 1);
        }
        breakdown
    }

    /// 受影响节点总数
    pub fn affected_node_count(&self) -> usize {
        self.violations.iter().map(Violation::node_count).sum()
    }

    /// 参与评估的规则总数
    pub fn rules_evaluated(&self) -> usize {
        self.violations.len() + self.passes.len() + self.incomplete.len() + self.inapplicable.len()
    }

    /// 某个违规下的全部证据
    pub fn evidence_for(&self, violation_index: usize) -> impl Iterator<Item = &EvidenceRecord> {
        self.evidence
            .iter()
            .filter(move |record| record.violation_index == violation_index)
    }
}
