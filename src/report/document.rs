//! 合并报告的文档模型
//!
//! 报告先构建为结构化文档（章节、表格、图集），最后一次性序列化为 HTML。
//! 证据按违规下标挂到对应章节，找不到章节时返回 `DocumentError::AnchorNotFound`。

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeSet;
use thiserror::Error;

use crate::models::{Impact, ImageRef, ImpactBreakdown, OutcomeStatus, RuleSummary};

/// 单个 URL 的合并报告
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsolidatedReport {
    pub url: String,
    pub timestamp: DateTime<Utc>,
    pub status: OutcomeStatus,
    pub error_message: Option<String>,
    pub breakdown: ImpactBreakdown,
    /// 按违规原始顺序排列
    pub sections: Vec<ViolationSection>,
    pub incomplete: Vec<RuleSummary>,
    pub passed_rules: usize,
    pub inapplicable_rules: usize,
    /// 因找不到所属章节而丢弃的证据数
    pub dropped_evidence: usize,
}

impl ConsolidatedReport {
    pub fn section_mut(&mut self, violation_index: usize) -> Option<&mut ViolationSection> {
        self.sections
            .iter_mut()
            .find(|section| section.violation_index == violation_index)
    }

    /// 把一张证据图挂到所属违规的图集中
    pub fn attach_evidence(
        &mut self,
        violation_index: usize,
        item: GalleryItem,
    ) -> Result<(), DocumentError> {
        let section = self
            .section_mut(violation_index)
            .ok_or(DocumentError::AnchorNotFound { violation_index })?;
        section.gallery.push(item);
        Ok(())
    }

    /// 报告中展示的节点总数
    pub fn total_nodes(&self) -> usize {
        self.sections
            .iter()
            .map(|section| section.table.total_nodes())
            .sum()
    }
}

/// 一条违规规则的章节
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViolationSection {
    pub violation_index: usize,
    /// 页面内锚点，形如 `violation-0`
    pub anchor: String,
    pub rule_id: String,
    pub description: String,
    pub help: Option<String>,
    pub help_url: String,
    pub impact: Impact,
    pub tags: BTreeSet<String>,
    pub table: ViolationTable,
    /// 紧跟在表格之后的证据图集
    pub gallery: Vec<GalleryItem>,
}

impl ViolationSection {
    pub fn anchor_for(violation_index: usize) -> String {
        format!("violation-{}", violation_index)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ViolationTable {
    pub groups: Vec<GroupRow>,
}

impl ViolationTable {
    pub fn total_nodes(&self) -> usize {
        self.groups.iter().map(GroupRow::total_count).sum()
    }
}

/// 表格中的一行
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum GroupRow {
    /// 只有一个节点：原样展示
    Single {
        remediation: String,
        node: RenderedNode,
    },
    /// 多个节点：展示前几个示例，其余折叠为 "+N more"
    #[serde(rename_all = "camelCase")]
    Consolidated {
        remediation: String,
        examples: Vec<RenderedNode>,
        total_count: usize,
        remaining: usize,
    },
}

impl GroupRow {
    pub fn remediation(&self) -> &str {
        match self {
            GroupRow::Single { remediation, .. } | GroupRow::Consolidated { remediation, .. } => {
                remediation
            }
        }
    }

    pub fn total_count(&self) -> usize {
        match self {
            GroupRow::Single { .. } => 1,
            GroupRow::Consolidated { total_count, .. } => *total_count,
        }
    }

    pub fn examples(&self) -> &[RenderedNode] {
        match self {
            GroupRow::Single { node, .. } => std::slice::from_ref(node),
            GroupRow::Consolidated { examples, .. } => examples,
        }
    }

    /// 折叠行的摘要文字，没有剩余节点时为 `None`
    pub fn more_label(&self) -> Option<String> {
        match self {
            GroupRow::Consolidated { remaining, .. } if *remaining > 0 => {
                Some(format!("+{} more", remaining))
            }
            _ => None,
        }
    }
}

/// 展示用的节点（选择器原样，HTML 已折叠空白并截断）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedNode {
    pub selector: String,
    pub markup: String,
    pub truncated: bool,
}

/// 图集中的一张证据图
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GalleryItem {
    pub image_ref: ImageRef,
    pub impact: Impact,
    pub selector: String,
    pub node_index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DocumentError {
    #[error("找不到违规 {violation_index} 对应的报告章节")]
    AnchorNotFound { violation_index: usize },
}
