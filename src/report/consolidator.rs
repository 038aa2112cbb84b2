//! 报告合并
//!
//! 把一个 `TestOutcome` 变成可直接渲染的 `ConsolidatedReport`：
//! 1. 每条违规的节点按修复建议分组
//! 2. 单节点组原样展示，多节点组最多展示 3 个示例并折叠其余部分
//! 3. 证据图挂到所属违规表格之后

use tracing::{debug, warn};

use crate::models::{TestOutcome, Violation, ViolationNode};
use crate::report::document::{
    ConsolidatedReport, GalleryItem, GroupRow, RenderedNode, ViolationSection, ViolationTable,
};
use crate::utils::{collapse_whitespace, truncate_text};

/// 多节点组展示的示例个数
pub const MAX_EXAMPLE_NODES: usize = 3;

/// 表格中 HTML 片段的最大字符数
pub const MAX_MARKUP_CHARS: usize = 200;

/// 共享同一修复建议的一组节点
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViolationGroup {
    pub remediation_key: String,
    pub member_nodes: Vec<ViolationNode>,
    pub total_count: usize,
}

/// 节点的分组键
///
/// 优先使用节点级修复建议，其次规则级 `help`，都没有时退回规则 ID。
pub fn remediation_key(violation: &Violation, node: &ViolationNode) -> String {
    node.failure_summary
        .as_deref()
        .map(collapse_whitespace)
        .filter(|summary| !summary.is_empty())
        .or_else(|| {
            violation
                .help
                .as_deref()
                .map(collapse_whitespace)
                .filter(|help| !help.is_empty())
        })
        .unwrap_or_else(|| violation.rule_id.clone())
}

/// 按修复建议对一条违规的节点分组
///
/// 组按首次出现的顺序排列，组内节点保持原顺序。
pub fn group_violation(violation: &Violation) -> Vec<ViolationGroup> {
    let mut groups: Vec<ViolationGroup> = Vec::new();
    for node in &violation.nodes {
        let key = remediation_key(violation, node);
        match groups.iter_mut().find(|group| group.remediation_key == key) {
            Some(group) => {
                group.member_nodes.push(node.clone());
                group.total_count += 1;
            }
            None => groups.push(ViolationGroup {
                remediation_key: key,
                member_nodes: vec![node.clone()],
                total_count: 1,
            }),
        }
    }
    groups
}

/// 报告合并器
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportConsolidator {
    max_examples: usize,
    markup_limit: usize,
}

impl Default for ReportConsolidator {
    fn default() -> Self {
        Self {
            max_examples: MAX_EXAMPLE_NODES,
            markup_limit: MAX_MARKUP_CHARS,
        }
    }
}

impl ReportConsolidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// 生成合并报告
    pub fn consolidate(&self, outcome: &TestOutcome) -> ConsolidatedReport {
        let sections = outcome
            .violations
            .iter()
            .enumerate()
            .map(|(index, violation)| self.build_section(index, violation))
            .collect();

        let mut report = ConsolidatedReport {
            url: outcome.url.clone(),
            timestamp: outcome.timestamp,
            status: outcome.status,
            error_message: outcome.error_message.clone(),
            breakdown: outcome.impact_breakdown(),
            sections,
            incomplete: outcome.incomplete.clone(),
            passed_rules: outcome.passes.len(),
            inapplicable_rules: outcome.inapplicable.len(),
            dropped_evidence: 0,
        };

        for record in &outcome.evidence {
            let item = GalleryItem {
                image_ref: record.image_ref.clone(),
                impact: record.impact,
                selector: record.element_selector.clone(),
                node_index: record.node_index,
            };
            if let Err(e) = report.attach_evidence(record.violation_index, item) {
                warn!("⚠️ [{}] 丢弃证据 {}: {}", outcome.url, record.image_ref, e);
                report.dropped_evidence += 1;
            }
        }

        debug!(
            "[{}] 合并完成: {} 条违规, {} 张证据",
            outcome.url,
            report.sections.len(),
            outcome.evidence.len() - report.dropped_evidence
        );
        report
    }

    fn build_section(&self, violation_index: usize, violation: &Violation) -> ViolationSection {
        let groups = group_violation(violation)
            .into_iter()
            .map(|group| self.build_row(group))
            .collect();

        ViolationSection {
            violation_index,
            anchor: ViolationSection::anchor_for(violation_index),
            rule_id: violation.rule_id.clone(),
            description: violation.description.clone(),
            help: violation.help.clone(),
            help_url: violation.help_url.clone(),
            impact: violation.impact,
            tags: violation.tags.clone(),
            table: ViolationTable { groups },
            gallery: Vec::new(),
        }
    }

    fn build_row(&self, group: ViolationGroup) -> GroupRow {
        if group.total_count == 1 {
            // 单节点组：HTML 只折叠空白，不截断
            let node = group
                .member_nodes
                .first()
                .map(|node| RenderedNode {
                    selector: node.target_selector.clone(),
                    markup: collapse_whitespace(&node.markup_snippet),
                    truncated: false,
                })
                .unwrap_or_else(|| RenderedNode {
                    selector: String::new(),
                    markup: String::new(),
                    truncated: false,
                });
            return GroupRow::Single {
                remediation: group.remediation_key,
                node,
            };
        }

        let examples = group
            .member_nodes
            .iter()
            .take(self.max_examples)
            .map(|node| self.render_node(node))
            .collect();
        GroupRow::Consolidated {
            remediation: group.remediation_key,
            examples,
            total_count: group.total_count,
            remaining: group.total_count.saturating_sub(self.max_examples),
        }
    }

    fn render_node(&self, node: &ViolationNode) -> RenderedNode {
        let (markup, truncated) =
            truncate_text(&collapse_whitespace(&node.markup_snippet), self.markup_limit);
        RenderedNode {
            selector: node.target_selector.clone(),
            markup,
            truncated,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EvidenceRecord, ImageRef, Impact, OutcomeStatus};
    use chrono::Utc;
    use std::collections::BTreeSet;

    fn violation(rule_id: &str, nodes: Vec<ViolationNode>) -> Violation {
        Violation {
            rule_id: rule_id.to_string(),
            description: "Images must have alternate text".to_string(),
            help: Some("Images must have alternate text".to_string()),
            help_url: format!("https://rules.example/{}", rule_id),
            impact: Impact::Critical,
            tags: BTreeSet::from(["cat.text-alternatives".to_string()]),
            nodes,
        }
    }

    fn img_nodes(count: usize) -> Vec<ViolationNode> {
        (0..count)
            .map(|i| {
                ViolationNode::new(format!("img:nth-child({})", i + 1), format!("<img src=\"{}.png\">", i))
                    .with_failure_summary("Fix any of the following:\n  Element does not have an alt attribute")
            })
            .collect()
    }

    fn outcome(violations: Vec<Violation>, evidence: Vec<EvidenceRecord>) -> TestOutcome {
        TestOutcome {
            url: "https://example.com".to_string(),
            timestamp: Utc::now(),
            violations,
            passes: Vec::new(),
            incomplete: Vec::new(),
            inapplicable: Vec::new(),
            evidence,
            status: OutcomeStatus::Completed,
            error_message: None,
        }
    }

    #[test]
    fn test_long_markup_truncated_only_in_consolidated_rows() {
        let long_markup = format!("<div   class=\"banner\">\n  {}</div>", "x".repeat(250));
        let collapsed = collapse_whitespace(&long_markup);
        let shared = |i: usize| {
            ViolationNode::new(format!(".banner-{}", i), long_markup.clone())
                .with_failure_summary("Element has insufficient color contrast")
        };
        let single = ViolationNode::new("#hero", long_markup.clone())
            .with_failure_summary("Element has no accessible name");
        let v = violation("color-contrast", vec![shared(0), single, shared(1)]);

        let report = ReportConsolidator::new().consolidate(&outcome(vec![v], Vec::new()));
        let groups = &report.sections[0].table.groups;
        assert_eq!(groups.len(), 2);

        let consolidated = groups
            .iter()
            .find(|row| row.total_count() == 2)
            .expect("two-node group");
        assert_eq!(consolidated.examples().len(), 2);
        assert_eq!(consolidated.more_label(), None);
        for node in consolidated.examples() {
            assert!(node.truncated);
            assert!(node.markup.ends_with("..."));
            assert_eq!(node.markup.chars().count(), MAX_MARKUP_CHARS + 3);
            assert!(collapsed.starts_with(node.markup.trim_end_matches("...")));
        }

        let single_row = groups
            .iter()
            .find(|row| row.total_count() == 1)
            .expect("single-node group");
        let node = &single_row.examples()[0];
        assert!(!node.truncated);
        assert_eq!(node.markup, collapsed);
        assert!(node.markup.chars().count() > MAX_MARKUP_CHARS);
    }

    #[test]
    fn test_seven_nodes_one_group() {
        let v = violation("image-alt", img_nodes(7));
        let groups = group_violation(&v);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].total_count, 7);
        assert_eq!(
            groups[0].remediation_key,
            "Fix any of the following: Element does not have an alt attribute"
        );

        let report = ReportConsolidator::new().consolidate(&outcome(vec![v], Vec::new()));
        let row = &report.sections[0].table.groups[0];
        assert_eq!(row.examples().len(), 3);
        assert_eq!(row.total_count(), 7);
        assert_eq!(row.more_label().as_deref(), Some("+4 more"));
    }

    #[test]
    fn test_grouping_is_idempotent() {
        let mut nodes = img_nodes(4);
        nodes.push(ViolationNode::new("#logo", "<img id=\"logo\">").with_failure_summary("Add role=presentation"));
        nodes.push(ViolationNode::new("#hero", "<img id=\"hero\">"));
        let v = violation("image-alt", nodes);

        let first = group_violation(&v);
        let regrouped: Vec<ViolationNode> = first
            .iter()
            .flat_map(|group| group.member_nodes.iter().cloned())
            .collect();
        let second = group_violation(&violation("image-alt", regrouped));

        assert_eq!(first, second);
        assert_eq!(first.len(), 3);
        // 没有节点级建议时退回规则级 help
        assert_eq!(first[2].remediation_key, "Images must have alternate text");
    }

    #[test]
    fn test_group_of_three_has_no_remainder() {
        let v = violation("image-alt", img_nodes(3));
        let report = ReportConsolidator::new().consolidate(&outcome(vec![v], Vec::new()));
        let row = &report.sections[0].table.groups[0];
        assert_eq!(row.examples().len(), 3);
        assert_eq!(row.more_label(), None);
    }

    #[test]
    fn test_single_node_rendered_in_full() {
        let long_markup = format!("<div>\n    {}\n</div>", "x".repeat(400));
        let v = violation("region", vec![ViolationNode::new("div", long_markup)]);
        let report = ReportConsolidator::new().consolidate(&outcome(vec![v], Vec::new()));
        match &report.sections[0].table.groups[0] {
            GroupRow::Single { node, .. } => {
                assert!(!node.truncated);
                assert!(node.markup.starts_with("<div> x"));
                assert!(node.markup.ends_with("x </div>"));
            }
            other => panic!("unexpected row: {:?}", other),
        }
    }

    #[test]
    fn test_rule_id_fallback() {
        let mut v = violation("landmark-one-main", vec![ViolationNode::new("html", "<html>")]);
        v.help = None;
        assert_eq!(remediation_key(&v, &v.nodes[0]), "landmark-one-main");
    }

    #[test]
    fn test_evidence_with_missing_anchor_is_dropped() {
        let record = |violation_index| EvidenceRecord {
            violation_index,
            node_index: 0,
            impact: Impact::Critical,
            image_ref: ImageRef(format!("mem://run/v{}.png", violation_index)),
            element_selector: "img:nth-child(1)".to_string(),
        };
        let v = violation("image-alt", img_nodes(2));
        let report = ReportConsolidator::new()
            .consolidate(&outcome(vec![v], vec![record(0), record(4)]));

        assert_eq!(report.sections[0].gallery.len(), 1);
        assert_eq!(report.dropped_evidence, 1);
    }
}
