//! 结果归集服务 - 业务能力层
//!
//! 把规则引擎的原始结果和截图证据整理成一个 `TestOutcome`

use chrono::Utc;
use tracing::warn;

use crate::engine::{EngineResults, RawRule};
use crate::models::{
    EvidenceRecord, Impact, OutcomeStatus, RuleSummary, TestOutcome, Violation,
};

/// 结果归集器
///
/// 每个 URL 一个实例，`finish()` 后即丢弃。
#[derive(Debug)]
pub struct ResultAggregator {
    url: String,
    violations: Vec<Violation>,
    passes: Vec<RuleSummary>,
    incomplete: Vec<RuleSummary>,
    inapplicable: Vec<RuleSummary>,
    evidence: Vec<EvidenceRecord>,
}

impl ResultAggregator {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            violations: Vec::new(),
            passes: Vec::new(),
            incomplete: Vec::new(),
            inapplicable: Vec::new(),
            evidence: Vec::new(),
        }
    }

    /// 归一化规则引擎结果
    ///
    /// 没有节点的违规被丢弃；缺少严重程度的违规按 minor 处理。
    pub fn with_results(mut self, results: EngineResults) -> Self {
        self.violations = results
            .violations
            .into_iter()
            .filter_map(|rule| normalize_violation(&self.url, rule))
            .collect();
        self.passes = results.passes.into_iter().map(summarize).collect();
        self.incomplete = results.incomplete.into_iter().map(summarize).collect();
        self.inapplicable = results.inapplicable.into_iter().map(summarize).collect();
        self
    }

    /// 归一化之后的违规（截图时按这里的下标记录）
    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    /// 追加证据，下标越界的记录会被忽略
    pub fn add_evidence(&mut self, record: EvidenceRecord) {
        let valid = self
            .violations
            .get(record.violation_index)
            .is_some_and(|v| record.node_index < v.nodes.len());
        if valid {
            self.evidence.push(record);
        } else {
            warn!(
                "⚠️ 忽略越界的证据记录: 违规 {} 节点 {}",
                record.violation_index, record.node_index
            );
        }
    }

    /// 生成成功的审计结果
    pub fn finish(self) -> TestOutcome {
        TestOutcome {
            url: self.url,
            timestamp: Utc::now(),
            violations: self.violations,
            passes: self.passes,
            incomplete: self.incomplete,
            inapplicable: self.inapplicable,
            evidence: self.evidence,
            status: OutcomeStatus::Completed,
            error_message: None,
        }
    }

    /// 生成失败的审计结果
    pub fn failed(url: impl Into<String>, error_message: impl Into<String>) -> TestOutcome {
        TestOutcome {
            url: url.into(),
            timestamp: Utc::now(),
            violations: Vec::new(),
            passes: Vec::new(),
            incomplete: Vec::new(),
            inapplicable: Vec::new(),
            evidence: Vec::new(),
            status: OutcomeStatus::Failed,
            error_message: Some(error_message.into()),
        }
    }
}

fn normalize_violation(url: &str, rule: RawRule) -> Option<Violation> {
    if rule.nodes.is_empty() {
        warn!("⚠️ [{}] 违规 {} 没有节点，已忽略", url, rule.id);
        return None;
    }
    let impact = rule.impact.unwrap_or_else(|| {
        warn!("⚠️ [{}] 违规 {} 缺少严重程度，按 minor 处理", url, rule.id);
        Impact::Minor
    });
    Some(Violation {
        rule_id: rule.id,
        description: rule.description,
        help: rule.help,
        help_url: rule.help_url,
        impact,
        tags: rule.tags.into_iter().collect(),
        nodes: rule.nodes,
    })
}

fn summarize(rule: RawRule) -> RuleSummary {
    RuleSummary {
        node_count: rule.nodes.len(),
        rule_id: rule.id,
        description: rule.description,
        help: rule.help,
        help_url: rule.help_url,
        impact: rule.impact,
        tags: rule.tags.into_iter().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ImageRef, ViolationNode};

    fn raw(id: &str, impact: Option<Impact>, nodes: usize) -> RawRule {
        RawRule {
            id: id.to_string(),
            description: format!("{} description", id),
            help: None,
            help_url: format!("https://rules.example/{}", id),
            impact,
            tags: vec!["wcag2a".to_string(), "cat.forms".to_string()],
            nodes: (0..nodes)
                .map(|i| ViolationNode::new(format!("#n{}", i), format!("<input id=\"n{}\">", i)))
                .collect(),
        }
    }

    #[test]
    fn test_normalizes_engine_results() {
        let results = EngineResults {
            violations: vec![
                raw("label", Some(Impact::Serious), 2),
                raw("empty", Some(Impact::Critical), 0),
                raw("unrated", None, 1),
            ],
            passes: vec![raw("document-title", None, 1)],
            incomplete: vec![raw("color-contrast", Some(Impact::Serious), 3)],
            inapplicable: vec![],
        };
        let outcome = ResultAggregator::new("https://example.com").with_results(results).finish();

        assert_eq!(outcome.status, OutcomeStatus::Completed);
        assert_eq!(outcome.violations.len(), 2);
        assert_eq!(outcome.violations[0].rule_id, "label");
        assert_eq!(outcome.violations[1].impact, Impact::Minor);
        assert!(outcome.violations[0].tags.contains("cat.forms"));
        assert_eq!(outcome.passes.len(), 1);
        assert_eq!(outcome.incomplete[0].node_count, 3);
        assert_eq!(outcome.rules_evaluated(), 4);
    }

    #[test]
    fn test_rejects_out_of_range_evidence() {
        let results = EngineResults {
            violations: vec![raw("label", Some(Impact::Serious), 2)],
            ..Default::default()
        };
        let mut aggregator = ResultAggregator::new("https://example.com").with_results(results);
        let record = |violation_index, node_index| EvidenceRecord {
            violation_index,
            node_index,
            impact: Impact::Serious,
            image_ref: ImageRef("mem://x".to_string()),
            element_selector: "#n0".to_string(),
        };
        aggregator.add_evidence(record(0, 1));
        aggregator.add_evidence(record(0, 5));
        aggregator.add_evidence(record(3, 0));
        let outcome = aggregator.finish();
        assert_eq!(outcome.evidence.len(), 1);
    }

    #[test]
    fn test_failed_outcome() {
        let outcome = ResultAggregator::failed("https://down.example", "导航超时");
        assert!(outcome.is_failed());
        assert_eq!(outcome.error_message.as_deref(), Some("导航超时"));
        assert!(outcome.violations.is_empty());
    }
}
