use crate::models::impact::Impact;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// 违反规则的单个 DOM 节点
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViolationNode {
    /// 定位元素的选择器
    pub target_selector: String,
    /// 元素的 HTML 片段
    pub markup_snippet: String,
    /// 规则引擎给出的节点级修复建议
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_summary: Option<String>,
    /// 选择器需要先进入 iframe 或 shadow root 才能解析
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub nested_context: bool,
}

impl ViolationNode {
    pub fn new(target_selector: impl Into<String>, markup_snippet: impl Into<String>) -> Self {
        Self {
            target_selector: target_selector.into(),
            markup_snippet: markup_snippet.into(),
            failure_summary: None,
            nested_context: false,
        }
    }

    pub fn in_nested_context(mut self) -> Self {
        self.nested_context = true;
        self
    }

    pub fn with_failure_summary(mut self, summary: impl Into<String>) -> Self {
        self.failure_summary = Some(summary.into());
        self
    }
}

/// 一条规则的违规结果
///
/// `nodes` 始终非空，由 `ResultAggregator` 在归一化时保证。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Violation {
    pub rule_id: String,
    pub description: String,
    /// 规则级修复建议
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,
    pub help_url: String,
    pub impact: Impact,
    pub tags: BTreeSet<String>,
    pub nodes: Vec<ViolationNode>,
}

impl Violation {
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

/// 通过 / 待确认 / 不适用的规则摘要
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleSummary {
    pub rule_id: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,
    pub help_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impact: Option<Impact>,
    pub tags: BTreeSet<String>,
    pub node_count: usize,
}
