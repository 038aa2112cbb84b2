//! 执行摘要
//!
//! 评分、等级、严重程度分布、主要问题类别和建议列表。
//! 所有统计都是与顺序无关的聚合。

use serde::Serialize;
use std::collections::HashMap;

use crate::models::{Impact, ImpactBreakdown, RunReport, TestOutcome};
use crate::utils::escape_html;

/// 规则标签中表示问题类别的前缀
pub const CATEGORY_TAG_PREFIX: &str = "cat.";

/// 展示的主要类别上限
pub const MAX_TOP_CATEGORIES: usize = 5;

pub const POSITIVE_RECOMMENDATION: &str =
    "Great job! No major accessibility issues were detected. Keep accessibility in your regular review process.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Grade {
    Excellent,
    Good,
    Fair,
    NeedsImprovement,
}

impl Grade {
    pub fn label(self) -> &'static str {
        match self {
            Grade::Excellent => "Excellent",
            Grade::Good => "Good",
            Grade::Fair => "Fair",
            Grade::NeedsImprovement => "Needs Improvement",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryCount {
    pub name: String,
    pub count: usize,
}

/// 执行摘要模型
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutiveSummary {
    /// 页面 URL 或运行 ID
    pub scope: String,
    pub pages_audited: usize,
    pub pages_failed: usize,
    pub score: u8,
    pub grade: Grade,
    pub breakdown: ImpactBreakdown,
    pub total_violations: usize,
    pub affected_nodes: usize,
    pub passes: usize,
    pub incomplete: usize,
    pub inapplicable: usize,
    pub top_categories: Vec<CategoryCount>,
    pub recommendations: Vec<String>,
}

/// `round(100 × passes / 全部评估规则数)`，没有任何规则时为 100
pub fn compute_score(violations: usize, passes: usize, incomplete: usize, inapplicable: usize) -> u8 {
    let total = violations + passes + incomplete + inapplicable;
    if total == 0 {
        return 100;
    }
    ((passes as f64 * 100.0) / total as f64).round() as u8
}

pub fn grade_for(score: u8) -> Grade {
    match score {
        95..=u8::MAX => Grade::Excellent,
        85..=94 => Grade::Good,
        70..=84 => Grade::Fair,
        _ => Grade::NeedsImprovement,
    }
}

/// 从规则标签中解析问题类别（`cat.forms` → `forms`）
pub fn category_from_tag(tag: &str) -> Option<&str> {
    tag.strip_prefix(CATEGORY_TAG_PREFIX)
        .filter(|category| !category.is_empty())
}

/// 按违规数降序排列的类别，数量相同时按名称升序，最多 5 个
pub fn top_categories<'a>(outcomes: impl IntoIterator<Item = &'a TestOutcome>) -> Vec<CategoryCount> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for outcome in outcomes {
        for violation in &outcome.violations {
            for category in violation.tags.iter().filter_map(|tag| category_from_tag(tag)) {
                *counts.entry(category).or_default() += 1;
            }
        }
    }

    let mut categories: Vec<CategoryCount> = counts
        .into_iter()
        .map(|(name, count)| CategoryCount {
            name: name.to_string(),
            count,
        })
        .collect();
    categories.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
    categories.truncate(MAX_TOP_CATEGORIES);
    categories
}

/// 按固定优先级生成建议
pub fn recommendations(
    breakdown: &ImpactBreakdown,
    incomplete: usize,
    top_categories: &[CategoryCount],
) -> Vec<String> {
    let mut lines = Vec::new();
    let critical = breakdown.get(Impact::Critical);
    if critical > 0 {
        lines.push(format!(
            "Urgent: fix {} critical issue(s) immediately. They block access for some users entirely.",
            critical
        ));
    }
    let serious = breakdown.get(Impact::Serious);
    if serious > 0 {
        lines.push(format!(
            "Address {} serious issue(s) in the next release cycle.",
            serious
        ));
    }
    if incomplete > 0 {
        lines.push(format!(
            "Manually review {} check(s) that could not be decided automatically.",
            incomplete
        ));
    }
    if let Some(top) = top_categories.first() {
        lines.push(format!(
            "Focus remediation on \"{}\", the most frequent issue category ({} violation(s)).",
            top.name, top.count
        ));
    }
    if lines.is_empty() {
        lines.push(POSITIVE_RECOMMENDATION.to_string());
    }
    lines
}

impl ExecutiveSummary {
    pub fn from_outcome(outcome: &TestOutcome) -> Self {
        Self::aggregate(outcome.url.clone(), std::slice::from_ref(outcome))
    }

    /// 整次运行的摘要，审计失败的页面只计入 `pages_failed`
    pub fn from_run(report: &RunReport) -> Self {
        Self::aggregate(report.run_id.clone(), &report.outcomes)
    }

    fn aggregate(scope: String, outcomes: &[TestOutcome]) -> Self {
        let audited: Vec<&TestOutcome> = outcomes.iter().filter(|o| !o.is_failed()).collect();

        let mut breakdown = ImpactBreakdown::default();
        let mut total_violations = 0;
        let mut affected_nodes = 0;
        let mut passes = 0;
        let mut incomplete = 0;
        let mut inapplicable = 0;
        for outcome in &audited {
            breakdown.merge(&outcome.impact_breakdown());
            total_violations += outcome.violations.len();
            affected_nodes += outcome.affected_node_count();
            passes += outcome.passes.len();
            incomplete += outcome.incomplete.len();
            inapplicable += outcome.inapplicable.len();
        }

        let score = compute_score(total_violations, passes, incomplete, inapplicable);
        let top_categories = top_categories(audited.iter().copied());
        let recommendations = recommendations(&breakdown, incomplete, &top_categories);

        Self {
            scope,
            pages_audited: outcomes.len(),
            pages_failed: outcomes.len() - audited.len(),
            score,
            grade: grade_for(score),
            breakdown,
            total_violations,
            affected_nodes,
            passes,
            incomplete,
            inapplicable,
            top_categories,
            recommendations,
        }
    }

    /// 渲染为独立 HTML（也作为 PDF 的输入）
    pub fn render_html(&self) -> String {
        let mut html = String::new();
        html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n");
        html.push_str("<title>Accessibility executive summary</title>\n<style>\n");
        html.push_str("body { font-family: system-ui, sans-serif; margin: 2rem; color: #111827; }\n");
        html.push_str(".score { font-size: 3rem; font-weight: 700; }\n");
        html.push_str("table { border-collapse: collapse; }\n");
        html.push_str("td, th { border: 1px solid #e5e7eb; padding: 0.3rem 0.8rem; text-align: left; }\n");
        html.push_str("</style>\n</head>\n<body>\n");

        html.push_str(&format!(
            "<h1>Accessibility executive summary</h1>\n<p>{}</p>\n",
            escape_html(&self.scope)
        ));
        html.push_str(&format!(
            "<p class=\"score\">{} / 100</p>\n<p>Grade: <strong>{}</strong></p>\n",
            self.score,
            self.grade.label()
        ));
        html.push_str(&format!(
            "<p>{} page(s) audited, {} failed. {} violation(s) affecting {} element(s); {} rule(s) passed, {} need review, {} inapplicable.</p>\n",
            self.pages_audited,
            self.pages_failed,
            self.total_violations,
            self.affected_nodes,
            self.passes,
            self.incomplete,
            self.inapplicable
        ));

        html.push_str("<h2>Severity breakdown</h2>\n<table>\n");
        for impact in Impact::ALL {
            html.push_str(&format!(
                "<tr><th style=\"color:{}\">{}</th><td>{}</td></tr>\n",
                impact.css_color(),
                impact,
                self.breakdown.get(impact)
            ));
        }
        html.push_str("</table>\n");

        if !self.top_categories.is_empty() {
            html.push_str("<h2>Top issue categories</h2>\n<ol>\n");
            for category in &self.top_categories {
                html.push_str(&format!(
                    "<li>{} ({})</li>\n",
                    escape_html(&category.name),
                    category.count
                ));
            }
            html.push_str("</ol>\n");
        }

        html.push_str("<h2>Recommendations</h2>\n<ul>\n");
        for line in &self.recommendations {
            html.push_str(&format!("<li>{}</li>\n", escape_html(line)));
        }
        html.push_str("</ul>\n</body>\n</html>\n");
        html
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{OutcomeStatus, RuleSummary, Violation, ViolationNode};
    use chrono::Utc;
    use std::collections::BTreeSet;

    fn rule(id: usize) -> RuleSummary {
        RuleSummary {
            rule_id: format!("rule-{}", id),
            description: String::new(),
            help: None,
            help_url: String::new(),
            impact: None,
            tags: BTreeSet::new(),
            node_count: 1,
        }
    }

    fn violation(id: &str, impact: Impact, tags: &[&str]) -> Violation {
        Violation {
            rule_id: id.to_string(),
            description: String::new(),
            help: None,
            help_url: String::new(),
            impact,
            tags: tags.iter().map(|t| t.to_string()).collect(),
            nodes: vec![ViolationNode::new("body", "<body>")],
        }
    }

    fn outcome(violations: Vec<Violation>, passes: usize, incomplete: usize, inapplicable: usize) -> TestOutcome {
        TestOutcome {
            url: "https://example.com".to_string(),
            timestamp: Utc::now(),
            violations,
            passes: (0..passes).map(rule).collect(),
            incomplete: (0..incomplete).map(rule).collect(),
            inapplicable: (0..inapplicable).map(rule).collect(),
            evidence: Vec::new(),
            status: OutcomeStatus::Completed,
            error_message: None,
        }
    }

    #[test]
    fn test_clean_page_is_excellent() {
        let summary = ExecutiveSummary::from_outcome(&outcome(Vec::new(), 50, 0, 0));
        assert_eq!(summary.score, 100);
        assert_eq!(summary.grade, Grade::Excellent);
        assert_eq!(summary.grade.label(), "Excellent");
        assert_eq!(summary.recommendations, vec![POSITIVE_RECOMMENDATION.to_string()]);
    }

    #[test]
    fn test_grade_thresholds() {
        assert_eq!(grade_for(95), Grade::Excellent);
        assert_eq!(grade_for(94), Grade::Good);
        assert_eq!(grade_for(85), Grade::Good);
        assert_eq!(grade_for(84), Grade::Fair);
        assert_eq!(grade_for(70), Grade::Fair);
        assert_eq!(grade_for(69), Grade::NeedsImprovement);
        assert_eq!(compute_score(0, 0, 0, 0), 100);
        assert_eq!(compute_score(1, 2, 0, 0), 67);
    }

    #[test]
    fn test_score_ignores_order() {
        let violations = vec![
            violation("a", Impact::Critical, &["cat.forms"]),
            violation("b", Impact::Minor, &["cat.color"]),
        ];
        let forward = outcome(violations.clone(), 7, 2, 3);
        let mut reversed = forward.clone();
        reversed.violations.reverse();
        reversed.passes.reverse();
        reversed.incomplete.reverse();
        reversed.inapplicable.reverse();

        let a = ExecutiveSummary::from_outcome(&forward);
        let b = ExecutiveSummary::from_outcome(&reversed);
        assert_eq!(a.score, b.score);
        assert_eq!(a.top_categories, b.top_categories);
        assert_eq!(a.recommendations, b.recommendations);
    }

    #[test]
    fn test_recommendation_precedence() {
        let summary = ExecutiveSummary::from_outcome(&outcome(
            vec![
                violation("a", Impact::Critical, &["cat.forms", "wcag2a"]),
                violation("b", Impact::Serious, &["cat.forms"]),
                violation("c", Impact::Minor, &["cat.color"]),
            ],
            10,
            1,
            0,
        ));
        assert_eq!(summary.recommendations.len(), 4);
        assert!(summary.recommendations[0].starts_with("Urgent"));
        assert!(summary.recommendations[1].contains("serious"));
        assert!(summary.recommendations[2].contains("Manually review"));
        assert!(summary.recommendations[3].contains("\"forms\""));
        assert_eq!(summary.top_categories[0], CategoryCount { name: "forms".to_string(), count: 2 });
    }

    #[test]
    fn test_top_categories_capped() {
        let tags = ["cat.a", "cat.b", "cat.c", "cat.d", "cat.e", "cat.f"];
        let violations = tags
            .iter()
            .map(|tag| violation(tag, Impact::Moderate, &[*tag]))
            .collect();
        let summary = ExecutiveSummary::from_outcome(&outcome(violations, 0, 0, 0));
        assert_eq!(summary.top_categories.len(), 5);
        assert_eq!(summary.top_categories[0].name, "a");
        assert_eq!(category_from_tag("wcag2aa"), None);
        assert_eq!(category_from_tag("cat."), None);
    }

    #[test]
    fn test_run_summary_skips_failed_pages() {
        let mut run = RunReport::new("run-summary", 2);
        run.record(outcome(vec![violation("a", Impact::Serious, &[])], 3, 0, 0));
        let mut failed = outcome(Vec::new(), 0, 0, 0);
        failed.status = OutcomeStatus::Failed;
        run.record(failed);

        let summary = ExecutiveSummary::from_run(&run);
        assert_eq!(summary.pages_audited, 2);
        assert_eq!(summary.pages_failed, 1);
        assert_eq!(summary.score, 75);
        assert!(summary.render_html().contains("75 / 100"));
    }
}
