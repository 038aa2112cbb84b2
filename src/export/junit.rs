//! JUnit XML 导出
//!
//! 每个页面一个 `<testsuite>`：
//! - 每个违规节点一个失败的 `<testcase>`
//! - 每条通过的规则一个成功的 `<testcase>`
//! - 审计失败的页面只有一个带 `<error>` 的 `<testcase>`

use crate::error::ExportResult;
use crate::export::validate_outcome;
use crate::models::{RunReport, TestOutcome};
use crate::utils::escape_xml;

const XML_HEADER: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n";

/// 单个页面的用例计数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct SuiteTotals {
    tests: usize,
    failures: usize,
    errors: usize,
}

impl SuiteTotals {
    fn of(outcome: &TestOutcome) -> Self {
        if outcome.is_failed() {
            return Self {
                tests: 1,
                failures: 0,
                errors: 1,
            };
        }
        let failures = outcome.affected_node_count();
        Self {
            tests: failures + outcome.passes.len(),
            failures,
            errors: 0,
        }
    }

    fn add(&mut self, other: SuiteTotals) {
        self.tests += other.tests;
        self.failures += other.failures;
        self.errors += other.errors;
    }
}

/// 单个页面导出为 JUnit XML
pub fn outcome_to_junit(outcome: &TestOutcome) -> ExportResult<String> {
    validate_outcome(outcome)?;
    let totals = SuiteTotals::of(outcome);

    let mut out = String::from(XML_HEADER);
    out.push_str(&format!(
        "<testsuites name=\"accessibility\" tests=\"{}\" failures=\"{}\" errors=\"{}\">\n",
        totals.tests, totals.failures, totals.errors
    ));
    write_suite(&mut out, outcome, totals);
    out.push_str("</testsuites>\n");
    Ok(out)
}

/// 整次运行导出为 JUnit XML
///
/// 先校验所有页面，任何一个不合法都不输出。
pub fn run_to_junit(report: &RunReport) -> ExportResult<String> {
    let mut totals = SuiteTotals::default();
    let mut suites = Vec::with_capacity(report.outcomes.len());
    for outcome in &report.outcomes {
        validate_outcome(outcome)?;
        let suite_totals = SuiteTotals::of(outcome);
        totals.add(suite_totals);
        suites.push((outcome, suite_totals));
    }

    let mut out = String::from(XML_HEADER);
    out.push_str(&format!(
        "<testsuites name=\"{}\" tests=\"{}\" failures=\"{}\" errors=\"{}\">\n",
        escape_xml(&report.run_id),
        totals.tests,
        totals.failures,
        totals.errors
    ));
    for (outcome, suite_totals) in suites {
        write_suite(&mut out, outcome, suite_totals);
    }
    out.push_str("</testsuites>\n");
    Ok(out)
}

fn write_suite(out: &mut String, outcome: &TestOutcome, totals: SuiteTotals) {
    out.push_str(&format!(
        "  <testsuite name=\"{}\" tests=\"{}\" failures=\"{}\" errors=\"{}\" timestamp=\"{}\">\n",
        escape_xml(&outcome.url),
        totals.tests,
        totals.failures,
        totals.errors,
        outcome.timestamp.format("%Y-%m-%dT%H:%M:%S")
    ));

    if outcome.is_failed() {
        let message = outcome.error_message.as_deref().unwrap_or("audit failed");
        out.push_str(&format!(
            "    <testcase classname=\"audit\" name=\"{}\">\n      <error message=\"{}\" type=\"AuditError\"/>\n    </testcase>\n",
            escape_xml(&outcome.url),
            escape_xml(message)
        ));
        out.push_str("  </testsuite>\n");
        return;
    }

    for violation in &outcome.violations {
        for node in &violation.nodes {
            out.push_str(&format!(
                "    <testcase classname=\"{}\" name=\"{}\">\n",
                escape_xml(&violation.rule_id),
                escape_xml(&node.target_selector)
            ));
            out.push_str(&format!(
                "      <failure message=\"{}: {}\" type=\"{}\">{}</failure>\n",
                violation.impact,
                escape_xml(&violation.description),
                escape_xml(&violation.rule_id),
                escape_xml(&violation.help_url)
            ));
            out.push_str("    </testcase>\n");
        }
    }

    for rule in &outcome.passes {
        out.push_str(&format!(
            "    <testcase classname=\"{}\" name=\"{}\"/>\n",
            escape_xml(&rule.rule_id),
            escape_xml(&rule.description)
        ));
    }
    out.push_str("  </testsuite>\n");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExportError;
    use crate::models::{Impact, OutcomeStatus, RuleSummary, Violation, ViolationNode};
    use chrono::Utc;
    use std::collections::BTreeSet;

    fn outcome() -> TestOutcome {
        TestOutcome {
            url: "https://example.com/a&b".to_string(),
            timestamp: Utc::now(),
            violations: vec![Violation {
                rule_id: "color-contrast".to_string(),
                description: "Elements must have <sufficient> contrast".to_string(),
                help: None,
                help_url: "https://rules.example/color-contrast".to_string(),
                impact: Impact::Serious,
                tags: BTreeSet::new(),
                nodes: vec![
                    ViolationNode::new("p.muted", "<p class=\"muted\">"),
                    ViolationNode::new("span.hint", "<span>"),
                ],
            }],
            passes: vec![RuleSummary {
                rule_id: "document-title".to_string(),
                description: "Documents must have a title".to_string(),
                help: None,
                help_url: String::new(),
                impact: None,
                tags: BTreeSet::new(),
                node_count: 1,
            }],
            incomplete: Vec::new(),
            inapplicable: Vec::new(),
            evidence: Vec::new(),
            status: OutcomeStatus::Completed,
            error_message: None,
        }
    }

    #[test]
    fn test_exact_totals() {
        let xml = outcome_to_junit(&outcome()).unwrap();
        let doc = roxmltree::Document::parse(&xml).unwrap();
        let suite = doc
            .descendants()
            .find(|n| n.has_tag_name("testsuite"))
            .unwrap();
        assert_eq!(suite.attribute("tests"), Some("3"));
        assert_eq!(suite.attribute("failures"), Some("2"));
        assert_eq!(suite.attribute("name"), Some("https://example.com/a&b"));

        let failures: Vec<_> = doc
            .descendants()
            .filter(|n| n.has_tag_name("failure"))
            .collect();
        assert_eq!(failures.len(), 2);
        assert_eq!(
            failures[0].attribute("message"),
            Some("serious: Elements must have <sufficient> contrast")
        );
        assert_eq!(failures[0].attribute("type"), Some("color-contrast"));
        assert_eq!(
            failures[0].text(),
            Some("https://rules.example/color-contrast")
        );
    }

    #[test]
    fn test_run_with_failed_page() {
        let mut run = RunReport::new("run-junit", 2);
        run.record(outcome());
        let mut failed = outcome();
        failed.violations.clear();
        failed.passes.clear();
        failed.status = OutcomeStatus::Failed;
        failed.error_message = Some("navigation timed out".to_string());
        run.record(failed);

        let xml = run_to_junit(&run).unwrap();
        let doc = roxmltree::Document::parse(&xml).unwrap();
        let root = doc.root_element();
        assert_eq!(root.attribute("tests"), Some("4"));
        assert_eq!(root.attribute("failures"), Some("2"));
        assert_eq!(root.attribute("errors"), Some("1"));
        let error = doc.descendants().find(|n| n.has_tag_name("error")).unwrap();
        assert_eq!(error.attribute("message"), Some("navigation timed out"));
    }

    #[test]
    fn test_rejects_empty_violation() {
        let mut bad = outcome();
        bad.violations[0].nodes.clear();
        let before = bad.clone();
        let err = outcome_to_junit(&bad).unwrap_err();
        assert!(matches!(err, ExportError::MalformedViolation { .. }));
        assert_eq!(bad, before);
    }
}
