//! HTML 序列化
//!
//! 文档模型只在这里变成 HTML 文本，结构在序列化前已经确定。

use std::collections::HashMap;

use crate::models::{ImageRef, Impact, OutcomeStatus, RunReport};
use crate::report::document::{ConsolidatedReport, GalleryItem, GroupRow, RenderedNode, ViolationSection};
use crate::services::EvidenceStore;
use crate::utils::escape_html;

const BASE_STYLE: &str = "\
body { font-family: system-ui, sans-serif; max-width: 1100px; margin: 0 auto; padding: 2rem; color: #111827; }
table { border-collapse: collapse; width: 100%; margin: 0.5rem 0 1rem; }
th, td { border: 1px solid #e5e7eb; padding: 0.4rem 0.6rem; text-align: left; vertical-align: top; }
code { font-family: monospace; font-size: 0.85rem; word-break: break-all; }
.badge { display: inline-block; padding: 0.1rem 0.5rem; border-radius: 0.25rem; color: #fff; font-size: 0.8rem; text-transform: uppercase; }
.badge.moderate { color: #000; }
.more { color: #6b7280; font-style: italic; }
.gallery { display: flex; flex-wrap: wrap; gap: 1rem; margin-bottom: 2rem; }
.gallery figure { margin: 0; max-width: 320px; }
.gallery img { max-width: 100%; border: 1px solid #e5e7eb; }
.error { color: #b91c1c; }
";

/// 证据图引用到 `<img src>` 的映射
pub type GalleryImages = HashMap<ImageRef, String>;

/// 从存储中读出报告引用的全部证据图
///
/// 优先以 data URI 内嵌，存储中取不到时退回引用路径。
pub async fn load_gallery_images(
    report: &ConsolidatedReport,
    store: &dyn EvidenceStore,
) -> GalleryImages {
    let mut images = GalleryImages::new();
    for item in report.sections.iter().flat_map(|section| &section.gallery) {
        if images.contains_key(&item.image_ref) {
            continue;
        }
        let src = store
            .data_uri(&item.image_ref)
            .await
            .unwrap_or_else(|| item.image_ref.to_string());
        images.insert(item.image_ref.clone(), src);
    }
    images
}

/// 渲染单个 URL 的报告
pub fn render_outcome_html(report: &ConsolidatedReport, images: &GalleryImages) -> String {
    let mut html = String::new();
    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n");
    html.push_str(&format!(
        "<title>Accessibility report - {}</title>\n",
        escape_html(&report.url)
    ));
    html.push_str(&format!("<style>\n{}</style>\n</head>\n<body>\n", BASE_STYLE));

    html.push_str(&format!(
        "<h1>Accessibility report</h1>\n<p><a href=\"{url}\">{url}</a><br>Audited {}</p>\n",
        report.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
        url = escape_html(&report.url)
    ));

    if report.status == OutcomeStatus::Failed {
        html.push_str(&format!(
            "<p class=\"error\">Audit failed: {}</p>\n</body>\n</html>\n",
            escape_html(report.error_message.as_deref().unwrap_or("unknown error"))
        ));
        return html;
    }

    html.push_str("<h2>Summary</h2>\n<table>\n<tr><th>Impact</th><th>Rules</th></tr>\n");
    for impact in Impact::ALL {
        html.push_str(&format!(
            "<tr><td>{}</td><td>{}</td></tr>\n",
            badge(impact),
            report.breakdown.get(impact)
        ));
    }
    html.push_str("</table>\n");
    html.push_str(&format!(
        "<p>{} violations across {} elements, {} rules passed, {} inapplicable, {} need review.</p>\n",
        report.sections.len(),
        report.total_nodes(),
        report.passed_rules,
        report.inapplicable_rules,
        report.incomplete.len()
    ));

    if report.sections.is_empty() {
        html.push_str("<p>No violations found.</p>\n");
    } else {
        html.push_str("<h2>Violations</h2>\n");
        for section in &report.sections {
            render_section(&mut html, section, images);
        }
    }

    if !report.incomplete.is_empty() {
        html.push_str("<h2>Needs review</h2>\n<ul>\n");
        for rule in &report.incomplete {
            html.push_str(&format!(
                "<li><strong>{}</strong>: {} ({} elements)</li>\n",
                escape_html(&rule.rule_id),
                escape_html(&rule.description),
                rule.node_count
            ));
        }
        html.push_str("</ul>\n");
    }

    html.push_str("</body>\n</html>\n");
    html
}

fn render_section(html: &mut String, section: &ViolationSection, images: &GalleryImages) {
    html.push_str(&format!(
        "<section id=\"{}\">\n<h3>{} {}</h3>\n<p>{}</p>\n",
        section.anchor,
        badge(section.impact),
        escape_html(&section.rule_id),
        escape_html(&section.description)
    ));
    html.push_str(&format!(
        "<p><a href=\"{}\">Rule documentation</a></p>\n",
        escape_html(&section.help_url)
    ));

    html.push_str("<table>\n<tr><th>How to fix</th><th>Element</th><th>HTML</th></tr>\n");
    for row in &section.table.groups {
        render_row(html, row);
    }
    html.push_str("</table>\n");

    if !section.gallery.is_empty() {
        html.push_str("<div class=\"gallery\">\n");
        for item in &section.gallery {
            render_gallery_item(html, item, images);
        }
        html.push_str("</div>\n");
    }
    html.push_str("</section>\n");
}

fn render_row(html: &mut String, row: &GroupRow) {
    let examples = row.examples();
    let extra = usize::from(row.more_label().is_some());
    let span = examples.len() + extra;

    for (i, node) in examples.iter().enumerate() {
        html.push_str("<tr>");
        if i == 0 {
            html.push_str(&format!(
                "<td rowspan=\"{}\">{}</td>",
                span,
                escape_html(row.remediation())
            ));
        }
        render_node_cells(html, node);
        html.push_str("</tr>\n");
    }
    if let Some(more) = row.more_label() {
        html.push_str(&format!(
            "<tr><td colspan=\"2\" class=\"more\">{}</td></tr>\n",
            more
        ));
    }
}

fn render_node_cells(html: &mut String, node: &RenderedNode) {
    html.push_str(&format!(
        "<td><code>{}</code></td><td><code>{}</code></td>",
        escape_html(&node.selector),
        escape_html(&node.markup)
    ));
}

fn render_gallery_item(html: &mut String, item: &GalleryItem, images: &GalleryImages) {
    let src = images
        .get(&item.image_ref)
        .cloned()
        .unwrap_or_else(|| item.image_ref.to_string());
    html.push_str(&format!(
        "<figure><img src=\"{}\" alt=\"Highlighted element {}\"><figcaption>{} <code>{}</code></figcaption></figure>\n",
        escape_html(&src),
        escape_html(&item.selector),
        badge(item.impact),
        escape_html(&item.selector)
    ));
}

fn badge(impact: Impact) -> String {
    format!(
        "<span class=\"badge {name}\" style=\"background:{}\">{name}</span>",
        impact.css_color(),
        name = impact.as_str()
    )
}

/// 单个 URL 报告的文件名（序号从 1 开始）
pub fn outcome_file_name(url_index: usize) -> String {
    format!("page-{:03}.html", url_index)
}

/// 渲染运行索引页
pub fn render_run_index(report: &RunReport) -> String {
    let mut html = String::new();
    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n");
    html.push_str(&format!(
        "<title>Accessibility run {}</title>\n",
        escape_html(&report.run_id)
    ));
    html.push_str(&format!("<style>\n{}</style>\n</head>\n<body>\n", BASE_STYLE));
    html.push_str(&format!(
        "<h1>Accessibility run {}</h1>\n<p>Status: <strong>{:?}</strong> - {} of {} pages processed, {} failed.</p>\n",
        escape_html(&report.run_id),
        report.status,
        report.completed_count,
        report.total_urls,
        report.failed_count
    ));
    if let Some(fatal) = &report.fatal_error {
        html.push_str(&format!("<p class=\"error\">{}</p>\n", escape_html(fatal)));
    }

    html.push_str("<table>\n<tr><th>#</th><th>URL</th><th>Status</th><th>Violations</th>");
    for impact in Impact::ALL {
        html.push_str(&format!("<th>{}</th>", badge(impact)));
    }
    html.push_str("</tr>\n");

    for (i, outcome) in report.outcomes.iter().enumerate() {
        let file = outcome_file_name(i + 1);
        let breakdown = outcome.impact_breakdown();
        let status = if outcome.is_failed() {
            format!(
                "<span class=\"error\">failed: {}</span>",
                escape_html(outcome.error_message.as_deref().unwrap_or(""))
            )
        } else {
            "completed".to_string()
        };
        html.push_str(&format!(
            "<tr><td>{}</td><td><a href=\"{}\">{}</a></td><td>{}</td><td>{}</td>",
            i + 1,
            file,
            escape_html(&outcome.url),
            status,
            outcome.violations.len()
        ));
        for impact in Impact::ALL {
            html.push_str(&format!("<td>{}</td>", breakdown.get(impact)));
        }
        html.push_str("</tr>\n");
    }
    html.push_str("</table>\n</body>\n</html>\n");
    html
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EvidenceRecord, TestOutcome, Violation, ViolationNode};
    use crate::report::ReportConsolidator;
    use crate::services::{EvidenceKey, MemoryEvidenceStore};
    use chrono::Utc;
    use std::collections::BTreeSet;

    async fn outcome_with_evidence(store: &MemoryEvidenceStore) -> TestOutcome {
        let key = EvidenceKey {
            run_id: "run-1".to_string(),
            url_index: 1,
            violation_index: 0,
            node_index: 0,
        };
        let image_ref = store.put(&key, vec![0x89, b'P', b'N', b'G']).await.unwrap();
        let nodes = (0..5)
            .map(|i| ViolationNode::new(format!("a.link-{}", i), "<a href=\"#\"></a>"))
            .collect();
        TestOutcome {
            url: "https://example.com/?q=<x>".to_string(),
            timestamp: Utc::now(),
            violations: vec![Violation {
                rule_id: "link-name".to_string(),
                description: "Links must have discernible text".to_string(),
                help: Some("Links must have discernible text".to_string()),
                help_url: "https://rules.example/link-name".to_string(),
                impact: Impact::Serious,
                tags: BTreeSet::new(),
                nodes,
            }],
            passes: Vec::new(),
            incomplete: Vec::new(),
            inapplicable: Vec::new(),
            evidence: vec![EvidenceRecord {
                violation_index: 0,
                node_index: 0,
                impact: Impact::Serious,
                image_ref,
                element_selector: "a.link-0".to_string(),
            }],
            status: OutcomeStatus::Completed,
            error_message: None,
        }
    }

    #[tokio::test]
    async fn test_gallery_follows_table() {
        let store = MemoryEvidenceStore::new();
        let report = ReportConsolidator::new().consolidate(&outcome_with_evidence(&store).await);
        let images = load_gallery_images(&report, &store).await;
        let html = render_outcome_html(&report, &images);

        let table_end = html.find("</table>\n<div class=\"gallery\">");
        assert!(table_end.is_some());
        assert!(html.contains("data:image/png;base64,"));
        assert!(html.contains("+2 more"));
        assert!(html.contains("id=\"violation-0\""));
        // URL 已转义
        assert!(html.contains("q=&lt;x&gt;"));
        assert_eq!(html.matches("<code>a.link-").count(), 4);
    }

    #[tokio::test]
    async fn test_gallery_falls_back_to_reference() {
        let store = MemoryEvidenceStore::new();
        let report = ReportConsolidator::new().consolidate(&outcome_with_evidence(&store).await);
        let html = render_outcome_html(&report, &GalleryImages::new());
        assert!(html.contains("src=\"mem://run-1/001-v000-n000.png\""));
        assert!(!html.contains("data:image/png;base64,"));
    }

    #[tokio::test]
    async fn test_run_index_links_pages() {
        let store = MemoryEvidenceStore::new();
        let mut run = RunReport::new("run-1", 2);
        run.record(outcome_with_evidence(&store).await);
        run.finish();
        let html = render_run_index(&run);
        assert!(html.contains("href=\"page-001.html\""));
        assert!(html.contains("PartiallyFailed"));
    }
}
