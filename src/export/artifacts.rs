//! 运行产物写入
//!
//! 把一次运行的所有导出格式写到输出目录：
//! `report.json`、`index.html`、`page-NNN.html`、`junit.xml`、`results.sarif`、`summary.html`

use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::info;

use crate::error::{ExportError, ExportResult};
use crate::export::pdf::{render_executive_pdf, PdfLayout, PdfRenderer};
use crate::export::summary::ExecutiveSummary;
use crate::export::{junit, sarif};
use crate::models::RunReport;
use crate::report::html::{
    load_gallery_images, outcome_file_name, render_outcome_html, render_run_index,
};
use crate::report::ReportConsolidator;
use crate::services::EvidenceStore;

/// 写入的文件路径
#[derive(Debug, Clone, Default)]
pub struct ArtifactPaths {
    pub report_json: PathBuf,
    pub index_html: PathBuf,
    pub pages: Vec<PathBuf>,
    pub junit: PathBuf,
    pub sarif: PathBuf,
    pub summary_html: PathBuf,
}

/// 写入一次运行的全部文本产物
///
/// 所有内容先在内存中生成，格式化失败时不会留下半套文件。
pub async fn write_run_artifacts(
    dir: &Path,
    report: &RunReport,
    store: &dyn EvidenceStore,
) -> ExportResult<ArtifactPaths> {
    let report_json = serde_json::to_string_pretty(report)
        .map_err(|source| ExportError::Serialization { source })?;
    let junit_xml = junit::run_to_junit(report)?;
    let sarif_json = sarif::run_to_sarif(report)?.to_json()?;
    let summary_html = ExecutiveSummary::from_run(report).render_html();

    let consolidator = ReportConsolidator::new();
    let mut pages = Vec::with_capacity(report.outcomes.len());
    for (i, outcome) in report.outcomes.iter().enumerate() {
        let document = consolidator.consolidate(outcome);
        let images = load_gallery_images(&document, store).await;
        pages.push((outcome_file_name(i + 1), render_outcome_html(&document, &images)));
    }

    fs::create_dir_all(dir)
        .await
        .map_err(|source| write_failed(dir, source))?;

    let mut paths = ArtifactPaths {
        report_json: write_file(dir, "report.json", report_json.as_bytes()).await?,
        index_html: write_file(dir, "index.html", render_run_index(report).as_bytes()).await?,
        junit: write_file(dir, "junit.xml", junit_xml.as_bytes()).await?,
        sarif: write_file(dir, "results.sarif", sarif_json.as_bytes()).await?,
        summary_html: write_file(dir, "summary.html", summary_html.as_bytes()).await?,
        pages: Vec::with_capacity(pages.len()),
    };
    for (name, html) in pages {
        paths.pages.push(write_file(dir, &name, html.as_bytes()).await?);
    }

    info!(
        "💾 [运行 {}] 报告已写入 {} ({} 个页面)",
        report.run_id,
        dir.display(),
        paths.pages.len()
    );
    Ok(paths)
}

/// 渲染并写入执行摘要 PDF
pub async fn write_summary_pdf(
    dir: &Path,
    report: &RunReport,
    renderer: &dyn PdfRenderer,
) -> ExportResult<PathBuf> {
    let summary = ExecutiveSummary::from_run(report);
    let pdf = render_executive_pdf(renderer, &summary, &PdfLayout::default()).await?;
    write_file(dir, "summary.pdf", &pdf).await
}

async fn write_file(dir: &Path, name: &str, contents: &[u8]) -> ExportResult<PathBuf> {
    let path = dir.join(name);
    fs::write(&path, contents)
        .await
        .map_err(|source| write_failed(&path, source))?;
    Ok(path)
}

fn write_failed(path: &Path, source: std::io::Error) -> ExportError {
    ExportError::WriteFailed {
        path: path.display().to_string(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{OutcomeStatus, TestOutcome};
    use crate::services::MemoryEvidenceStore;
    use chrono::Utc;

    #[tokio::test]
    async fn test_writes_all_artifacts() {
        let dir = std::env::temp_dir().join(format!(
            "a11y-artifacts-{}-{}",
            std::process::id(),
            Utc::now().timestamp_nanos_opt().unwrap_or_default()
        ));
        let mut report = RunReport::new("run-artifacts", 1);
        report.record(TestOutcome {
            url: "https://example.com".to_string(),
            timestamp: Utc::now(),
            violations: Vec::new(),
            passes: Vec::new(),
            incomplete: Vec::new(),
            inapplicable: Vec::new(),
            evidence: Vec::new(),
            status: OutcomeStatus::Completed,
            error_message: None,
        });
        report.finish();

        let store = MemoryEvidenceStore::new();
        let paths = write_run_artifacts(&dir, &report, &store).await.unwrap();

        assert_eq!(paths.pages.len(), 1);
        assert!(paths.pages[0].ends_with("page-001.html"));
        let json = std::fs::read_to_string(&paths.report_json).unwrap();
        let parsed: RunReport = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.run_id, "run-artifacts");
        assert!(json.contains("\"completedCount\": 1"));
        assert!(paths.sarif.exists());

        std::fs::remove_dir_all(&dir).ok();
    }
}
