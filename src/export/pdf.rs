//! PDF 导出
//!
//! 执行摘要先渲染为 HTML，再交给 `PdfRenderer` 生成 PDF。

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ExportResult;
use crate::export::summary::ExecutiveSummary;

/// 页面布局（单位：英寸）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PdfLayout {
    pub landscape: bool,
    pub print_background: bool,
    pub paper_width_in: f64,
    pub paper_height_in: f64,
    pub margin_in: f64,
}

impl Default for PdfLayout {
    /// A4 纵向
    fn default() -> Self {
        Self {
            landscape: false,
            print_background: true,
            paper_width_in: 8.27,
            paper_height_in: 11.69,
            margin_in: 0.4,
        }
    }
}

/// HTML → PDF 渲染器
pub trait PdfRenderer: Send + Sync {
    fn render<'a>(
        &'a self,
        html: &'a str,
        layout: &'a PdfLayout,
    ) -> BoxFuture<'a, ExportResult<Vec<u8>>>;
}

/// 渲染执行摘要 PDF
pub async fn render_executive_pdf(
    renderer: &dyn PdfRenderer,
    summary: &ExecutiveSummary,
    layout: &PdfLayout,
) -> ExportResult<Vec<u8>> {
    let html = summary.render_html();
    let pdf = renderer.render(&html, layout).await?;
    info!("📄 执行摘要 PDF 已生成: {} 字节", pdf.len());
    Ok(pdf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExportError;
    use crate::models::{OutcomeStatus, TestOutcome};
    use chrono::Utc;
    use std::sync::Mutex;

    /// 记录收到的 HTML，返回固定字节
    #[derive(Default)]
    struct RecordingRenderer {
        seen: Mutex<Vec<String>>,
        fail: bool,
    }

    impl PdfRenderer for RecordingRenderer {
        fn render<'a>(
            &'a self,
            html: &'a str,
            _layout: &'a PdfLayout,
        ) -> BoxFuture<'a, ExportResult<Vec<u8>>> {
            Box::pin(async move {
                if self.fail {
                    return Err(ExportError::PdfRenderFailed {
                        source: "printer offline".into(),
                    });
                }
                self.seen.lock().unwrap().push(html.to_string());
                Ok(b"%PDF-1.7".to_vec())
            })
        }
    }

    fn summary() -> ExecutiveSummary {
        ExecutiveSummary::from_outcome(&TestOutcome {
            url: "https://example.com".to_string(),
            timestamp: Utc::now(),
            violations: Vec::new(),
            passes: Vec::new(),
            incomplete: Vec::new(),
            inapplicable: Vec::new(),
            evidence: Vec::new(),
            status: OutcomeStatus::Completed,
            error_message: None,
        })
    }

    #[tokio::test]
    async fn test_renders_summary_html() {
        let renderer = RecordingRenderer::default();
        let pdf = render_executive_pdf(&renderer, &summary(), &PdfLayout::default())
            .await
            .unwrap();
        assert!(pdf.starts_with(b"%PDF"));
        let seen = renderer.seen.lock().unwrap();
        assert!(seen[0].contains("Accessibility executive summary"));
    }

    #[tokio::test]
    async fn test_render_failure_is_export_error() {
        let renderer = RecordingRenderer {
            fail: true,
            ..Default::default()
        };
        let result = render_executive_pdf(&renderer, &summary(), &PdfLayout::default()).await;
        assert!(matches!(result, Err(ExportError::PdfRenderFailed { .. })));
    }
}
