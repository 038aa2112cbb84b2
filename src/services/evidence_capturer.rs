//! 证据截图服务 - 业务能力层
//!
//! 只负责"为一个违规节点截一张标注图"能力，不关心流程

use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, warn};

use crate::browser::AuditPage;
use crate::config::Config;
use crate::error::AppResult;
use crate::models::{EvidenceRecord, Impact, ViolationNode};
use crate::services::evidence_store::{EvidenceKey, EvidenceStore};
use crate::services::overlay;

/// 截图参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptureSettings {
    /// 元素四周留白（CSS 像素）
    pub padding_px: f64,
    /// 滚动后等待过渡动画的时间
    pub settle_delay: Duration,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            padding_px: 20.0,
            settle_delay: Duration::from_millis(300),
        }
    }
}

impl CaptureSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            padding_px: config.evidence_padding_px.max(0.0),
            settle_delay: config.settle_delay(),
        }
    }
}

/// 证据截图服务
///
/// 职责：
/// - 定位元素、滚动、截图、标注、保存
/// - 元素不可见时跳过（不是错误）
/// - 任何失败都只影响这一张截图
pub struct EvidenceCapturer {
    store: Arc<dyn EvidenceStore>,
    settings: CaptureSettings,
}

impl EvidenceCapturer {
    pub fn new(store: Arc<dyn EvidenceStore>, settings: CaptureSettings) -> Self {
        Self { store, settings }
    }

    pub fn store(&self) -> &Arc<dyn EvidenceStore> {
        &self.store
    }

    /// 为单个违规节点截图
    ///
    /// # 返回
    /// 成功返回证据记录；元素不可见或任何步骤失败时返回 `None`
    pub async fn capture(
        &self,
        page: &dyn AuditPage,
        node: &ViolationNode,
        impact: Impact,
        key: EvidenceKey,
    ) -> Option<EvidenceRecord> {
        if node.nested_context {
            debug!(
                "选择器位于 iframe 或 shadow DOM 内，主文档无法定位，跳过截图: {}",
                node.target_selector
            );
            return None;
        }
        match self.try_capture(page, node, impact, &key).await {
            Ok(Some(record)) => Some(record),
            Ok(None) => {
                debug!("元素不可见，跳过截图: {}", node.target_selector);
                None
            }
            Err(e) => {
                warn!("⚠️ 截图失败 ({}): {}", node.target_selector, e);
                None
            }
        }
    }

    async fn try_capture(
        &self,
        page: &dyn AuditPage,
        node: &ViolationNode,
        impact: Impact,
        key: &EvidenceKey,
    ) -> AppResult<Option<EvidenceRecord>> {
        let Some(element) = page.locate(&node.target_selector).await? else {
            return Ok(None);
        };
        if !element.visible {
            return Ok(None);
        }

        page.scroll_into_view(&element).await?;
        sleep(self.settings.settle_delay).await;

        let Some(bounds) = page.bounding_box(&element).await? else {
            return Ok(None);
        };
        if bounds.is_empty() {
            return Ok(None);
        }

        let region = bounds.padded(self.settings.padding_px);
        let raw = page.screenshot(region).await?;
        // 色块只覆盖元素本身，留白保留为上下文
        let composited = overlay::highlight(&raw, bounds.relative_to(&region), region, impact)?;
        let image_ref = self.store.put(key, composited).await?;

        Ok(Some(EvidenceRecord {
            violation_index: key.violation_index,
            node_index: key.node_index,
            impact,
            image_ref,
            element_selector: node.target_selector.clone(),
        }))
    }
}
