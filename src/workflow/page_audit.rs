//! 单页审计流程 - 流程层
//!
//! 核心职责：定义"一个 URL"的完整审计流程
//!
//! 流程顺序：
//! 1. 导航（带超时）
//! 2. 规则引擎执行（带超时）
//! 3. 归一化结果
//! 4. 逐个违规节点截图（可选）

use std::sync::Arc;

use tracing::{debug, info};

use crate::browser::AuditPage;
use crate::engine::RuleEngine;
use crate::error::{AppError, AppResult, EngineError};
use crate::models::{EvidenceRecord, RunOptions, TestOutcome, Violation};
use crate::services::{EvidenceCapturer, EvidenceKey, EvidenceStore, ResultAggregator};
use crate::workflow::audit_ctx::AuditCtx;

/// 单页审计流程
///
/// - 编排导航 → 规则执行 → 截图 → 归集
/// - 不持有页面，页面的打开与关闭由编排层负责
/// - 只依赖业务能力（engine / services）
pub struct PageAudit {
    engine: Arc<dyn RuleEngine>,
    capturer: EvidenceCapturer,
    max_evidence_per_violation: usize,
}

impl PageAudit {
    /// 创建新的单页审计流程
    pub fn new(
        engine: Arc<dyn RuleEngine>,
        capturer: EvidenceCapturer,
        max_evidence_per_violation: usize,
    ) -> Self {
        Self {
            engine,
            capturer,
            max_evidence_per_violation,
        }
    }

    /// 证据截图所在的存储
    pub fn evidence_store(&self) -> &Arc<dyn EvidenceStore> {
        self.capturer.store()
    }

    /// 审计一个 URL
    ///
    /// 返回 `Err` 表示本 URL 审计失败，由编排层记录为失败结果。
    pub async fn run(
        &self,
        page: &dyn AuditPage,
        ctx: &AuditCtx,
        options: &RunOptions,
    ) -> AppResult<TestOutcome> {
        // ========== 1. 导航 ==========
        page.navigate(&ctx.url, options.per_page_timeout).await?;
        debug!("{} ✓ 页面加载完成", ctx);

        // ========== 2. 规则执行 ==========
        let evaluation = self.engine.evaluate(page, &options.wcag_tags);
        let results = tokio::time::timeout(options.per_page_timeout, evaluation)
            .await
            .map_err(|_| {
                AppError::Engine(EngineError::Timeout {
                    timeout_ms: options.per_page_timeout.as_millis() as u64,
                })
            })??;

        // ========== 3. 归一化 ==========
        let mut aggregator = ResultAggregator::new(&ctx.url).with_results(results);
        let violation_count = aggregator.violations().len();
        let node_count: usize = aggregator.violations().iter().map(|v| v.nodes.len()).sum();
        info!(
            "{} 🔍 规则执行完成: {} 条违规, {} 个节点",
            ctx, violation_count, node_count
        );

        // ========== 4. 截图 ==========
        if options.capture_evidence && violation_count > 0 {
            let records = self.capture_all(page, ctx, aggregator.violations()).await;
            info!("{} 📸 截图完成: {}/{}", ctx, records.len(), node_count);
            for record in records {
                aggregator.add_evidence(record);
            }
        }

        Ok(aggregator.finish())
    }

    /// 为违规节点逐个截图（每条违规最多 `max_evidence_per_violation` 张）
    async fn capture_all(
        &self,
        page: &dyn AuditPage,
        ctx: &AuditCtx,
        violations: &[Violation],
    ) -> Vec<EvidenceRecord> {
        let mut records = Vec::new();
        for (violation_index, violation) in violations.iter().enumerate() {
            if violation.nodes.len() > self.max_evidence_per_violation {
                debug!(
                    "{} 规则 {} 有 {} 个节点，只截取前 {} 个",
                    ctx,
                    violation.rule_id,
                    violation.nodes.len(),
                    self.max_evidence_per_violation
                );
            }
            for (node_index, node) in violation
                .nodes
                .iter()
                .enumerate()
                .take(self.max_evidence_per_violation)
            {
                let key = EvidenceKey {
                    run_id: ctx.run_id.clone(),
                    url_index: ctx.url_index,
                    violation_index,
                    node_index,
                };
                if let Some(record) = self.capturer.capture(page, node, violation.impact, key).await {
                    records.push(record);
                }
            }
        }
        records
    }
}
