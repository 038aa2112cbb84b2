//! 批量运行协调器 - 编排层
//!
//! ## 职责
//!
//! 1. **接收运行请求**：校验 URL 列表，登记到 `RunRegistry`，立即返回运行 ID
//! 2. **后台执行**：每次运行一个 tokio 任务，独占一个浏览器会话
//! 3. **并发控制**：Semaphore 限制同时进行的运行数
//! 4. **顺序审计**：同一次运行内按输入顺序逐个 URL 审计
//! 5. **资源回收**：无论成功、失败还是 panic，页面和会话都会关闭
//!
//! 单个 URL 的失败只记录为失败结果；只有浏览器会话无法建立时整次运行失败。

use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::browser::{AuditPage, BrowserDriver, BrowserSession};
use crate::config::Config;
use crate::engine::RuleEngine;
use crate::error::{AppResult, RunError};
use crate::models::{RunOptions, RunReport, TestOutcome};
use crate::orchestrator::run_registry::{RunHandle, RunRegistry};
use crate::services::{CaptureSettings, EvidenceCapturer, EvidenceStore, ResultAggregator};
use crate::utils::logging;
use crate::workflow::{AuditCtx, PageAudit};

/// 等待没有任务句柄的运行时的轮询间隔
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// 批量运行协调器
pub struct RunCoordinator {
    driver: Arc<dyn BrowserDriver>,
    audit: Arc<PageAudit>,
    registry: RunRegistry,
    run_slots: Arc<Semaphore>,
    run_ttl: Option<Duration>,
    tasks: Mutex<HashMap<String, (JoinHandle<()>, RunHandle)>>,
}

impl RunCoordinator {
    /// 创建协调器
    ///
    /// # 参数
    /// - `driver`: 浏览器驱动
    /// - `audit`: 单页审计流程
    /// - `max_concurrent_runs`: 同时进行的运行数上限（最少 1）
    pub fn new(
        driver: Arc<dyn BrowserDriver>,
        audit: Arc<PageAudit>,
        max_concurrent_runs: usize,
    ) -> Self {
        Self {
            driver,
            audit,
            registry: RunRegistry::new(),
            run_slots: Arc::new(Semaphore::new(max_concurrent_runs.max(1))),
            run_ttl: None,
            tasks: Mutex::new(HashMap::new()),
        }
    }

    /// 按配置组装协调器
    pub fn from_config(
        config: &Config,
        driver: Arc<dyn BrowserDriver>,
        engine: Arc<dyn RuleEngine>,
        store: Arc<dyn EvidenceStore>,
    ) -> Self {
        let capturer = EvidenceCapturer::new(store, CaptureSettings::from_config(config));
        let audit = PageAudit::new(engine, capturer, config.max_evidence_per_violation);
        Self::new(driver, Arc::new(audit), config.max_concurrent_runs).with_run_ttl(config.run_ttl())
    }

    /// 启动新运行时顺带淘汰结束超过 `ttl` 的运行
    pub fn with_run_ttl(mut self, ttl: Duration) -> Self {
        self.run_ttl = Some(ttl);
        self
    }

    pub fn registry(&self) -> &RunRegistry {
        &self.registry
    }

    /// 启动一次批量运行
    ///
    /// 立即返回运行 ID，审计在后台任务中进行。
    pub fn start_run(&self, urls: Vec<String>, options: RunOptions) -> AppResult<String> {
        if urls.is_empty() {
            return Err(RunError::EmptyUrlList.into());
        }
        let expired = self
            .run_ttl
            .map(|ttl| self.registry.evict_expired(ttl))
            .unwrap_or_default();

        let handle = self.registry.create(urls.len());
        let run_id = handle.run_id().to_string();
        logging::log_run_start(&run_id, urls.len(), &options);

        let task = tokio::spawn(execute_run(
            self.driver.clone(),
            self.audit.clone(),
            self.run_slots.clone(),
            handle.clone(),
            urls,
            options,
            expired,
        ));

        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        tasks.retain(|_, (task, _)| !task.is_finished());
        tasks.insert(run_id.clone(), (task, handle));

        Ok(run_id)
    }

    /// 获取运行报告的一致快照
    pub fn get_run_report(&self, run_id: &str) -> AppResult<RunReport> {
        self.registry.snapshot(run_id).ok_or_else(|| {
            RunError::UnknownRun {
                run_id: run_id.to_string(),
            }
            .into()
        })
    }

    /// 请求取消运行
    pub fn cancel_run(&self, run_id: &str) -> bool {
        self.registry.cancel(run_id)
    }

    /// 移除已结束的运行并释放它的证据图片
    pub async fn evict_run(&self, run_id: &str) -> AppResult<RunReport> {
        let report = self.registry.evict(run_id)?;
        self.audit.evidence_store().evict_run(run_id).await;
        Ok(report)
    }

    /// 等待运行结束并返回最终报告
    pub async fn wait_for_run(&self, run_id: &str) -> AppResult<RunReport> {
        let task = self
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(run_id);

        if let Some((task, handle)) = task {
            if let Err(e) = task.await {
                error!("[运行 {}] ❌ 后台任务异常退出: {}", run_id, e);
                handle.fail_fatal(
                    RunError::TaskJoinFailed {
                        run_id: run_id.to_string(),
                        message: e.to_string(),
                    }
                    .to_string(),
                );
            }
        }

        loop {
            let report = self.get_run_report(run_id)?;
            if report.is_terminal() {
                return Ok(report);
            }
            tokio::time::sleep(WAIT_POLL_INTERVAL).await;
        }
    }
}

/// 后台执行一次运行
///
/// 运行在本任务内一定会进入终态：panic 记为致命错误，不依赖调用方 `wait_for_run`。
async fn execute_run(
    driver: Arc<dyn BrowserDriver>,
    audit: Arc<PageAudit>,
    run_slots: Arc<Semaphore>,
    handle: RunHandle,
    urls: Vec<String>,
    options: RunOptions,
    expired: Vec<String>,
) {
    let run_id = handle.run_id().to_string();

    // 注册表已淘汰的运行，截图随之释放
    let store = audit.evidence_store();
    for expired_id in &expired {
        store.evict_run(expired_id).await;
    }

    // 信号量只在运行结束时关闭，acquire 失败时直接不限流
    let _permit = run_slots.acquire_owned().await.ok();
    debug!("[运行 {}] 获得执行槽位", run_id);

    let executed = AssertUnwindSafe(run_session(
        driver.as_ref(),
        &audit,
        &handle,
        &urls,
        &options,
    ))
    .catch_unwind()
    .await;
    if let Err(panic) = executed {
        let message = panic_message(panic.as_ref());
        error!("[运行 {}] ❌ 运行异常中断: {}", run_id, message);
        handle.fail_fatal(format!("panic: {}", message));
    }

    handle.finish();
    logging::log_run_complete(&handle.snapshot());
}

/// 建立会话、审计全部 URL、关闭会话
///
/// 审计循环 panic 时先关闭会话，再把 panic 继续抛给 `execute_run`。
async fn run_session(
    driver: &dyn BrowserDriver,
    audit: &PageAudit,
    handle: &RunHandle,
    urls: &[String],
    options: &RunOptions,
) {
    let session = match driver.open_session().await {
        Ok(session) => session,
        Err(e) => {
            error!("[运行 {}] ❌ 无法建立浏览器会话: {}", handle.run_id(), e);
            handle.fail_fatal(e.to_string());
            return;
        }
    };

    let audited = AssertUnwindSafe(audit_urls(session.as_ref(), audit, handle, urls, options))
        .catch_unwind()
        .await;

    if let Err(e) = session.close().await {
        warn!("[运行 {}] ⚠️ 关闭浏览器会话失败: {}", handle.run_id(), e);
    }

    if let Err(panic) = audited {
        std::panic::resume_unwind(panic);
    }
}

/// 按顺序审计所有 URL
async fn audit_urls(
    session: &dyn BrowserSession,
    audit: &PageAudit,
    handle: &RunHandle,
    urls: &[String],
    options: &RunOptions,
) {
    let total = urls.len();

    for (index, url) in urls.iter().enumerate() {
        if handle.is_cancelled() {
            info!(
                "🛑 [运行 {}] 已取消，跳过剩余 {} 个 URL",
                handle.run_id(),
                total - index
            );
            handle.mark_cancelled();
            break;
        }

        let ctx = AuditCtx::new(handle.run_id().to_string(), index + 1, total, url.clone());
        logging::log_url_start(&ctx);

        let outcome = match session.new_page().await {
            Ok(page) => audit_one(page, audit, &ctx, options).await,
            Err(e) => {
                error!("{} ❌ 无法打开页面: {}", ctx, e);
                ResultAggregator::failed(url, e.to_string())
            }
        };

        let failed = outcome.is_failed();
        handle.record(outcome);
        info!(
            "{} 📈 进度: {}%",
            ctx,
            handle.snapshot().progress_percent()
        );

        if failed && !options.continue_on_failure {
            warn!(
                "⏹️ [运行 {}] URL 审计失败且未开启失败后继续，终止运行",
                handle.run_id()
            );
            break;
        }
    }
}

/// 审计单个 URL，页面在所有路径上都会关闭
async fn audit_one(
    page: Box<dyn AuditPage>,
    audit: &PageAudit,
    ctx: &AuditCtx,
    options: &RunOptions,
) -> TestOutcome {
    let result = AssertUnwindSafe(audit.run(page.as_ref(), ctx, options))
        .catch_unwind()
        .await;

    if let Err(e) = page.close().await {
        warn!("{} ⚠️ 关闭页面失败: {}", ctx, e);
    }

    match result {
        Ok(Ok(outcome)) => {
            info!("{} ✅ 审计完成", ctx);
            outcome
        }
        Ok(Err(e)) => {
            error!("{} ❌ 审计失败: {}", ctx, e);
            ResultAggregator::failed(&ctx.url, e.to_string())
        }
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            error!("{} ❌ 审计过程中发生 panic: {}", ctx, message);
            ResultAggregator::failed(&ctx.url, format!("panic: {}", message))
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "未知 panic".to_string()
    }
}
