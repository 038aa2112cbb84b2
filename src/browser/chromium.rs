//! 基于 chromiumoxide 的浏览器驱动
//!
//! 两种模式：
//! - `Launch`：为每次运行启动独立的无头浏览器，运行结束时关闭
//! - `Connect`：连接已打开调试端口的浏览器，运行结束时只关闭自己打开的页面

use std::path::PathBuf;
use std::time::Duration;

use chromiumoxide::cdp::browser_protocol::page::{
    CaptureScreenshotFormat, PrintToPdfParams, Viewport,
};
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::{Browser, BrowserConfig};
use futures::future::BoxFuture;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::browser::{
    AuditPage, BrowserDriver, BrowserSession, DriverFuture, LocatedElement, Rect,
};
use crate::config::Config;
use crate::error::{AppError, AppResult, BrowserError, ExportError, ExportResult};
use crate::export::pdf::{PdfLayout, PdfRenderer};
use crate::infrastructure::JsExecutor;

/// 浏览器获取方式
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchMode {
    /// 启动新的浏览器进程
    Launch {
        executable: Option<PathBuf>,
        headless: bool,
    },
    /// 连接到已有浏览器的调试端口
    Connect { port: u16 },
}

/// chromiumoxide 浏览器驱动
#[derive(Debug, Clone)]
pub struct ChromiumDriver {
    mode: LaunchMode,
}

impl ChromiumDriver {
    pub fn new(mode: LaunchMode) -> Self {
        Self { mode }
    }

    /// 端口非 0 时连接已有浏览器，否则自行启动
    pub fn from_config(config: &Config) -> Self {
        let mode = if config.browser_debug_port != 0 {
            LaunchMode::Connect {
                port: config.browser_debug_port,
            }
        } else {
            LaunchMode::Launch {
                executable: config.chrome_executable.as_ref().map(PathBuf::from),
                headless: config.headless,
            }
        };
        Self::new(mode)
    }

    async fn open_chromium_session(&self) -> AppResult<ChromiumSession> {
        match &self.mode {
            LaunchMode::Launch {
                executable,
                headless,
            } => {
                let (browser, handler) =
                    launch_browser(executable.as_deref(), *headless).await?;
                Ok(ChromiumSession {
                    browser,
                    handler,
                    owned: true,
                })
            }
            LaunchMode::Connect { port } => {
                let (browser, handler) = connect_to_browser(*port).await?;
                Ok(ChromiumSession {
                    browser,
                    handler,
                    owned: false,
                })
            }
        }
    }
}

impl BrowserDriver for ChromiumDriver {
    fn open_session(&self) -> DriverFuture<'_, Box<dyn BrowserSession>> {
        Box::pin(async move {
            let session = self.open_chromium_session().await?;
            Ok(Box::new(session) as Box<dyn BrowserSession>)
        })
    }
}

/// 启动浏览器
async fn launch_browser(
    executable: Option<&std::path::Path>,
    headless: bool,
) -> AppResult<(Browser, JoinHandle<()>)> {
    info!("🚀 启动浏览器 (无头模式: {})...", headless);

    let mut builder = BrowserConfig::builder();
    builder = if headless {
        builder.new_headless_mode()
    } else {
        builder.with_head()
    };
    if let Some(path) = executable {
        debug!("浏览器路径: {}", path.display());
        builder = builder.chrome_executable(path);
    }

    let config = builder
        .args(vec![
            "--disable-gpu",           // 无头模式下禁用 GPU
            "--no-sandbox",            // 容器环境中沙盒常常不可用
            "--disable-dev-shm-usage", // 防止共享内存不足
            "--hide-scrollbars",       // 截图中不出现滚动条
        ])
        .build()
        .map_err(|e| {
            error!("配置浏览器失败: {}", e);
            AppError::Browser(BrowserError::LaunchFailed { source: e.into() })
        })?;

    let (browser, mut handler) = Browser::launch(config).await.map_err(|e| {
        error!("启动浏览器失败: {}", e);
        AppError::browser_launch_failed(e)
    })?;
    debug!("浏览器启动成功");

    // 在后台处理浏览器事件
    let handle = tokio::spawn(async move {
        while let Some(h) = handler.next().await {
            if h.is_err() {
                break;
            }
        }
    });

    // 等待浏览器状态同步
    sleep(Duration::from_millis(300)).await;

    Ok((browser, handle))
}

/// 连接到已有浏览器
async fn connect_to_browser(port: u16) -> AppResult<(Browser, JoinHandle<()>)> {
    let browser_url = format!("http://localhost:{}", port);
    info!("正在连接到浏览器: {}", browser_url);

    let (browser, mut handler) = Browser::connect(&browser_url).await.map_err(|e| {
        error!("连接浏览器失败: {}", e);
        AppError::browser_connection_failed(port, e)
    })?;
    debug!("浏览器连接成功");

    let handle = tokio::spawn(async move {
        while let Some(h) = handler.next().await {
            if h.is_err() {
                break;
            }
        }
    });

    sleep(Duration::from_millis(300)).await;

    Ok((browser, handle))
}

/// 一次运行独占的 chromiumoxide 会话
pub struct ChromiumSession {
    browser: Browser,
    handler: JoinHandle<()>,
    /// 浏览器是否由本会话启动
    owned: bool,
}

impl ChromiumSession {
    async fn open_page(&self) -> AppResult<chromiumoxide::Page> {
        self.browser.new_page("about:blank").await.map_err(|e| {
            error!("创建页面失败: {}", e);
            AppError::page_creation_failed(e)
        })
    }

    async fn shutdown(mut self) -> AppResult<()> {
        if self.owned {
            debug!("正在关闭浏览器...");
            if let Err(e) = self.browser.close().await {
                warn!("⚠️ 关闭浏览器失败: {}", e);
            }
            if let Err(e) = self.browser.wait().await {
                warn!("⚠️ 等待浏览器进程退出失败: {}", e);
            }
        }
        self.handler.abort();
        Ok(())
    }
}

impl BrowserSession for ChromiumSession {
    fn new_page(&self) -> DriverFuture<'_, Box<dyn AuditPage>> {
        Box::pin(async move {
            let page = self.open_page().await?;
            Ok(Box::new(ChromiumPage {
                executor: JsExecutor::new(page),
            }) as Box<dyn AuditPage>)
        })
    }

    fn close(self: Box<Self>) -> DriverFuture<'static, ()> {
        Box::pin(async move { (*self).shutdown().await })
    }
}

const LOCATE_FN: &str = r#"(sel) => {
    const el = document.querySelector(sel);
    if (!el) return null;
    const style = window.getComputedStyle(el);
    const rect = el.getBoundingClientRect();
    return {
        visible: style.display !== 'none'
            && style.visibility !== 'hidden'
            && parseFloat(style.opacity || '1') > 0
            && rect.width > 0
            && rect.height > 0
    };
}"#;

const BOUNDING_BOX_FN: &str = r#"(sel) => {
    const el = document.querySelector(sel);
    if (!el) return null;
    const r = el.getBoundingClientRect();
    return { x: r.left + window.scrollX, y: r.top + window.scrollY, width: r.width, height: r.height };
}"#;

#[derive(Debug, Deserialize)]
struct LocateReply {
    visible: bool,
}

/// 单个 URL 审计使用的页面
pub struct ChromiumPage {
    executor: JsExecutor,
}

impl AuditPage for ChromiumPage {
    fn navigate<'a>(&'a self, url: &'a str, timeout: Duration) -> DriverFuture<'a, ()> {
        Box::pin(async move {
            debug!("导航到: {} (超时 {:?})", url, timeout);
            match tokio::time::timeout(timeout, self.executor.page().goto(url)).await {
                Ok(Ok(_)) => Ok(()),
                Ok(Err(e)) => Err(AppError::navigation_failed(url, e)),
                Err(_) => Err(AppError::navigation_timeout(url, timeout)),
            }
        })
    }

    fn evaluate<'a>(&'a self, script: &'a str) -> DriverFuture<'a, JsonValue> {
        Box::pin(self.executor.eval(script))
    }

    fn locate<'a>(&'a self, selector: &'a str) -> DriverFuture<'a, Option<LocatedElement>> {
        Box::pin(async move {
            let reply: Option<LocateReply> = self.executor.call_as(LOCATE_FN, &selector).await?;
            Ok(reply.map(|p| LocatedElement {
                selector: selector.to_string(),
                visible: p.visible,
            }))
        })
    }

    fn scroll_into_view<'a>(&'a self, element: &'a LocatedElement) -> DriverFuture<'a, ()> {
        Box::pin(async move {
            let handle = self
                .executor
                .page()
                .find_element(element.selector.as_str())
                .await
                .map_err(|e| AppError::element_query_failed(&element.selector, e))?;
            handle
                .scroll_into_view()
                .await
                .map_err(|e| AppError::element_query_failed(&element.selector, e))?;
            Ok(())
        })
    }

    fn bounding_box<'a>(&'a self, element: &'a LocatedElement) -> DriverFuture<'a, Option<Rect>> {
        Box::pin(async move {
            self.executor
                .call_as(BOUNDING_BOX_FN, &element.selector)
                .await
        })
    }

    fn screenshot(&self, region: Rect) -> DriverFuture<'_, Vec<u8>> {
        Box::pin(async move {
            let params = ScreenshotParams::builder()
                .format(CaptureScreenshotFormat::Png)
                .clip(Viewport {
                    x: region.x,
                    y: region.y,
                    width: region.width,
                    height: region.height,
                    scale: 1.0,
                })
                .capture_beyond_viewport(true)
                .build();
            self.executor.page().screenshot(params).await.map_err(|e| {
                AppError::Browser(BrowserError::ScreenshotFailed {
                    source: Box::new(e),
                })
            })
        })
    }

    fn close(self: Box<Self>) -> DriverFuture<'static, ()> {
        Box::pin(async move {
            let page = (*self).executor.into_page();
            page.close().await?;
            Ok(())
        })
    }
}

// ========== PDF 渲染 ==========

impl PdfRenderer for ChromiumDriver {
    fn render<'a>(
        &'a self,
        html: &'a str,
        layout: &'a PdfLayout,
    ) -> BoxFuture<'a, ExportResult<Vec<u8>>> {
        Box::pin(async move {
            let session = self.open_chromium_session().await.map_err(pdf_error)?;
            let result = print_to_pdf(&session, html, layout).await;
            if let Err(e) = session.shutdown().await {
                warn!("⚠️ 关闭 PDF 渲染会话失败: {}", e);
            }
            result
        })
    }
}

async fn print_to_pdf(
    session: &ChromiumSession,
    html: &str,
    layout: &PdfLayout,
) -> ExportResult<Vec<u8>> {
    let page = session.open_page().await.map_err(pdf_error)?;
    let rendered = async {
        page.set_content(html).await?;
        let params = PrintToPdfParams {
            landscape: Some(layout.landscape),
            print_background: Some(layout.print_background),
            paper_width: Some(layout.paper_width_in),
            paper_height: Some(layout.paper_height_in),
            margin_top: Some(layout.margin_in),
            margin_bottom: Some(layout.margin_in),
            margin_left: Some(layout.margin_in),
            margin_right: Some(layout.margin_in),
            ..Default::default()
        };
        page.pdf(params).await
    }
    .await
    .map_err(pdf_error);

    if let Err(e) = page.close().await {
        warn!("⚠️ 关闭 PDF 页面失败: {}", e);
    }
    rendered
}

fn pdf_error(err: impl std::error::Error + Send + Sync + 'static) -> ExportError {
    ExportError::PdfRenderFailed {
        source: Box::new(err),
    }
}
