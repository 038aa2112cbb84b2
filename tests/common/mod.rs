//! 集成测试用的进程内浏览器与规则引擎

#![allow(dead_code)]

use a11y_batch_audit::browser::{
    AuditPage, BrowserDriver, BrowserSession, DriverFuture, LocatedElement, Rect,
};
use a11y_batch_audit::engine::{EngineResults, RawRule, RuleEngine};
use a11y_batch_audit::error::{AppError, AppResult, BrowserError};
use a11y_batch_audit::models::{Impact, ViolationNode};
use futures::future::BoxFuture;
use image::codecs::png::PngEncoder;
use image::{ColorType, ImageEncoder, Rgba, RgbaImage};
use serde_json::Value as JsonValue;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// 假浏览器的行为脚本和计数器
#[derive(Default)]
pub struct Script {
    /// 导航超时的 URL
    pub timeout_urls: HashSet<String>,
    /// 规则执行时 panic 的 URL
    pub panic_urls: HashSet<String>,
    /// 每个 URL 的引擎结果，缺省时返回一条通过规则
    pub results: HashMap<String, EngineResults>,
    /// 不可见的元素
    pub hidden_selectors: HashSet<String>,
    /// 截图失败的元素
    pub broken_screenshots: HashSet<String>,
    /// 会话无法建立
    pub session_fails: bool,
    /// 建立会话时 panic
    pub session_panics: bool,
    /// 每次导航的耗时
    pub nav_delay: Duration,

    pub sessions_opened: AtomicUsize,
    pub sessions_closed: AtomicUsize,
    pub pages_opened: AtomicUsize,
    pub pages_closed: AtomicUsize,
    pub navigations: Mutex<Vec<String>>,
}

impl Script {
    pub fn open_pages(&self) -> usize {
        self.pages_opened.load(Ordering::SeqCst) - self.pages_closed.load(Ordering::SeqCst)
    }

    pub fn navigated(&self) -> Vec<String> {
        self.navigations.lock().unwrap().clone()
    }
}

pub struct FakeDriver {
    pub script: Arc<Script>,
}

impl BrowserDriver for FakeDriver {
    fn open_session(&self) -> DriverFuture<'_, Box<dyn BrowserSession>> {
        Box::pin(async move {
            if self.script.session_panics {
                panic!("browser process crashed");
            }
            if self.script.session_fails {
                return Err(AppError::browser_launch_failed(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "chrome not found",
                )));
            }
            self.script.sessions_opened.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(FakeSession {
                script: self.script.clone(),
            }) as Box<dyn BrowserSession>)
        })
    }
}

pub struct FakeSession {
    script: Arc<Script>,
}

impl BrowserSession for FakeSession {
    fn new_page(&self) -> DriverFuture<'_, Box<dyn AuditPage>> {
        Box::pin(async move {
            self.script.pages_opened.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(FakePage {
                script: self.script.clone(),
                url: Mutex::new(None),
            }) as Box<dyn AuditPage>)
        })
    }

    fn close(self: Box<Self>) -> DriverFuture<'static, ()> {
        Box::pin(async move {
            self.script.sessions_closed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }
}

pub struct FakePage {
    script: Arc<Script>,
    url: Mutex<Option<String>>,
}

impl AuditPage for FakePage {
    fn navigate<'a>(&'a self, url: &'a str, timeout: Duration) -> DriverFuture<'a, ()> {
        Box::pin(async move {
            self.script.navigations.lock().unwrap().push(url.to_string());
            tokio::time::sleep(self.script.nav_delay).await;
            if self.script.timeout_urls.contains(url) {
                return Err(AppError::navigation_timeout(url, timeout));
            }
            *self.url.lock().unwrap() = Some(url.to_string());
            Ok(())
        })
    }

    fn evaluate<'a>(&'a self, _script: &'a str) -> DriverFuture<'a, JsonValue> {
        Box::pin(async move {
            let url = self.url.lock().unwrap().clone();
            Ok(url.map(JsonValue::String).unwrap_or(JsonValue::Null))
        })
    }

    fn locate<'a>(&'a self, selector: &'a str) -> DriverFuture<'a, Option<LocatedElement>> {
        Box::pin(async move {
            Ok(Some(LocatedElement {
                selector: selector.to_string(),
                visible: !self.script.hidden_selectors.contains(selector),
            }))
        })
    }

    fn scroll_into_view<'a>(&'a self, _element: &'a LocatedElement) -> DriverFuture<'a, ()> {
        Box::pin(async move { Ok(()) })
    }

    fn bounding_box<'a>(&'a self, element: &'a LocatedElement) -> DriverFuture<'a, Option<Rect>> {
        Box::pin(async move {
            if self.script.broken_screenshots.contains(&element.selector) {
                // 超出截图上限，screenshot 会失败
                return Ok(Some(Rect::new(40.0, 60.0, 600.0, 30.0)));
            }
            Ok(Some(Rect::new(40.0, 60.0, 120.0, 30.0)))
        })
    }

    fn screenshot(&self, region: Rect) -> DriverFuture<'_, Vec<u8>> {
        Box::pin(async move {
            if region.width > 500.0 {
                return Err(BrowserError::ScreenshotFailed {
                    source: "region too large".into(),
                }
                .into());
            }
            Ok(blank_png(region.width as u32, region.height as u32))
        })
    }

    fn close(self: Box<Self>) -> DriverFuture<'static, ()> {
        Box::pin(async move {
            self.script.pages_closed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }
}

/// 纯白 PNG
pub fn blank_png(width: u32, height: u32) -> Vec<u8> {
    let canvas = RgbaImage::from_pixel(width.max(1), height.max(1), Rgba([255, 255, 255, 255]));
    let mut out = Vec::new();
    PngEncoder::new(&mut out)
        .write_image(
            canvas.as_raw(),
            canvas.width(),
            canvas.height(),
            ColorType::Rgba8.into(),
        )
        .unwrap();
    out
}

/// 按页面当前 URL 返回预设结果的规则引擎
pub struct FakeEngine {
    pub script: Arc<Script>,
}

impl RuleEngine for FakeEngine {
    fn evaluate<'a>(
        &'a self,
        page: &'a dyn AuditPage,
        _tags: &'a BTreeSet<String>,
    ) -> BoxFuture<'a, AppResult<EngineResults>> {
        Box::pin(async move {
            let url = page.evaluate("window.location.href").await?;
            let url = url.as_str().unwrap_or_default().to_string();
            if self.script.panic_urls.contains(&url) {
                panic!("rule engine crashed on {}", url);
            }
            Ok(self
                .script
                .results
                .get(&url)
                .cloned()
                .unwrap_or_else(|| EngineResults {
                    passes: vec![rule("document-title", None, 1)],
                    ..Default::default()
                }))
        })
    }
}

/// 构造一条原始规则结果
pub fn rule(id: &str, impact: Option<Impact>, nodes: usize) -> RawRule {
    RawRule {
        id: id.to_string(),
        description: format!("{} description", id),
        help: Some(format!("Fix {}", id)),
        help_url: format!("https://rules.example/{}", id),
        impact,
        tags: vec!["wcag2a".to_string(), "cat.text-alternatives".to_string()],
        nodes: (0..nodes)
            .map(|i| ViolationNode::new(format!("#{}-{}", id, i), format!("<img id=\"{}-{}\">", id, i)))
            .collect(),
    }
}

pub fn urls(names: &[&str]) -> Vec<String> {
    names
        .iter()
        .map(|name| format!("https://{}.example/", name))
        .collect()
}
