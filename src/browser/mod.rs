//! 浏览器自动化边界
//!
//! 编排层只通过这里的 trait 使用浏览器：
//! `BrowserDriver` 建立会话，`BrowserSession` 打开隔离页面，
//! `AuditPage` 暴露导航、元素定位、包围盒和截图能力。
//! `chromium` 子模块基于 chromiumoxide 实现这些 trait。

pub mod chromium;

use crate::error::AppResult;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::time::Duration;

pub use chromium::{ChromiumDriver, LaunchMode};

/// 浏览器操作返回的 future
pub type DriverFuture<'a, T> = BoxFuture<'a, AppResult<T>>;

/// 页面坐标系中的矩形（CSS 像素）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn is_empty(&self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
    }

    /// 四周扩展 `padding`，左上角不越过页面原点
    pub fn padded(&self, padding: f64) -> Rect {
        let padding = padding.max(0.0);
        let x = (self.x - padding).max(0.0);
        let y = (self.y - padding).max(0.0);
        let right = self.x + self.width + padding;
        let bottom = self.y + self.height + padding;
        Rect {
            x,
            y,
            width: (right - x).max(0.0),
            height: (bottom - y).max(0.0),
        }
    }

    /// 换算为相对 `origin` 左上角的坐标
    pub fn relative_to(&self, origin: &Rect) -> Rect {
        Rect {
            x: self.x - origin.x,
            y: self.y - origin.y,
            width: self.width,
            height: self.height,
        }
    }
}

/// 已定位的元素
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatedElement {
    pub selector: String,
    /// 元素是否对用户可见（display / visibility / 尺寸）
    pub visible: bool,
}

/// 浏览器驱动：为每次运行建立独立会话
pub trait BrowserDriver: Send + Sync {
    fn open_session(&self) -> DriverFuture<'_, Box<dyn BrowserSession>>;
}

/// 一次运行独占的浏览器会话
pub trait BrowserSession: Send + Sync {
    /// 打开一个新的隔离页面
    fn new_page(&self) -> DriverFuture<'_, Box<dyn AuditPage>>;

    /// 关闭会话并释放浏览器资源
    fn close(self: Box<Self>) -> DriverFuture<'static, ()>;
}

/// 单个 URL 审计期间独占的页面
pub trait AuditPage: Send + Sync {
    /// 导航到 `url`，超过 `timeout` 视为失败
    fn navigate<'a>(&'a self, url: &'a str, timeout: Duration) -> DriverFuture<'a, ()>;

    /// 在页面中执行脚本并返回 JSON 结果（Promise 会被等待）
    fn evaluate<'a>(&'a self, script: &'a str) -> DriverFuture<'a, JsonValue>;

    /// 按选择器定位元素，不存在时返回 `None`
    fn locate<'a>(&'a self, selector: &'a str) -> DriverFuture<'a, Option<LocatedElement>>;

    fn scroll_into_view<'a>(&'a self, element: &'a LocatedElement) -> DriverFuture<'a, ()>;

    /// 元素在页面坐标系中的包围盒
    fn bounding_box<'a>(&'a self, element: &'a LocatedElement) -> DriverFuture<'a, Option<Rect>>;

    /// 截取页面区域，返回 PNG 字节
    fn screenshot(&self, region: Rect) -> DriverFuture<'_, Vec<u8>>;

    fn close(self: Box<Self>) -> DriverFuture<'static, ()>;
}
