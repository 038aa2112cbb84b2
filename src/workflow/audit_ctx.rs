//! 页面审计上下文
//!
//! 封装"我正在处理哪次运行的第几个 URL"这一信息

use std::fmt::Display;

/// 页面审计上下文
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditCtx {
    /// 运行 ID
    pub run_id: String,

    /// URL 在本次运行中的序号（从1开始）
    pub url_index: usize,

    /// 本次运行的 URL 总数（仅用于日志显示）
    pub total_urls: usize,

    /// 待审计的 URL
    pub url: String,
}

impl AuditCtx {
    /// 创建新的审计上下文
    pub fn new(run_id: String, url_index: usize, total_urls: usize, url: String) -> Self {
        Self {
            run_id,
            url_index,
            total_urls,
            url,
        }
    }
}

impl Display for AuditCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[运行 {}] [页面 {}/{}]",
            self.run_id, self.url_index, self.total_urls
        )
    }
}
