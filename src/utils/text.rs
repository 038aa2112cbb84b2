//! 文本处理工具
//!
//! 报告中的 HTML 片段和表格单元格在这里做空白归一化、截断和转义。

use regex::Regex;
use std::sync::OnceLock;

fn whitespace_run() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("静态正则表达式"))
}

/// 将连续空白折叠为一个空格并去掉首尾空白
///
/// 只改变空白，不改变可见文字与标签结构。
pub fn collapse_whitespace(text: &str) -> String {
    whitespace_run().replace_all(text.trim(), " ").into_owned()
}

/// 截断长文本用于显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大字符数
///
/// # 返回
/// 返回 (截断后的文本, 是否发生截断)
pub fn truncate_text(text: &str, max_len: usize) -> (String, bool) {
    if text.chars().count() > max_len {
        (text.chars().take(max_len).collect::<String>() + "...", true)
    } else {
        (text.to_string(), false)
    }
}

/// HTML 文本转义
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

/// XML 属性 / 文本转义，顺带去掉 XML 1.0 不允许的控制字符
pub fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            '\n' => out.push_str("&#10;"),
            '\t' | '\r' => out.push(' '),
            c if (c as u32) < 0x20 => {}
            _ => out.push(ch),
        }
    }
    out
}
