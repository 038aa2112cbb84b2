//! axe-core 规则引擎
//!
//! 首次使用时加载 axe-core 脚本（本地文件或远程下载）并缓存，
//! 之后每个页面：注入脚本 → `axe.run` → 解析结果。

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use futures::future::BoxFuture;
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::browser::AuditPage;
use crate::config::Config;
use crate::engine::{EngineResults, RawRule, RuleEngine};
use crate::error::{AppError, AppResult, EngineError};
use crate::models::{Impact, ViolationNode};

/// axe-core 脚本来源
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AxeSource {
    /// 直接给出脚本内容
    Inline(String),
    /// 本地文件
    File(PathBuf),
    /// 远程地址
    Url(String),
}

/// axe-core 规则引擎
pub struct AxeEngine {
    source: AxeSource,
    script: OnceCell<String>,
    http: reqwest::Client,
}

impl AxeEngine {
    pub fn new(source: AxeSource) -> Self {
        Self {
            source,
            script: OnceCell::new(),
            http: reqwest::Client::new(),
        }
    }

    /// 本地脚本存在时优先使用，否则从 `axe_script_url` 下载
    pub fn from_config(config: &Config) -> Self {
        let source = match &config.axe_script_path {
            Some(path) if Path::new(path).exists() => AxeSource::File(PathBuf::from(path)),
            Some(path) => {
                warn!("⚠️ axe 脚本不存在: {}，改为下载 {}", path, config.axe_script_url);
                AxeSource::Url(config.axe_script_url.clone())
            }
            None => AxeSource::Url(config.axe_script_url.clone()),
        };
        Self::new(source)
    }

    /// 获取（并缓存）axe-core 脚本内容
    async fn script(&self) -> AppResult<&str> {
        let script = self
            .script
            .get_or_try_init(|| self.load_script())
            .await?;
        Ok(script.as_str())
    }

    async fn load_script(&self) -> AppResult<String> {
        match &self.source {
            AxeSource::Inline(source) => Ok(source.clone()),
            AxeSource::File(path) => {
                info!("📜 加载本地 axe-core: {}", path.display());
                tokio::fs::read_to_string(path).await.map_err(|e| {
                    AppError::Engine(EngineError::ScriptLoadFailed {
                        location: path.display().to_string(),
                        source: Box::new(e),
                    })
                })
            }
            AxeSource::Url(url) => {
                info!("📥 下载 axe-core: {}", url);
                let load_failed = |e: reqwest::Error| {
                    AppError::Engine(EngineError::ScriptLoadFailed {
                        location: url.clone(),
                        source: Box::new(e),
                    })
                };
                let response = self
                    .http
                    .get(url)
                    .send()
                    .await
                    .and_then(|r| r.error_for_status())
                    .map_err(load_failed)?;
                response.text().await.map_err(load_failed)
            }
        }
    }

    /// 确保页面中已注入 axe
    async fn inject(&self, page: &dyn AuditPage) -> AppResult<()> {
        if axe_present(page).await? {
            return Ok(());
        }
        let script = self.script().await?;
        debug!("注入 axe-core ({} 字节)", script.len());
        page.evaluate(script).await?;
        if !axe_present(page).await? {
            return Err(AppError::engine_failed("注入后页面中仍然没有 axe 对象"));
        }
        Ok(())
    }
}

impl RuleEngine for AxeEngine {
    fn evaluate<'a>(
        &'a self,
        page: &'a dyn AuditPage,
        tags: &'a BTreeSet<String>,
    ) -> BoxFuture<'a, AppResult<EngineResults>> {
        Box::pin(async move {
            self.inject(page).await?;
            let raw = page.evaluate(&build_run_script(tags)).await?;
            parse_results(raw)
        })
    }
}

async fn axe_present(page: &dyn AuditPage) -> AppResult<bool> {
    let value = page.evaluate("typeof window.axe !== 'undefined'").await?;
    Ok(value.as_bool().unwrap_or(false))
}

/// 构建 `axe.run` 调用脚本
fn build_run_script(tags: &BTreeSet<String>) -> String {
    let options = if tags.is_empty() {
        json!({})
    } else {
        json!({ "runOnly": { "type": "tag", "values": tags } })
    };
    format!(
        r#"
        (async () => {{
            try {{
                const results = await axe.run(document, {});
                return JSON.parse(JSON.stringify({{
                    violations: results.violations,
                    passes: results.passes,
                    incomplete: results.incomplete,
                    inapplicable: results.inapplicable
                }}));
            }} catch (error) {{
                return {{ error: String((error && error.message) || error) }};
            }}
        }})()
        "#,
        options
    )
}

#[derive(Debug, Deserialize)]
struct AxeRun {
    #[serde(default)]
    violations: Vec<AxeRule>,
    #[serde(default)]
    passes: Vec<AxeRule>,
    #[serde(default)]
    incomplete: Vec<AxeRule>,
    #[serde(default)]
    inapplicable: Vec<AxeRule>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AxeRule {
    id: String,
    #[serde(default)]
    impact: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    description: String,
    #[serde(default)]
    help: Option<String>,
    #[serde(default)]
    help_url: String,
    #[serde(default)]
    nodes: Vec<AxeNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AxeNode {
    #[serde(default)]
    html: String,
    #[serde(default)]
    target: Vec<JsonValue>,
    #[serde(default)]
    failure_summary: Option<String>,
}

impl From<AxeRule> for RawRule {
    fn from(rule: AxeRule) -> Self {
        RawRule {
            impact: rule.impact.as_deref().and_then(Impact::parse),
            nodes: rule
                .nodes
                .into_iter()
                .map(|node| ViolationNode {
                    target_selector: target_selector(&node.target),
                    nested_context: is_nested_target(&node.target),
                    markup_snippet: node.html,
                    failure_summary: node.failure_summary.filter(|s| !s.trim().is_empty()),
                })
                .collect(),
            id: rule.id,
            description: rule.description,
            help: rule.help.filter(|s| !s.trim().is_empty()),
            help_url: rule.help_url,
            tags: rule.tags,
        }
    }
}

/// axe 的 target 是选择器数组：跨 iframe 时逐层给出，
/// 穿透 shadow DOM 时某一层本身又是数组
fn target_selector(target: &[JsonValue]) -> String {
    target
        .iter()
        .filter_map(|part| match part {
            JsonValue::String(s) => Some(s.clone()),
            JsonValue::Array(inner) => Some(
                inner
                    .iter()
                    .filter_map(JsonValue::as_str)
                    .collect::<Vec<_>>()
                    .join(" >>> "),
            ),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// 多段 target（iframe 路径）或含数组的段（shadow DOM）在主文档里无法直接 querySelector
fn is_nested_target(target: &[JsonValue]) -> bool {
    target.len() > 1 || target.iter().any(JsonValue::is_array)
}

/// 解析 `axe.run` 的返回值
fn parse_results(raw: JsonValue) -> AppResult<EngineResults> {
    if let Some(message) = raw.get("error").and_then(JsonValue::as_str) {
        return Err(AppError::engine_failed(message));
    }
    let run: AxeRun = serde_json::from_value(raw)
        .map_err(|e| AppError::Engine(EngineError::MalformedResult { source: e }))?;
    Ok(EngineResults {
        violations: run.violations.into_iter().map(RawRule::from).collect(),
        passes: run.passes.into_iter().map(RawRule::from).collect(),
        incomplete: run.incomplete.into_iter().map(RawRule::from).collect(),
        inapplicable: run.inapplicable.into_iter().map(RawRule::from).collect(),
    })
}
