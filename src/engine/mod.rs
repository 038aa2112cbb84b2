//! 规则引擎边界
//!
//! 规则引擎读取已加载的页面，返回违规 / 通过 / 待确认 / 不适用四类结果。
//! `axe` 子模块通过注入 axe-core 实现。

pub mod axe;

use crate::browser::AuditPage;
use crate::error::AppResult;
use crate::models::{Impact, ViolationNode};
use futures::future::BoxFuture;
use std::collections::BTreeSet;

pub use axe::{AxeEngine, AxeSource};

/// 规则引擎的一条原始结果
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawRule {
    pub id: String,
    pub description: String,
    pub help: Option<String>,
    pub help_url: String,
    pub impact: Option<Impact>,
    pub tags: Vec<String>,
    pub nodes: Vec<ViolationNode>,
}

/// 规则引擎的完整结果
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EngineResults {
    pub violations: Vec<RawRule>,
    pub passes: Vec<RawRule>,
    pub incomplete: Vec<RawRule>,
    pub inapplicable: Vec<RawRule>,
}

/// 规则引擎
pub trait RuleEngine: Send + Sync {
    /// 对已加载的页面执行规则，`tags` 为空时执行全部规则
    fn evaluate<'a>(
        &'a self,
        page: &'a dyn AuditPage,
        tags: &'a BTreeSet<String>,
    ) -> BoxFuture<'a, AppResult<EngineResults>>;
}
