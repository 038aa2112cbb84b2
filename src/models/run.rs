use crate::models::outcome::TestOutcome;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;

/// 单次运行的参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    /// 传给规则引擎的 WCAG 标签过滤
    pub wcag_tags: BTreeSet<String>,
    /// 单个 URL 失败后是否继续
    pub continue_on_failure: bool,
    /// 单页超时（导航与规则执行分别计时）
    pub per_page_timeout: Duration,
    /// 是否采集违规截图
    pub capture_evidence: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            wcag_tags: ["wcag2a", "wcag2aa"].iter().map(|t| t.to_string()).collect(),
            continue_on_failure: true,
            per_page_timeout: Duration::from_secs(30),
            capture_evidence: true,
        }
    }
}

/// 运行状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RunStatus {
    Running,
    Completed,
    PartiallyFailed,
    Failed,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        self != RunStatus::Running
    }
}

/// 批量运行报告
///
/// 只由所属运行的协调任务修改：`outcomes` 只追加，计数只增不减。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub run_id: String,
    pub total_urls: usize,
    pub completed_count: usize,
    pub failed_count: usize,
    pub status: RunStatus,
    pub outcomes: Vec<TestOutcome>,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    /// 浏览器会话建立失败等整体性错误
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fatal_error: Option<String>,
    #[serde(default)]
    pub cancelled: bool,
}

impl RunReport {
    pub fn new(run_id: impl Into<String>, total_urls: usize) -> Self {
        Self {
            run_id: run_id.into(),
            total_urls,
            completed_count: 0,
            failed_count: 0,
            status: RunStatus::Running,
            outcomes: Vec::new(),
            started_at: Utc::now(),
            ended_at: None,
            fatal_error: None,
            cancelled: false,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// 追加一个 URL 的结果
    pub(crate) fn record(&mut self, outcome: TestOutcome) {
        if self.is_terminal() {
            return;
        }
        self.completed_count += 1;
        if outcome.is_failed() {
            self.failed_count += 1;
        }
        self.outcomes.push(outcome);
    }

    /// 结束运行并计算最终状态
    pub(crate) fn finish(&mut self) {
        if self.is_terminal() {
            return;
        }
        self.status = self.resolve_status();
        self.ended_at = Some(Utc::now());
    }

    /// 整体性失败：直接进入 `Failed`
    pub(crate) fn fail_fatal(&mut self, message: impl Into<String>) {
        if self.is_terminal() {
            return;
        }
        self.fatal_error = Some(message.into());
        self.status = RunStatus::Failed;
        self.ended_at = Some(Utc::now());
    }

    pub(crate) fn mark_cancelled(&mut self) {
        self.cancelled = true;
    }

    /// 全部失败（或一个都没处理）为 `Failed`；
    /// 有失败或提前终止为 `PartiallyFailed`；否则 `Completed`
    pub fn resolve_status(&self) -> RunStatus {
        if self.fatal_error.is_some() || self.failed_count == self.completed_count {
            RunStatus::Failed
        } else if self.failed_count > 0 || self.completed_count < self.total_urls {
            RunStatus::PartiallyFailed
        } else {
            RunStatus::Completed
        }
    }

    /// 进度百分比（0-100）
    pub fn progress_percent(&self) -> u8 {
        if self.total_urls == 0 {
            return 100;
        }
        ((self.completed_count * 100) / self.total_urls).min(100) as u8
    }
}
