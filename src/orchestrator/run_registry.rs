//! 运行注册表 - 编排层
//!
//! 持有所有 `RunReport`，负责创建、查询、取消和淘汰。
//! 协调任务通过 `RunHandle` 写入，调用方通过快照读取。

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info};

use crate::error::{AppResult, RunError};
use crate::models::{RunReport, TestOutcome};

struct RunEntry {
    report: Arc<RwLock<RunReport>>,
    cancel: Arc<AtomicBool>,
}

/// 运行注册表
#[derive(Clone, Default)]
pub struct RunRegistry {
    runs: Arc<RwLock<HashMap<String, RunEntry>>>,
    sequence: Arc<AtomicU64>,
}

impl RunRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记一次新运行
    pub fn create(&self, total_urls: usize) -> RunHandle {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        let run_id = format!("run-{}-{:04}", Utc::now().format("%Y%m%d%H%M%S"), seq);
        let report = Arc::new(RwLock::new(RunReport::new(&run_id, total_urls)));
        let cancel = Arc::new(AtomicBool::new(false));

        write(&self.runs).insert(
            run_id.clone(),
            RunEntry {
                report: report.clone(),
                cancel: cancel.clone(),
            },
        );
        debug!("登记运行: {} ({} 个 URL)", run_id, total_urls);

        RunHandle {
            run_id,
            report,
            cancel,
        }
    }

    /// 获取运行报告快照
    pub fn snapshot(&self, run_id: &str) -> Option<RunReport> {
        read(&self.runs)
            .get(run_id)
            .map(|entry| read(&entry.report).clone())
    }

    /// 所有运行的快照，按开始时间排序
    pub fn list(&self) -> Vec<RunReport> {
        let mut reports: Vec<RunReport> = read(&self.runs)
            .values()
            .map(|entry| read(&entry.report).clone())
            .collect();
        reports.sort_by(|a, b| a.started_at.cmp(&b.started_at).then(a.run_id.cmp(&b.run_id)));
        reports
    }

    /// 请求取消运行（在下一个 URL 开始前生效）
    ///
    /// # 返回
    /// 运行存在且尚未结束时返回 `true`
    pub fn cancel(&self, run_id: &str) -> bool {
        let runs = read(&self.runs);
        match runs.get(run_id) {
            Some(entry) if !read(&entry.report).is_terminal() => {
                entry.cancel.store(true, Ordering::SeqCst);
                info!("🛑 [运行 {}] 已请求取消", run_id);
                true
            }
            _ => false,
        }
    }

    /// 移除已结束的运行
    pub fn evict(&self, run_id: &str) -> AppResult<RunReport> {
        let mut runs = write(&self.runs);
        let terminal = match runs.get(run_id) {
            None => {
                return Err(RunError::UnknownRun {
                    run_id: run_id.to_string(),
                }
                .into())
            }
            Some(entry) => read(&entry.report).is_terminal(),
        };
        if !terminal {
            return Err(RunError::StillRunning {
                run_id: run_id.to_string(),
            }
            .into());
        }
        let entry = runs.remove(run_id).ok_or_else(|| RunError::UnknownRun {
            run_id: run_id.to_string(),
        })?;
        let report = read(&entry.report).clone();
        Ok(report)
    }

    /// 移除结束时间早于 `ttl` 的运行
    ///
    /// # 返回
    /// 被移除的运行 ID
    pub fn evict_expired(&self, ttl: Duration) -> Vec<String> {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);
        let now = Utc::now();
        let mut runs = write(&self.runs);
        let expired: Vec<String> = runs
            .iter()
            .filter(|(_, entry)| {
                let report = read(&entry.report);
                match report.ended_at {
                    Some(ended_at) if report.is_terminal() => now - ended_at >= ttl,
                    _ => false,
                }
            })
            .map(|(run_id, _)| run_id.clone())
            .collect();
        for run_id in &expired {
            runs.remove(run_id);
        }
        if !expired.is_empty() {
            debug!("淘汰 {} 个过期运行", expired.len());
        }
        expired
    }

    pub fn len(&self) -> usize {
        read(&self.runs).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// 协调任务持有的写入句柄
#[derive(Clone)]
pub struct RunHandle {
    run_id: String,
    report: Arc<RwLock<RunReport>>,
    cancel: Arc<AtomicBool>,
}

impl RunHandle {
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    pub fn record(&self, outcome: TestOutcome) {
        write(&self.report).record(outcome);
    }

    pub fn mark_cancelled(&self) {
        write(&self.report).mark_cancelled();
    }

    pub fn finish(&self) {
        write(&self.report).finish();
    }

    pub fn fail_fatal(&self, message: impl Into<String>) {
        write(&self.report).fail_fatal(message);
    }

    pub fn snapshot(&self) -> RunReport {
        read(&self.report).clone()
    }
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RunStatus;
    use crate::services::ResultAggregator;

    #[test]
    fn test_create_and_snapshot() {
        let registry = RunRegistry::new();
        let handle = registry.create(3);
        let other = registry.create(1);
        assert_ne!(handle.run_id(), other.run_id());

        handle.record(ResultAggregator::failed("https://a.example", "boom"));
        let snapshot = registry.snapshot(handle.run_id()).unwrap();
        assert_eq!(snapshot.completed_count, 1);
        assert_eq!(snapshot.failed_count, 1);
        assert_eq!(snapshot.status, RunStatus::Running);
        assert_eq!(registry.list().len(), 2);
        assert!(registry.snapshot("run-missing").is_none());
    }

    #[test]
    fn test_cancel_only_running() {
        let registry = RunRegistry::new();
        let handle = registry.create(2);
        assert!(registry.cancel(handle.run_id()));
        assert!(handle.is_cancelled());

        handle.finish();
        assert!(!registry.cancel(handle.run_id()));
        assert!(!registry.cancel("run-missing"));
    }

    #[test]
    fn test_evict_requires_terminal() {
        let registry = RunRegistry::new();
        let handle = registry.create(1);
        assert!(registry.evict(handle.run_id()).is_err());

        handle.fail_fatal("浏览器无法启动");
        let report = registry.evict(handle.run_id()).unwrap();
        assert_eq!(report.status, RunStatus::Failed);
        assert!(registry.is_empty());
        assert!(registry.evict(handle.run_id()).is_err());
    }

    #[test]
    fn test_evict_expired_keeps_running() {
        let registry = RunRegistry::new();
        let running = registry.create(1);
        let done = registry.create(1);
        done.fail_fatal("x");

        assert!(registry.evict_expired(Duration::from_secs(3600)).is_empty());
        assert_eq!(registry.evict_expired(Duration::ZERO), vec![done.run_id().to_string()]);
        assert!(registry.snapshot(running.run_id()).is_some());
        assert!(registry.snapshot(done.run_id()).is_none());
    }
}
