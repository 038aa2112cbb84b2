//! CI 门禁
//!
//! 区分两类不通过：违规数超过阈值（策略失败）和审计本身出错。
//! 两者可能同时出现，退出码以审计错误优先。

use serde::Serialize;

use crate::models::{Impact, RunReport, RunStatus};

/// 违规数阈值，`None` 表示不限制
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViolationThreshold {
    pub max_critical: Option<usize>,
    pub max_serious: Option<usize>,
    pub max_total: Option<usize>,
}

/// 门禁结论
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GateVerdict {
    /// 违规数超过阈值
    pub policy_violated: bool,
    pub reasons: Vec<String>,
    /// 审计失败的 URL 数
    pub audit_errors: usize,
    pub fatal_error: Option<String>,
    pub run_status: RunStatus,
}

impl GateVerdict {
    /// 0 通过，1 策略失败，2 审计出错
    pub fn exit_code(&self) -> i32 {
        if self.has_audit_errors() {
            2
        } else if self.policy_violated {
            1
        } else {
            0
        }
    }

    pub fn has_audit_errors(&self) -> bool {
        self.audit_errors > 0 || self.fatal_error.is_some()
    }

    /// 是否应向 CI 报告"不可处理"
    pub fn is_unprocessable(&self) -> bool {
        self.exit_code() != 0
    }

    pub fn label(&self) -> &'static str {
        match self.exit_code() {
            0 => "passed",
            1 => "policy-failed",
            _ => "audit-error",
        }
    }
}

/// 按阈值评估一次运行
///
/// 计数按违规规则（而不是节点）统计，只统计成功完成的页面。
pub fn evaluate(report: &RunReport, threshold: &ViolationThreshold) -> GateVerdict {
    let mut critical = 0;
    let mut serious = 0;
    let mut total = 0;
    for outcome in report.outcomes.iter().filter(|o| !o.is_failed()) {
        let breakdown = outcome.impact_breakdown();
        critical += breakdown.get(Impact::Critical);
        serious += breakdown.get(Impact::Serious);
        total += breakdown.total();
    }

    let mut reasons = Vec::new();
    let checks = [
        ("critical", critical, threshold.max_critical),
        ("serious", serious, threshold.max_serious),
        ("total", total, threshold.max_total),
    ];
    for (name, count, limit) in checks {
        if let Some(limit) = limit {
            if count > limit {
                reasons.push(format!("{} violations {} exceed limit {}", name, count, limit));
            }
        }
    }

    GateVerdict {
        policy_violated: !reasons.is_empty(),
        reasons,
        audit_errors: report.failed_count,
        fatal_error: report.fatal_error.clone(),
        run_status: report.status,
    }
}
