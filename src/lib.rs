//! # A11y Batch Audit
//!
//! 批量无障碍审计：驱动浏览器逐个审计 URL，把规则引擎的原始结果
//! 合并为带截图证据的 HTML 报告，并导出 JUnit / SARIF / 执行摘要 PDF
//!
//! ## 架构设计
//!
//! 本系统采用分层架构：
//!
//! ### ① 边界层（Browser / Engine）
//! - `browser/` - 浏览器自动化 trait 与 chromiumoxide 实现
//! - `engine/` - 规则引擎 trait 与 axe-core 实现
//! - `infrastructure/` - `JsExecutor`，唯一的 page owner，提供 eval() 能力
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，只处理单个节点或单个页面
//! - `EvidenceCapturer` - 违规元素截图与标注
//! - `ResultAggregator` - 引擎结果归一化
//! - `EvidenceStore` - 截图存储（内存 / 文件系统）
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一个 URL"的完整审计流程
//! - `AuditCtx` - 上下文封装（run_id + url_index）
//! - `PageAudit` - 流程编排（navigate → evaluate → capture → aggregate）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/run_coordinator` - 批量运行协调器，管理会话和并发
//! - `orchestrator/run_registry` - 运行注册表，持有所有运行报告
//!
//! ### ⑤ 输出层（Report / Export）
//! - `report/` - 节点分组、证据挂载、HTML 序列化、CI 门禁
//! - `export/` - JUnit、SARIF、执行摘要、PDF
//!
//! ## 模块结构

pub mod browser;
pub mod config;
pub mod engine;
pub mod error;
pub mod export;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod report;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use browser::{AuditPage, BrowserDriver, BrowserSession, ChromiumDriver};
pub use config::Config;
pub use engine::{AxeEngine, RuleEngine};
pub use error::{AppError, AppResult};
pub use infrastructure::JsExecutor;
pub use models::{Impact, RunOptions, RunReport, RunStatus, TestOutcome};
pub use orchestrator::{RunCoordinator, RunRegistry};
pub use report::{GateVerdict, ReportConsolidator, ViolationThreshold};
pub use workflow::{AuditCtx, PageAudit};
