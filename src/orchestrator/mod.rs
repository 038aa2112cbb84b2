//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责批量运行的调度和状态管理，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `run_coordinator` - 批量运行协调器
//! - 接收 URL 列表，立即返回运行 ID
//! - 每次运行一个后台任务、一个浏览器会话
//! - 控制同时进行的运行数（Semaphore）
//! - 每个 URL 一个新页面，用完即关
//! - 按配置决定单个 URL 失败后继续还是终止
//!
//! ### `run_registry` - 运行注册表
//! - 保存所有运行的 `RunReport`
//! - 提供快照查询、取消和淘汰
//!
//! ## 层次关系
//!
//! ```text
//! run_coordinator (处理 Vec<Url>)
//!     ↓
//! workflow::PageAudit (处理单个 URL)
//!     ↓
//! services (能力层：截图 / 归集 / 存储)
//!     ↓
//! engine + browser (规则引擎与浏览器边界)
//! ```
//!
//! ## 设计原则
//!
//! 1. **资源隔离**：只有编排层打开和关闭浏览器会话与页面
//! 2. **单写者**：`RunReport` 只由所属运行的后台任务修改
//! 3. **向下依赖**：编排层 → workflow → services → engine / browser

pub mod run_coordinator;
pub mod run_registry;

pub use run_coordinator::RunCoordinator;
pub use run_registry::{RunHandle, RunRegistry};
