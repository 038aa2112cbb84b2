//! 报告层
//!
//! - `document`: 结构化文档模型
//! - `consolidator`: 节点分组、截断、证据挂载
//! - `html`: 文档模型到 HTML 的序列化
//! - `gate`: CI 门禁

pub mod consolidator;
pub mod document;
pub mod gate;
pub mod html;

pub use consolidator::{group_violation, remediation_key, ReportConsolidator, ViolationGroup};
pub use document::{ConsolidatedReport, DocumentError, GalleryItem, GroupRow, RenderedNode, ViolationSection};
pub use gate::{GateVerdict, ViolationThreshold};
pub use html::{load_gallery_images, render_outcome_html, render_run_index, GalleryImages};
