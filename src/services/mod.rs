pub mod evidence_capturer;
pub mod evidence_store;
pub mod overlay;
pub mod result_aggregator;

pub use evidence_capturer::{CaptureSettings, EvidenceCapturer};
pub use evidence_store::{EvidenceKey, EvidenceStore, FsEvidenceStore, MemoryEvidenceStore};
pub use result_aggregator::ResultAggregator;
