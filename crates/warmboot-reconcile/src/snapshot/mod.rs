//! Warm-boot snapshot: document layout, loading and capture.

pub mod capture;
pub mod document;
mod loader;
mod sections;

pub use capture::capture_hw_switch;
pub use document::SnapshotDocument;
pub use loader::{RecoveredAux, RecoveredModel, SnapshotLoader};
pub use sections::TeFlowTableSettings;
