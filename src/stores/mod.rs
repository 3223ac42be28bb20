// src/stores/mod.rs
pub mod reports;
pub mod session;
pub mod upload;

pub use reports::{ReportStore, filter_reports};
pub use session::{SessionPhase, SessionStore};
pub use upload::{SelectionInfo, UploadFlow, UploadState};
