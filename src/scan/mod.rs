//! The incremental scan engine.
//!
//! ```text
//! discover ──▶ exclude ──▶ reconcile with cache ──▶ dispatch extractor
//!                          (added/moved/removed)    (per-file hash check)
//!                                                          │
//!               persist cache ◀── merge report ◀── fold AnalysisMap
//! ```

mod diff;
mod dispatcher;
mod orchestrator;

use std::path::PathBuf;

use serde::Serialize;

pub use diff::{reconcile, ChangeSet};
pub use dispatcher::{DispatchReport, Outcome, TaskDispatcher};
pub use orchestrator::{ScanOrchestrator, ScanOutcome};

/// Counts for one scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanStats {
    /// Files that passed exclusion and extension filters.
    pub discovered: usize,
    pub analyzed: usize,
    pub unchanged: usize,
    pub failed: usize,
    pub added: usize,
    pub moved: usize,
    pub removed: usize,
}

/// Post-scan steps of a full run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Label Python classes before saving.
    pub categorize: bool,
    /// Write the context export alongside the report.
    pub export_context: bool,
    /// Create `__init__.py` markers; the flag is whether to touch existing ones.
    pub generate_init: Option<bool>,
}

/// What a full run did, for display.
#[derive(Debug, Clone, Serialize)]
pub struct ScanSummary {
    pub root: PathBuf,
    pub stats: ScanStats,
    pub report_path: PathBuf,
    pub report_entries: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_path: Option<PathBuf>,
    pub init_files: usize,
    /// Store writes that failed; the scan itself still completed.
    pub persist_errors: Vec<String>,
}
