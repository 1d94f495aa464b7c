//! projscan - incremental multi-language project scanner.
//!
//! Walks a source tree, extracts lightweight structural facts per file
//! (functions, classes with methods, web routes, a complexity score) and
//! merges them into a JSON report keyed by relative path. A persisted cache
//! of content hashes lets repeated scans skip unchanged files and follow
//! files that moved.
//!
//! # Architecture
//!
//! - `scan`: discovery, cache reconciliation, the worker pool and the
//!   orchestrator that ties them together
//! - `analysis`: tree-sitter extractors per language, plus categorization
//! - `cache`: the persisted path → digest map
//! - `exclude`: which directories and files are never scanned
//! - `report`: merge-on-write report and context export, summary output
//! - `config`: optional YAML configuration
//!
//! # Example
//!
//! ```no_run
//! use projscan::{ChangeCache, ReportStore, RunOptions, ScanOrchestrator};
//!
//! let cache = ChangeCache::load("dependency_cache.json");
//! let orchestrator = ScanOrchestrator::new(".", cache)?;
//! let store = ReportStore::for_project(orchestrator.root(), None);
//! let summary = orchestrator.run(&store, RunOptions::default(), None);
//! println!("{} files analyzed", summary.stats.analyzed);
//! # Ok::<(), projscan::ScanError>(())
//! ```

pub mod analysis;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod exclude;
pub mod hash;
pub mod logging;
mod persist;
pub mod report;
pub mod scan;

pub use analysis::{
    AnalysisMap, ClassInfo, LanguageAnalyzer, NullExtractor, Route, StructuralExtractor,
    StructuralFacts, TreeSitterExtractor,
};
pub use cache::ChangeCache;
pub use config::ScanConfig;
pub use error::{Result, ScanError};
pub use exclude::ExclusionPolicy;
pub use hash::ContentHasher;
pub use report::{DeletionPolicy, ReportStore};
pub use scan::{
    ChangeSet, RunOptions, ScanOrchestrator, ScanOutcome, ScanStats, ScanSummary, TaskDispatcher,
};
