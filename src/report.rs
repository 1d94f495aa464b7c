//! Merge-on-write persistence of scan results, and summary output.
//!
//! The analysis report is the union of every file ever analyzed for a
//! project. A scan only overwrites the keys it produced; everything else on
//! disk survives. The optional context export applies the same discipline to
//! its `analysis_details` map.

use std::collections::BTreeSet;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use colored::*;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{error, info};

use crate::analysis::AnalysisMap;
use crate::error::{Result, ScanError};
use crate::persist::{read_json_object, write_json_atomic};
use crate::scan::{ChangeSet, ScanSummary};

/// What happens to report entries of files that were deleted from disk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeletionPolicy {
    /// Keep the last known facts.
    #[default]
    Retain,
    /// Drop the entry.
    Prune,
}

/// Filesystem-safe name for a project, derived from its root directory.
pub fn project_slug(root: &Path) -> String {
    let name = root
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let slug: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    if slug.trim_matches('_').is_empty() {
        "project".to_string()
    } else {
        slug
    }
}

/// Persisted report (and context export) for one project.
#[derive(Debug, Clone)]
pub struct ReportStore {
    project_root: PathBuf,
    report_path: PathBuf,
    context_path: PathBuf,
    deletion_policy: DeletionPolicy,
}

impl ReportStore {
    /// Store for `root`, writing into `output_dir` (default: the root itself).
    pub fn for_project(root: &Path, output_dir: Option<&Path>) -> Self {
        let slug = project_slug(root);
        let dir = output_dir.unwrap_or(root);
        Self {
            project_root: root.to_path_buf(),
            report_path: dir.join(format!("{slug}_analysis.json")),
            context_path: dir.join(format!("{slug}_context.json")),
            deletion_policy: DeletionPolicy::default(),
        }
    }

    pub fn with_deletion_policy(mut self, policy: DeletionPolicy) -> Self {
        self.deletion_policy = policy;
        self
    }

    pub fn report_path(&self) -> &Path {
        &self.report_path
    }

    pub fn context_path(&self) -> &Path {
        &self.context_path
    }

    pub fn deletion_policy(&self) -> DeletionPolicy {
        self.deletion_policy
    }

    /// Paths the persisted report has entries for. Empty if it is missing or
    /// unreadable.
    pub fn entry_keys(&self) -> BTreeSet<String> {
        read_json_object(&self.report_path).into_iter().map(|(k, _)| k).collect()
    }

    /// Merge `analysis` into the persisted report and write it back whole.
    ///
    /// Moved files carry their entry to the new key. Removed files follow the
    /// deletion policy. Returns the number of entries in the written report.
    pub fn save(&self, analysis: &AnalysisMap, changes: &ChangeSet) -> Result<usize> {
        let mut report = read_json_object(&self.report_path);
        self.merge(&mut report, analysis, changes)?;
        let count = report.len();

        write_json_atomic(&self.report_path, &Value::Object(report))?;
        info!(path = %self.report_path.display(), entries = count, "report saved");
        Ok(count)
    }

    /// Merge `analysis` into the context export.
    ///
    /// `analysis_details` is merged per key like the report; `project_root`
    /// and `num_files_analyzed` are refreshed. Other top-level keys survive.
    pub fn export_context(&self, analysis: &AnalysisMap, changes: &ChangeSet) -> Result<usize> {
        let mut context = read_json_object(&self.context_path);
        let mut details = match context.remove("analysis_details") {
            Some(Value::Object(details)) => details,
            _ => Map::new(),
        };
        self.merge(&mut details, analysis, changes)?;
        let count = details.len();

        context.insert(
            "project_root".to_string(),
            Value::String(self.project_root.display().to_string()),
        );
        context.insert("num_files_analyzed".to_string(), Value::from(count));
        context.insert("analysis_details".to_string(), Value::Object(details));

        write_json_atomic(&self.context_path, &Value::Object(context))?;
        info!(path = %self.context_path.display(), entries = count, "context exported");
        Ok(count)
    }

    /// Apply one scan's changes to a path-keyed map of facts.
    pub fn merge(
        &self,
        entries: &mut Map<String, Value>,
        analysis: &AnalysisMap,
        changes: &ChangeSet,
    ) -> Result<()> {
        for (old, new) in &changes.moved {
            if let Some(entry) = entries.remove(old) {
                entries.insert(new.clone(), entry);
            }
        }

        if self.deletion_policy == DeletionPolicy::Prune {
            for removed in &changes.removed {
                entries.remove(removed);
            }
        }

        for (path, facts) in analysis {
            let value =
                serde_json::to_value(facts).map_err(|e| ScanError::json(&self.report_path, e))?;
            entries.insert(path.clone(), value);
        }
        Ok(())
    }
}

/// Create an `__init__.py` beside every analyzed Python file.
///
/// With `overwrite` false an existing marker is left untouched; otherwise it
/// is touched without truncation. Returns how many markers were written.
pub fn generate_init_files(root: &Path, analysis: &AnalysisMap, overwrite: bool) -> usize {
    let mut dirs: Vec<PathBuf> = analysis
        .iter()
        .filter(|(_, facts)| facts.language == ".py")
        .map(|(rel, _)| root.join(rel))
        .filter(|path| path.file_name().is_some_and(|n| n != "__init__.py"))
        .filter_map(|path| path.parent().map(Path::to_path_buf))
        .collect();
    dirs.sort();
    dirs.dedup();

    let mut written = 0;
    for dir in dirs {
        let marker = dir.join("__init__.py");
        if marker.exists() && !overwrite {
            continue;
        }
        match OpenOptions::new().create(true).append(true).open(&marker) {
            Ok(_) => written += 1,
            Err(e) => error!(path = %marker.display(), error = %e, "could not create package marker"),
        }
    }
    written
}

// =============================================================================
// Summary output
// =============================================================================

/// Machine-readable summary on stdout.
pub fn write_json(summary: &ScanSummary) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(summary)?;
    println!("{}", json);
    Ok(())
}

/// Colored terminal summary on stdout.
pub fn write_pretty(summary: &ScanSummary) {
    let stats = &summary.stats;

    println!();
    print!("  ");
    print!("{}", "projscan".cyan().bold());
    println!(" v{}", env!("CARGO_PKG_VERSION"));
    println!();

    print!("  {}", "Scanned:  ".dimmed());
    println!("{}", summary.root.display());
    print!("  {}", "Report:   ".dimmed());
    println!("{}", summary.report_path.display());
    if let Some(context) = &summary.context_path {
        print!("  {}", "Context:  ".dimmed());
        println!("{}", context.display());
    }
    println!();

    println!(
        "  {} files  {} analyzed  {} unchanged  {}",
        stats.discovered.to_string().bold(),
        stats.analyzed.to_string().green(),
        stats.unchanged.to_string().dimmed(),
        if stats.failed > 0 {
            format!("{} failed", stats.failed).red().to_string()
        } else {
            format!("{} failed", stats.failed).dimmed().to_string()
        }
    );
    if stats.moved > 0 || stats.removed > 0 {
        println!(
            "  {} moved  {} removed",
            stats.moved.to_string().yellow(),
            stats.removed.to_string().yellow()
        );
    }
    if summary.init_files > 0 {
        println!("  {} package markers written", summary.init_files);
    }
    println!();

    if summary.persist_errors.is_empty() {
        println!("  {} {} entries in report", "✓".green(), summary.report_entries);
    } else {
        for err in &summary.persist_errors {
            println!("  {} {}", "✗".red(), err);
        }
    }
    println!();
}
