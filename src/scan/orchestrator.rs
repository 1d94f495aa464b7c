//! Drives one scan from discovery to persisted report.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, error, info, trace, warn};
use walkdir::WalkDir;

use super::{reconcile, ChangeSet, Outcome, RunOptions, ScanStats, ScanSummary, TaskDispatcher};
use crate::analysis::{
    categorize, registered_extensions, AnalysisMap, StructuralExtractor, StructuralFacts,
    TreeSitterExtractor,
};
use crate::cache::ChangeCache;
use crate::error::{Result, ScanError};
use crate::exclude::ExclusionPolicy;
use crate::hash::ContentHasher;
use crate::report::{generate_init_files, ReportStore};

/// Result of [`ScanOrchestrator::scan`].
#[derive(Debug, Default)]
pub struct ScanOutcome {
    /// Facts for every file analyzed in this scan. Unchanged files are absent.
    pub analysis: AnalysisMap,
    pub changes: ChangeSet,
    pub stats: ScanStats,
}

/// Owns the cache and extractor for a scan of one project root.
pub struct ScanOrchestrator<E = TreeSitterExtractor> {
    root: PathBuf,
    policy: ExclusionPolicy,
    cache: ChangeCache,
    extractor: E,
    dispatcher: TaskDispatcher,
    extensions: BTreeSet<String>,
}

impl ScanOrchestrator<TreeSitterExtractor> {
    /// Orchestrator with the tree-sitter extractor.
    pub fn new<P: AsRef<Path>>(root: P, cache: ChangeCache) -> Result<Self> {
        Self::with_extractor(root, cache, TreeSitterExtractor)
    }
}

impl<E: StructuralExtractor> ScanOrchestrator<E> {
    /// Validate the root and set up a scan with a custom extractor.
    ///
    /// Fails only if the root is missing or not a directory.
    pub fn with_extractor<P: AsRef<Path>>(
        root: P,
        cache: ChangeCache,
        extractor: E,
    ) -> Result<Self> {
        let root = root.as_ref();
        if !root.exists() {
            return Err(ScanError::RootNotFound(root.to_path_buf()));
        }
        if !root.is_dir() {
            return Err(ScanError::NotADirectory(root.to_path_buf()));
        }
        let root = root.canonicalize().map_err(|e| ScanError::io(root, e))?;

        let policy = ExclusionPolicy::new(&root).with_self_path(absolute(cache.path()));
        Ok(Self {
            root,
            policy,
            cache,
            extractor,
            dispatcher: TaskDispatcher::default(),
            extensions: registered_extensions().into_iter().collect(),
        })
    }

    /// Skip these paths (relative ones resolve against the root).
    pub fn with_ignore_paths<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        self.policy = self.policy.with_ignore_paths(paths);
        self
    }

    /// Skip root-relative paths matching any of these globs.
    pub fn with_exclude_globs(mut self, patterns: &[String]) -> Result<Self> {
        self.policy = self.policy.with_globs(patterns)?;
        Ok(self)
    }

    /// Never analyze this file (used for the scanner's own outputs).
    pub fn with_self_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.policy = self.policy.with_self_path(absolute(path.as_ref()));
        self
    }

    /// Worker count; zero means one per core.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.dispatcher = TaskDispatcher::new(workers);
        self
    }

    /// Restrict discovery to these extensions (with or without the dot).
    ///
    /// An empty list keeps the default of every extension with an analyzer.
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let extensions: BTreeSet<String> = extensions
            .into_iter()
            .map(|e| e.as_ref().trim_start_matches('.').to_ascii_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        if !extensions.is_empty() {
            self.extensions = extensions;
        }
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn cache(&self) -> &ChangeCache {
        &self.cache
    }

    /// Every file under the root that survives exclusion and has a wanted
    /// extension, keyed by its `/`-separated root-relative path.
    pub fn discover(&self) -> BTreeMap<String, PathBuf> {
        let mut files = BTreeMap::new();

        let walker = WalkDir::new(&self.root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| !self.policy.skips_entry(e.path(), e.file_type().is_dir()));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "skipping unreadable entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let wanted = path
                .extension()
                .map(|e| e.to_string_lossy().to_ascii_lowercase())
                .is_some_and(|e| self.extensions.contains(&e));
            if !wanted {
                continue;
            }

            if let Some(rel) = relative_key(&self.root, path) {
                files.insert(rel, path.to_path_buf());
            }
        }

        files
    }

    /// Discover, reconcile with the cache and analyze everything that changed.
    ///
    /// The cache is updated in memory; nothing is written to disk.
    pub fn scan(&self, progress: Option<&mut dyn FnMut(u8)>) -> ScanOutcome {
        self.scan_against(None, progress)
    }

    /// Like [`scan`](Self::scan), but only cache entries whose path is in
    /// `known` count as already reported.
    pub fn scan_against(
        &self,
        known: Option<&BTreeSet<String>>,
        progress: Option<&mut dyn FnMut(u8)>,
    ) -> ScanOutcome {
        let current = self.discover();
        info!(root = %self.root.display(), files = current.len(), "discovered files");

        let changes = reconcile(&self.cache, &current, known);
        let discovered = current.len();
        let items: Vec<(String, PathBuf)> = current.into_iter().collect();

        let report = self
            .dispatcher
            .run(items, |(rel, abs)| self.process(rel, &abs), progress);

        let stats = ScanStats {
            discovered,
            analyzed: report.analyzed,
            unchanged: report.unchanged,
            failed: report.failed,
            added: changes.added.len(),
            moved: changes.moved.len(),
            removed: changes.removed.len(),
        };
        info!(
            analyzed = stats.analyzed,
            unchanged = stats.unchanged,
            failed = stats.failed,
            "scan complete"
        );

        ScanOutcome {
            analysis: report.results.into_iter().collect(),
            changes,
            stats,
        }
    }

    /// The per-file unit of work.
    fn process(&self, rel: String, abs: &Path) -> Outcome<(String, StructuralFacts)> {
        let bytes = match fs::read(abs) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(path = %rel, error = %e, "cannot read file");
                return Outcome::Failed;
            }
        };

        let digest = ContentHasher::hash_bytes(&bytes);
        if self.cache.is_current(&rel, &digest) {
            trace!(path = %rel, "unchanged");
            return Outcome::Unchanged;
        }

        let source = match String::from_utf8(bytes) {
            Ok(source) => source,
            Err(e) => {
                warn!(path = %rel, error = %e, "file is not valid UTF-8");
                return Outcome::Failed;
            }
        };

        match self.extractor.analyze(abs, &source) {
            Ok(facts) => {
                self.cache.record(rel.as_str(), digest);
                debug!(path = %rel, language = %facts.language, "analyzed");
                Outcome::Analyzed((rel, facts))
            }
            Err(e) => {
                let detail = format!("{e:#}");
                warn!(path = %rel, error = %detail, "extraction failed");
                Outcome::Failed
            }
        }
    }

    /// A full run: scan, optionally categorize, merge the report, persist the
    /// cache, then the optional context export and package markers.
    ///
    /// A file is skipped as unchanged only if the report already holds it, so
    /// a lost or corrupt report is rebuilt from a cold scan.
    ///
    /// Store failures are logged and listed in the summary. If the report
    /// cannot be saved the cache is not persisted either, so the next scan
    /// re-analyzes the same files instead of skipping them.
    pub fn run(
        &self,
        store: &ReportStore,
        options: RunOptions,
        progress: Option<&mut dyn FnMut(u8)>,
    ) -> ScanSummary {
        let known = store.entry_keys();
        let ScanOutcome {
            mut analysis,
            changes,
            stats,
        } = self.scan_against(Some(&known), progress);

        if options.categorize {
            categorize(&mut analysis);
        }

        let mut persist_errors = Vec::new();
        let report_entries = match store.save(&analysis, &changes) {
            Ok(count) => {
                if let Err(e) = self.cache.persist() {
                    error!(path = %self.cache.path().display(), error = %e, "failed to persist cache");
                    persist_errors.push(e.to_string());
                }
                count
            }
            Err(e) => {
                error!(error = %e, "failed to save report, cache left unpersisted");
                persist_errors.push(e.to_string());
                0
            }
        };

        let context_path = if options.export_context {
            match store.export_context(&analysis, &changes) {
                Ok(_) => Some(store.context_path().to_path_buf()),
                Err(e) => {
                    error!(error = %e, "failed to export context");
                    persist_errors.push(e.to_string());
                    None
                }
            }
        } else {
            None
        };

        let init_files = options
            .generate_init
            .map(|overwrite| generate_init_files(&self.root, &analysis, overwrite))
            .unwrap_or(0);

        ScanSummary {
            root: self.root.clone(),
            stats,
            report_path: store.report_path().to_path_buf(),
            report_entries,
            context_path,
            init_files,
            persist_errors,
        }
    }
}

/// `/`-joined path of `path` relative to `root`.
fn relative_key(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Vec<_> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect();
    (!parts.is_empty()).then(|| parts.join("/"))
}

fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}
