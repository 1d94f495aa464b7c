//! End-to-end tests of the incremental scan engine.

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use projscan::analysis::language_tag;
use projscan::{
    ChangeCache, DeletionPolicy, ReportStore, RunOptions, ScanOrchestrator, ScanSummary,
    StructuralExtractor, StructuralFacts,
};
use serde_json::Value;
use tempfile::TempDir;

/// Extractor that records every call instead of parsing.
#[derive(Clone, Default)]
struct CountingExtractor {
    calls: Arc<AtomicUsize>,
    seen: Arc<Mutex<Vec<String>>>,
}

impl CountingExtractor {
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn take_seen(&self) -> Vec<String> {
        let mut seen = std::mem::take(&mut *self.seen.lock().unwrap());
        seen.sort();
        seen
    }
}

impl StructuralExtractor for CountingExtractor {
    fn analyze(&self, path: &Path, source: &str) -> anyhow::Result<StructuralFacts> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen
            .lock()
            .unwrap()
            .push(path.file_name().unwrap().to_string_lossy().to_string());

        let mut facts = StructuralFacts::empty(&language_tag(path));
        facts.functions.push(format!("len_{}", source.len()));
        Ok(facts)
    }
}

/// A project directory plus a separate directory for scanner state.
struct Fixture {
    project: TempDir,
    state: TempDir,
}

impl Fixture {
    fn new() -> Self {
        Self {
            project: TempDir::new().unwrap(),
            state: TempDir::new().unwrap(),
        }
    }

    fn write(&self, rel: &str, content: &str) {
        let path = self.project.path().join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn cache_path(&self) -> std::path::PathBuf {
        self.state.path().join("cache.json")
    }

    fn store(&self, policy: DeletionPolicy) -> ReportStore {
        let root = self.project.path().canonicalize().unwrap();
        ReportStore::for_project(&root, Some(self.state.path())).with_deletion_policy(policy)
    }

    /// One full run, as a separate invocation would do it.
    fn run<E: StructuralExtractor>(&self, extractor: E, policy: DeletionPolicy) -> ScanSummary {
        let cache = ChangeCache::load(self.cache_path());
        let orchestrator = ScanOrchestrator::with_extractor(self.project.path(), cache, extractor)
            .unwrap()
            .with_workers(4);
        orchestrator.run(&self.store(policy), RunOptions::default(), None)
    }

    fn report(&self) -> serde_json::Map<String, Value> {
        let path = self.store(DeletionPolicy::Retain).report_path().to_path_buf();
        let value: Value = serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        match value {
            Value::Object(map) => map,
            other => panic!("report is not an object: {other}"),
        }
    }

    fn cached_paths(&self) -> Vec<String> {
        ChangeCache::load(self.cache_path()).paths()
    }
}

#[test]
fn test_rescan_without_changes_is_idempotent() {
    let fx = Fixture::new();
    fx.write("a.py", "def a(): pass\n");
    fx.write("lib/b.rs", "fn b() {}\n");
    let extractor = CountingExtractor::default();

    let first = fx.run(extractor.clone(), DeletionPolicy::Retain);
    assert_eq!(first.stats.analyzed, 2);
    assert_eq!(extractor.calls(), 2);
    let report_after_first = fs::read_to_string(&first.report_path).unwrap();

    let second = fx.run(extractor.clone(), DeletionPolicy::Retain);
    assert_eq!(second.stats.analyzed, 0);
    assert_eq!(second.stats.unchanged, 2);
    assert_eq!(extractor.calls(), 2);
    assert_eq!(fs::read_to_string(&second.report_path).unwrap(), report_after_first);
}

#[test]
fn test_only_changed_files_are_reanalyzed() {
    let fx = Fixture::new();
    fx.write("a.py", "x = 1\n");
    fx.write("b.py", "y = 2\n");
    fx.write("c.py", "z = 3\n");
    let extractor = CountingExtractor::default();
    fx.run(extractor.clone(), DeletionPolicy::Retain);
    extractor.take_seen();

    fx.write("b.py", "y = 2222\n");
    let summary = fx.run(extractor.clone(), DeletionPolicy::Retain);

    assert_eq!(summary.stats.analyzed, 1);
    assert_eq!(summary.stats.unchanged, 2);
    assert_eq!(extractor.take_seen(), vec!["b.py"]);
    assert_eq!(fx.report()["b.py"]["functions"][0], "len_9");
}

#[test]
fn test_move_migrates_cache_and_report_without_reextraction() {
    let fx = Fixture::new();
    fx.write("foo.py", "def moved(): pass\n");
    fx.write("other.py", "x = 1\n");
    let extractor = CountingExtractor::default();
    fx.run(extractor.clone(), DeletionPolicy::Retain);
    let calls_before = extractor.calls();

    fs::rename(fx.project.path().join("foo.py"), fx.project.path().join("bar.py")).unwrap();
    let summary = fx.run(extractor.clone(), DeletionPolicy::Retain);

    assert_eq!(extractor.calls(), calls_before);
    assert_eq!(summary.stats.moved, 1);
    assert_eq!(summary.stats.removed, 0);

    let cached = fx.cached_paths();
    assert!(cached.contains(&"bar.py".to_string()));
    assert!(!cached.contains(&"foo.py".to_string()));

    let report = fx.report();
    assert!(report.contains_key("bar.py"));
    assert!(!report.contains_key("foo.py"));
}

#[test]
fn test_move_with_edit_is_delete_plus_new() {
    let fx = Fixture::new();
    fx.write("foo.py", "v = 1\n");
    let extractor = CountingExtractor::default();
    fx.run(extractor.clone(), DeletionPolicy::Retain);

    fs::remove_file(fx.project.path().join("foo.py")).unwrap();
    fx.write("bar.py", "v = 2\n");
    let summary = fx.run(extractor.clone(), DeletionPolicy::Retain);

    assert_eq!(summary.stats.moved, 0);
    assert_eq!(summary.stats.removed, 1);
    assert_eq!(summary.stats.analyzed, 1);
    assert_eq!(fx.cached_paths(), vec!["bar.py"]);
}

#[test]
fn test_deletion_retains_report_entry_by_default() {
    let fx = Fixture::new();
    fx.write("keep.py", "a = 1\n");
    fx.write("gone.py", "b = 2\n");
    fx.run(CountingExtractor::default(), DeletionPolicy::Retain);

    fs::remove_file(fx.project.path().join("gone.py")).unwrap();
    let summary = fx.run(CountingExtractor::default(), DeletionPolicy::Retain);

    assert_eq!(summary.stats.removed, 1);
    assert_eq!(fx.cached_paths(), vec!["keep.py"]);
    assert!(fx.report().contains_key("gone.py"));
}

#[test]
fn test_deletion_prunes_report_entry_when_configured() {
    let fx = Fixture::new();
    fx.write("keep.py", "a = 1\n");
    fx.write("gone.py", "b = 2\n");
    fx.run(CountingExtractor::default(), DeletionPolicy::Prune);

    fs::remove_file(fx.project.path().join("gone.py")).unwrap();
    let summary = fx.run(CountingExtractor::default(), DeletionPolicy::Prune);

    assert_eq!(summary.report_entries, 1);
    let report = fx.report();
    assert!(!report.contains_key("gone.py"));
    assert!(report.contains_key("keep.py"));
}

#[test]
fn test_corrupt_report_is_rebuilt_from_cold_scan() {
    let fx = Fixture::new();
    fx.write("a.py", "a = 1\n");
    fx.write("b.py", "b = 1\n");
    let first = fx.run(CountingExtractor::default(), DeletionPolicy::Retain);
    assert_eq!(first.report_entries, 2);

    fs::write(&first.report_path, "{ corrupt").unwrap();
    let extractor = CountingExtractor::default();
    let second = fx.run(extractor.clone(), DeletionPolicy::Retain);

    assert_eq!(second.stats.analyzed, 2);
    assert_eq!(extractor.take_seen(), vec!["a.py", "b.py"]);
    assert_eq!(second.report_entries, 2);
    assert!(fx.report().contains_key("a.py"));
}

#[test]
fn test_deleted_report_is_rebuilt() {
    let fx = Fixture::new();
    fx.write("a.py", "a = 1\n");
    let first = fx.run(CountingExtractor::default(), DeletionPolicy::Retain);

    fs::remove_file(&first.report_path).unwrap();
    let second = fx.run(CountingExtractor::default(), DeletionPolicy::Retain);

    assert_eq!(second.stats.analyzed, 1);
    assert_eq!(second.report_entries, 1);
}

#[test]
fn test_projects_sharing_a_cache_each_get_full_reports() {
    let state = TempDir::new().unwrap();
    let cache_path = state.path().join("cache.json");
    let first = TempDir::new().unwrap();
    let second = TempDir::new().unwrap();
    fs::write(first.path().join("util.py"), "def helper(): pass\n").unwrap();
    fs::write(second.path().join("util.py"), "def helper(): pass\n").unwrap();
    fs::create_dir_all(second.path().join("lib")).unwrap();
    fs::write(second.path().join("lib/copy.py"), "def helper(): pass\n").unwrap();

    let scan = |project: &TempDir| {
        let root = project.path().canonicalize().unwrap();
        let store = ReportStore::for_project(&root, Some(state.path()));
        let cache = ChangeCache::load(&cache_path);
        ScanOrchestrator::with_extractor(&root, cache, CountingExtractor::default())
            .unwrap()
            .run(&store, RunOptions::default(), None)
    };

    let one = scan(&first);
    assert_eq!(one.report_entries, 1);

    let two = scan(&second);
    assert_eq!(two.stats.analyzed, 2);
    assert_eq!(two.stats.moved, 0);
    assert_eq!(two.report_entries, 2);

    let again = scan(&first);
    assert_eq!(again.stats.analyzed, 0);
    assert_eq!(again.stats.removed, 0);
    assert_eq!(again.report_entries, 1);
}

#[test]
fn test_malformed_source_is_retried_until_fixed() {
    let fx = Fixture::new();
    fx.write("good.py", "def ok():\n    pass\n");
    fx.write("broken.py", "def f(:\n    pass\n");
    let store = fx.store(DeletionPolicy::Retain);

    let scan = || {
        let cache = ChangeCache::load(fx.cache_path());
        ScanOrchestrator::new(fx.project.path(), cache)
            .unwrap()
            .run(&store, RunOptions::default(), None)
    };

    let first = scan();
    assert_eq!(first.stats.failed, 1);
    assert_eq!(fx.cached_paths(), vec!["good.py"]);
    assert!(!fx.report().contains_key("broken.py"));

    let second = scan();
    assert_eq!(second.stats.failed, 1);
    assert_eq!(second.stats.unchanged, 1);

    fx.write("broken.py", "def f():\n    pass\n");
    let third = scan();
    assert_eq!(third.stats.failed, 0);
    assert_eq!(third.stats.analyzed, 1);
    assert_eq!(fx.report()["broken.py"]["functions"], serde_json::json!(["f"]));
}

#[test]
fn test_subset_scan_preserves_other_entries() {
    let fx = Fixture::new();
    fx.write("app/a.py", "a = 1\n");
    fx.write("tools/b.py", "b = 1\n");
    fx.run(CountingExtractor::default(), DeletionPolicy::Retain);

    fx.write("app/a.py", "a = 2\n");
    let cache = ChangeCache::load(fx.cache_path());
    let orchestrator =
        ScanOrchestrator::with_extractor(fx.project.path(), cache, CountingExtractor::default())
            .unwrap()
            .with_ignore_paths(["tools"]);
    orchestrator.run(&fx.store(DeletionPolicy::Retain), RunOptions::default(), None);

    let report = fx.report();
    assert_eq!(report["app/a.py"]["functions"][0], "len_6");
    assert_eq!(report["tools/b.py"]["functions"][0], "len_6");
}

#[test]
fn test_excluded_directories_are_never_analyzed() {
    let fx = Fixture::new();
    fx.write("src/main.py", "x = 1\n");
    fx.write(".git/hooks/pre-commit.py", "x = 1\n");
    fx.write("node_modules/pkg/index.js", "x = 1\n");
    fx.write("venv/lib/site.py", "x = 1\n");
    fx.write("target/debug/build.rs", "fn main() {}\n");
    fx.write("myenv/pyvenv.cfg", "home = /usr/bin\n");
    fx.write("myenv/lib/mod.py", "x = 1\n");
    fx.write("generated/schema_pb2.py", "x = 1\n");

    let extractor = CountingExtractor::default();
    let cache = ChangeCache::load(fx.cache_path());
    let orchestrator =
        ScanOrchestrator::with_extractor(fx.project.path(), cache, extractor.clone())
            .unwrap()
            .with_exclude_globs(&["**/*_pb2.py".to_string()])
            .unwrap();
    orchestrator.run(&fx.store(DeletionPolicy::Retain), RunOptions::default(), None);

    assert_eq!(extractor.take_seen(), vec!["main.py"]);
    assert_eq!(fx.report().keys().cloned().collect::<Vec<_>>(), vec!["src/main.py"]);
}

#[test]
fn test_many_files_few_workers() {
    const FILES: usize = 400;

    for round in 0..3 {
        let fx = Fixture::new();
        for i in 0..FILES {
            fx.write(&format!("d{}/f{}.py", i % 17, i), &format!("v = {}\n", i * round));
        }
        let extractor = CountingExtractor::default();
        let cache = ChangeCache::load(fx.cache_path());
        let orchestrator =
            ScanOrchestrator::with_extractor(fx.project.path(), cache, extractor.clone())
                .unwrap()
                .with_workers(3);

        let outcome = orchestrator.scan(None);
        assert_eq!(outcome.analysis.len(), FILES);
        assert_eq!(outcome.stats.analyzed, FILES);
        assert_eq!(extractor.calls(), FILES);
        assert_eq!(orchestrator.cache().len(), FILES);

        let again = orchestrator.scan(None);
        assert_eq!(again.stats.unchanged, FILES);
        assert_eq!(extractor.calls(), FILES);
    }
}

#[test]
fn test_progress_reaches_completion() {
    let fx = Fixture::new();
    for i in 0..10 {
        fx.write(&format!("m{i}.py"), "x = 1\n");
    }
    let cache = ChangeCache::load(fx.cache_path());
    let orchestrator =
        ScanOrchestrator::with_extractor(fx.project.path(), cache, CountingExtractor::default())
            .unwrap();

    let mut seen = Vec::new();
    let mut record = |p: u8| seen.push(p);
    orchestrator.scan(Some(&mut record));

    assert_eq!(seen.len(), 10);
    assert!(seen.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(seen.last(), Some(&100));
}

#[test]
fn test_python_and_rust_project_scenario() {
    let fx = Fixture::new();
    fx.write(
        "pkg/a.py",
        "def f():\n    return 1\n\nclass C:\n    def m1(self):\n        pass\n\n    def m2(self):\n        pass\n",
    );
    fx.write("pkg/b.rs", "pub fn g() -> u32 {\n    7\n}\n");

    let cache = ChangeCache::load(fx.cache_path());
    let orchestrator = ScanOrchestrator::new(fx.project.path(), cache).unwrap();
    let store = fx.store(DeletionPolicy::Retain);
    let first = orchestrator.run(&store, RunOptions::default(), None);

    assert_eq!(first.stats.analyzed, 2);
    assert_eq!(first.report_entries, 2);
    let report = fx.report();
    assert_eq!(report["pkg/a.py"]["language"], ".py");
    assert_eq!(report["pkg/a.py"]["functions"], serde_json::json!(["f"]));
    assert_eq!(
        report["pkg/a.py"]["classes"]["C"]["methods"],
        serde_json::json!(["m1", "m2"])
    );
    assert_eq!(report["pkg/b.rs"]["functions"], serde_json::json!(["g"]));
    let report_text = fs::read_to_string(store.report_path()).unwrap();

    let cache = ChangeCache::load(fx.cache_path());
    let orchestrator = ScanOrchestrator::new(fx.project.path(), cache).unwrap();
    let second = orchestrator.run(&store, RunOptions::default(), None);

    assert_eq!(second.stats.analyzed, 0);
    assert_eq!(second.stats.unchanged, 2);
    assert_eq!(fs::read_to_string(store.report_path()).unwrap(), report_text);
}

#[test]
fn test_full_run_with_categorize_context_and_init() {
    let fx = Fixture::new();
    fx.write(
        "agents/runner.py",
        "class Runner(Base):\n    \"\"\"Runs jobs.\"\"\"\n    def run(self):\n        pass\n",
    );

    let cache = ChangeCache::load(fx.cache_path());
    let orchestrator = ScanOrchestrator::new(fx.project.path(), cache).unwrap();
    let store = fx.store(DeletionPolicy::Retain);
    let options = RunOptions {
        categorize: true,
        export_context: true,
        generate_init: Some(false),
    };
    let summary = orchestrator.run(&store, options, None);

    assert!(summary.persist_errors.is_empty());
    assert_eq!(summary.init_files, 1);
    assert!(fx.project.path().join("agents/__init__.py").exists());

    let runner = &fx.report()["agents/runner.py"]["classes"]["Runner"];
    assert_eq!(runner["maturity"], "Core Asset");
    assert_eq!(runner["agent_type"], "ActionAgent");

    let context: Value =
        serde_json::from_str(&fs::read_to_string(store.context_path()).unwrap()).unwrap();
    assert_eq!(context["num_files_analyzed"], 1);
    assert!(context["analysis_details"]["agents/runner.py"].is_object());
}
