//! Extension-dispatched structural extraction.

use std::path::Path;

use anyhow::bail;
use tracing::trace;

use super::languages::get_analyzer;
use super::traits::StructuralExtractor;
use super::StructuralFacts;

/// Dotted, lowercased suffix of a path, or "" when it has none.
pub fn language_tag(path: &Path) -> String {
    path.extension()
        .map(|e| format!(".{}", e.to_string_lossy().to_ascii_lowercase()))
        .unwrap_or_default()
}

/// Extractor that knows nothing; every file yields empty facts.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullExtractor;

impl StructuralExtractor for NullExtractor {
    fn analyze(&self, path: &Path, _source: &str) -> anyhow::Result<StructuralFacts> {
        Ok(StructuralFacts::empty(&language_tag(path)))
    }
}

/// The default extractor: looks up a tree-sitter analyzer by file extension
/// and falls back to [`NullExtractor`] for anything unregistered.
///
/// A file the grammar cannot parse cleanly is an error, so the scan leaves it
/// uncached and retries it next time.
#[derive(Debug, Default, Clone, Copy)]
pub struct TreeSitterExtractor;

impl StructuralExtractor for TreeSitterExtractor {
    fn analyze(&self, path: &Path, source: &str) -> anyhow::Result<StructuralFacts> {
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();

        let Some(analyzer) = get_analyzer(&ext) else {
            trace!(path = %path.display(), "no analyzer for extension");
            return NullExtractor.analyze(path, source);
        };

        let parsed = analyzer.parse(path, source.as_bytes())?;
        if parsed.tree.root_node().has_error() {
            bail!("{}: source has syntax errors", parsed.path);
        }
        analyzer.extract_facts(&parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_extension_is_empty() {
        let facts = TreeSitterExtractor
            .analyze(Path::new("notes.TXT"), "hello")
            .unwrap();
        assert_eq!(facts, StructuralFacts::empty(".txt"));
    }

    #[test]
    fn test_no_extension() {
        let facts = TreeSitterExtractor
            .analyze(Path::new("Makefile"), "all:\n")
            .unwrap();
        assert_eq!(facts.language, "");
        assert!(facts.functions.is_empty());
    }

    #[test]
    fn test_dispatch_by_extension() {
        let py = TreeSitterExtractor
            .analyze(Path::new("pkg/a.py"), "def f():\n    pass\n")
            .unwrap();
        assert_eq!(py.language, ".py");
        assert_eq!(py.functions, vec!["f"]);

        let rs = TreeSitterExtractor
            .analyze(Path::new("pkg/b.rs"), "fn g() {}\n")
            .unwrap();
        assert_eq!(rs.language, ".rs");
        assert_eq!(rs.functions, vec!["g"]);
    }

    #[test]
    fn test_syntax_error_is_a_failure() {
        let err = TreeSitterExtractor
            .analyze(Path::new("broken.py"), "def f(:\n    pass\n")
            .unwrap_err();
        assert!(err.to_string().contains("syntax errors"));

        let err = TreeSitterExtractor
            .analyze(Path::new("broken.rs"), "fn g( {\n")
            .unwrap_err();
        assert!(err.to_string().contains("broken.rs"));
    }
}
