//! Language-specific analyzer implementations.

mod javascript;
mod python;
mod rust_lang;
mod typescript;

pub use javascript::JavaScriptAnalyzer;
pub use python::PythonAnalyzer;
pub use rust_lang::RustAnalyzer;
pub use typescript::TypeScriptAnalyzer;

use super::LanguageAnalyzer;
use once_cell::sync::OnceCell;

/// Static storage for JavaScript analyzer.
static JAVASCRIPT_ANALYZER: OnceCell<JavaScriptAnalyzer> = OnceCell::new();

/// Static storage for Python analyzer.
static PYTHON_ANALYZER: OnceCell<PythonAnalyzer> = OnceCell::new();

/// Static storage for Rust analyzer.
static RUST_ANALYZER: OnceCell<RustAnalyzer> = OnceCell::new();

/// Static storage for TypeScript analyzer.
static TYPESCRIPT_ANALYZER: OnceCell<TypeScriptAnalyzer> = OnceCell::new();

/// Get an analyzer for the given file extension (without dot, lowercase).
///
/// Returns None if no analyzer is registered for the extension.
pub fn get_analyzer(ext: &str) -> Option<&'static dyn LanguageAnalyzer> {
    // Initialized on first lookup; workers may race it.
    let analyzer: &'static dyn LanguageAnalyzer = match ext {
        "js" | "jsx" | "mjs" | "cjs" => JAVASCRIPT_ANALYZER.get_or_init(JavaScriptAnalyzer::new),
        "py" => PYTHON_ANALYZER.get_or_init(PythonAnalyzer::new),
        "rs" => RUST_ANALYZER.get_or_init(RustAnalyzer::new),
        "ts" | "mts" | "cts" | "tsx" => TYPESCRIPT_ANALYZER.get_or_init(TypeScriptAnalyzer::new),
        _ => return None,
    };
    Some(analyzer)
}

/// All file extensions with a registered analyzer.
pub fn registered_extensions() -> Vec<String> {
    let analyzers: [&'static dyn LanguageAnalyzer; 4] = [
        JAVASCRIPT_ANALYZER.get_or_init(JavaScriptAnalyzer::new),
        PYTHON_ANALYZER.get_or_init(PythonAnalyzer::new),
        RUST_ANALYZER.get_or_init(RustAnalyzer::new),
        TYPESCRIPT_ANALYZER.get_or_init(TypeScriptAnalyzer::new),
    ];
    analyzers
        .iter()
        .flat_map(|a| a.file_extensions().iter().map(|e| e.to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_by_extension() {
        assert_eq!(get_analyzer("py").unwrap().language_tag(), ".py");
        assert_eq!(get_analyzer("rs").unwrap().language_tag(), ".rs");
        assert_eq!(get_analyzer("mjs").unwrap().language_tag(), ".js");
        assert_eq!(get_analyzer("tsx").unwrap().language_tag(), ".ts");
        assert!(get_analyzer("txt").is_none());
    }

    #[test]
    fn test_registered_extensions_match_lookup() {
        for ext in registered_extensions() {
            let analyzer = get_analyzer(&ext).unwrap();
            assert!(analyzer.handles_extension(&ext));
        }
    }
}
