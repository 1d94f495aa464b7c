//! Core traits for structural extraction.

use std::path::Path;

use tree_sitter::Node;

use super::StructuralFacts;

/// Holds a parsed tree-sitter tree and the source it was parsed from.
pub struct ParsedFile {
    /// The tree-sitter parse tree.
    pub tree: tree_sitter::Tree,
    /// The original source code (kept for node text extraction).
    pub source: Vec<u8>,
    /// The file path (for error reporting).
    pub path: String,
}

impl ParsedFile {
    /// Get text for a tree-sitter node.
    pub fn node_text(&self, node: Node) -> &str {
        node.utf8_text(&self.source).unwrap_or("")
    }

    /// Text of a named field of `node`, if present.
    pub fn field_text(&self, node: Node, field: &str) -> Option<&str> {
        node.child_by_field_name(field).map(|n| self.node_text(n))
    }
}

/// Language-specific analyzer backed by a tree-sitter grammar.
///
/// # Thread Safety
///
/// tree_sitter::Parser is not Sync, so implementations create a parser per
/// call. Analyzers themselves are shared across scan workers.
pub trait LanguageAnalyzer: Send + Sync {
    /// Returns the language tag written into facts (e.g., ".py", ".rs").
    fn language_tag(&self) -> &'static str;

    /// Returns file extensions this analyzer handles (without dot).
    fn file_extensions(&self) -> &'static [&'static str];

    /// Parse a source file into a tree-sitter tree.
    ///
    /// Partial parse errors still produce a tree with ERROR nodes; callers
    /// decide whether to accept it.
    fn parse(&self, path: &Path, source: &[u8]) -> anyhow::Result<ParsedFile>;

    /// Extract structural facts from a parsed file.
    fn extract_facts(&self, parsed: &ParsedFile) -> anyhow::Result<StructuralFacts>;

    /// Check if this analyzer handles the given file extension.
    fn handles_extension(&self, ext: &str) -> bool {
        self.file_extensions().contains(&ext)
    }
}

/// The single capability the scan engine needs from an extractor.
///
/// Implementations must be shareable across worker threads. Unsupported file
/// types should yield empty facts rather than an error.
pub trait StructuralExtractor: Send + Sync {
    fn analyze(&self, path: &Path, source: &str) -> anyhow::Result<StructuralFacts>;
}

/// Visit every node under `root` in pre-order, without recursion.
pub(crate) fn for_each_node<'t>(root: Node<'t>, mut f: impl FnMut(Node<'t>)) {
    let mut cursor = root.walk();
    let mut depth = 0usize;
    loop {
        f(cursor.node());
        if cursor.goto_first_child() {
            depth += 1;
            continue;
        }
        loop {
            if depth == 0 {
                return;
            }
            if cursor.goto_next_sibling() {
                break;
            }
            cursor.goto_parent();
            depth -= 1;
        }
    }
}

/// Count nodes under `root` whose kind is in `kinds`.
pub(crate) fn count_kinds(root: Node, kinds: &[&str]) -> u32 {
    let mut count = 0;
    for_each_node(root, |n| {
        if kinds.contains(&n.kind()) {
            count += 1;
        }
    });
    count
}

/// Strip the quotes (and any string prefix) from a string literal's text.
pub(crate) fn unquote(text: &str) -> String {
    let trimmed = text.trim_start_matches(|c: char| c.is_ascii_alphabetic());
    for quote in ["\"\"\"", "'''", "\"", "'", "`"] {
        if trimmed.len() >= 2 * quote.len() && trimmed.starts_with(quote) && trimmed.ends_with(quote)
        {
            return trimmed[quote.len()..trimmed.len() - quote.len()].to_string();
        }
    }
    trimmed.to_string()
}
