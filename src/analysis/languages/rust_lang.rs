//! Rust language analyzer using tree-sitter.
//!
//! Extracts:
//! - Free functions
//! - Structs, enums and traits as classes
//! - Impl methods, attached to the impl target
//! - Implemented traits as base classes
//! - `#[get("/path")]`-style route attributes
//! - Control flow for complexity

use std::path::Path;

use tree_sitter::{Language, Node, Parser};

use crate::analysis::traits::{count_kinds, for_each_node, unquote};
use crate::analysis::{LanguageAnalyzer, ParsedFile, Route, StructuralFacts};

/// Control flow nodes counted toward complexity.
const CONTROL_FLOW_KINDS: &[&str] = &[
    "if_expression",
    "for_expression",
    "while_expression",
    "loop_expression",
    "match_expression",
];

/// Attribute names that register a route (actix-web, rocket).
const ROUTE_VERBS: &[&str] = &["get", "post", "put", "delete", "patch"];

/// Rust language analyzer.
pub struct RustAnalyzer {
    language: Language,
}

impl RustAnalyzer {
    /// Create a new Rust analyzer.
    pub fn new() -> Self {
        Self {
            language: tree_sitter_rust::LANGUAGE.into(),
        }
    }

    /// Create a new parser for this thread.
    fn create_parser(&self) -> anyhow::Result<Parser> {
        let mut parser = Parser::new();
        parser.set_language(&self.language)?;
        Ok(parser)
    }

    fn visit(&self, parsed: &ParsedFile, node: Node, facts: &mut StructuralFacts) {
        match node.kind() {
            "function_item" if !is_associated(node) => {
                if let Some(name) = parsed.field_text(node, "name") {
                    facts.functions.push(name.to_string());
                    facts.routes.extend(attribute_routes(parsed, node, name));
                }
            }
            "struct_item" | "enum_item" | "union_item" => {
                if let Some(name) = parsed.field_text(node, "name") {
                    let doc = doc_comment(parsed, node);
                    let class = facts.class_entry(name);
                    if class.docstring.is_none() {
                        class.docstring = doc;
                    }
                }
            }
            "trait_item" => {
                if let Some(name) = parsed.field_text(node, "name") {
                    let doc = doc_comment(parsed, node);
                    let methods = associated_functions(parsed, node);
                    let class = facts.class_entry(name);
                    if class.docstring.is_none() {
                        class.docstring = doc;
                    }
                    class.methods.extend(methods);
                }
            }
            "impl_item" => {
                let Some(target) = node.child_by_field_name("type") else {
                    return;
                };
                let target_name = type_name(parsed, target);
                let trait_name = node
                    .child_by_field_name("trait")
                    .map(|t| type_name(parsed, t));
                let methods = associated_functions(parsed, node);
                for method in &methods {
                    if let Some(method_node) = find_method(node, parsed, method) {
                        facts.routes.extend(attribute_routes(parsed, method_node, method));
                    }
                }

                let class = facts.class_entry(&target_name);
                class.methods.extend(methods);
                if let Some(trait_name) = trait_name {
                    if !class.base_classes.contains(&trait_name) {
                        class.base_classes.push(trait_name);
                    }
                }
            }
            _ => {}
        }
    }
}

impl Default for RustAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether a function item belongs to an impl or trait body.
fn is_associated(func: Node) -> bool {
    func.parent()
        .filter(|p| p.kind() == "declaration_list")
        .and_then(|p| p.parent())
        .is_some_and(|owner| matches!(owner.kind(), "impl_item" | "trait_item"))
}

/// Names of functions (and trait signatures) declared in an impl/trait body.
fn associated_functions(parsed: &ParsedFile, owner: Node) -> Vec<String> {
    let Some(body) = owner.child_by_field_name("body") else {
        return Vec::new();
    };
    let mut walker = body.walk();
    body.named_children(&mut walker)
        .filter(|c| matches!(c.kind(), "function_item" | "function_signature_item"))
        .filter_map(|c| parsed.field_text(c, "name"))
        .map(str::to_string)
        .collect()
}

fn find_method<'t>(owner: Node<'t>, parsed: &ParsedFile, name: &str) -> Option<Node<'t>> {
    let body = owner.child_by_field_name("body")?;
    let mut walker = body.walk();
    let found = body
        .named_children(&mut walker)
        .find(|c| c.kind() == "function_item" && parsed.field_text(*c, "name") == Some(name));
    found
}

/// Bare type name of an impl target: `Foo<T>` and `crate::Foo` both give `Foo`.
fn type_name(parsed: &ParsedFile, node: Node) -> String {
    match node.kind() {
        "generic_type" => node
            .child_by_field_name("type")
            .map(|t| type_name(parsed, t))
            .unwrap_or_else(|| parsed.node_text(node).to_string()),
        "scoped_type_identifier" => parsed
            .field_text(node, "name")
            .unwrap_or_else(|| parsed.node_text(node))
            .to_string(),
        _ => parsed.node_text(node).to_string(),
    }
}

/// `///` comments directly above an item, skipping interleaved attributes.
fn doc_comment(parsed: &ParsedFile, item: Node) -> Option<String> {
    let mut lines = Vec::new();
    let mut prev = item.prev_sibling();
    while let Some(node) = prev {
        match node.kind() {
            "attribute_item" => {}
            "line_comment" => {
                let text = parsed.node_text(node);
                match text.strip_prefix("///") {
                    Some(rest) if !rest.starts_with('/') => lines.push(rest.trim().to_string()),
                    _ => break,
                }
            }
            _ => break,
        }
        prev = node.prev_sibling();
    }

    if lines.is_empty() {
        return None;
    }
    lines.reverse();
    Some(lines.join("\n").trim().to_string())
}

/// Routes declared by attributes such as `#[get("/users")]` above a function.
fn attribute_routes(parsed: &ParsedFile, func: Node, handler: &str) -> Vec<Route> {
    let mut routes = Vec::new();
    let mut prev = func.prev_sibling();
    while let Some(node) = prev {
        match node.kind() {
            "line_comment" | "block_comment" => {}
            "attribute_item" => {
                if let Some(route) = route_from_attribute(parsed, node, handler) {
                    routes.push(route);
                }
            }
            _ => break,
        }
        prev = node.prev_sibling();
    }
    routes.reverse();
    routes
}

fn route_from_attribute(parsed: &ParsedFile, item: Node, handler: &str) -> Option<Route> {
    let attribute = item.named_child(0).filter(|a| a.kind() == "attribute")?;
    let path_node = attribute.named_child(0)?;
    let verb = parsed
        .node_text(path_node)
        .rsplit("::")
        .next()
        .unwrap_or("")
        .to_ascii_lowercase();
    if !ROUTE_VERBS.contains(&verb.as_str()) {
        return None;
    }

    let mut path = None;
    if let Some(args) = attribute.child_by_field_name("arguments") {
        for_each_node(args, |n| {
            if path.is_none() && n.kind() == "string_literal" {
                path = Some(unquote(parsed.node_text(n)));
            }
        });
    }

    Some(Route {
        handler: handler.to_string(),
        method: verb.to_ascii_uppercase(),
        path: path.unwrap_or_else(|| "/unknown".to_string()),
    })
}

impl LanguageAnalyzer for RustAnalyzer {
    fn language_tag(&self) -> &'static str {
        ".rs"
    }

    fn file_extensions(&self) -> &'static [&'static str] {
        &["rs"]
    }

    fn parse(&self, path: &Path, source: &[u8]) -> anyhow::Result<ParsedFile> {
        let mut parser = self.create_parser()?;
        let tree = parser
            .parse(source, None)
            .ok_or_else(|| anyhow::anyhow!("failed to parse Rust source: {}", path.display()))?;

        Ok(ParsedFile {
            tree,
            source: source.to_vec(),
            path: path.to_string_lossy().to_string(),
        })
    }

    fn extract_facts(&self, parsed: &ParsedFile) -> anyhow::Result<StructuralFacts> {
        let mut facts = StructuralFacts::empty(self.language_tag());
        let root = parsed.tree.root_node();

        for_each_node(root, |node| self.visit(parsed, node, &mut facts));

        let control_flow = count_kinds(root, CONTROL_FLOW_KINDS);
        facts.complexity =
            facts.functions.len() as u32 + facts.method_count() as u32 + control_flow;

        Ok(facts)
    }
}
