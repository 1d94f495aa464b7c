//! JavaScript language analyzer using tree-sitter.
//!
//! The walk in [`extract_script_facts`] is shared with the TypeScript
//! analyzer; the two grammars agree on every node kind it looks at.

use std::path::Path;

use tree_sitter::{Language, Node, Parser};

use crate::analysis::traits::{count_kinds, for_each_node, unquote};
use crate::analysis::{ClassInfo, LanguageAnalyzer, ParsedFile, Route, StructuralFacts};

/// Branching nodes counted toward complexity.
const BRANCH_KINDS: &[&str] = &[
    "if_statement",
    "for_statement",
    "for_in_statement",
    "while_statement",
    "do_statement",
    "switch_case",
    "ternary_expression",
    "catch_clause",
];

/// Router methods recognized in `app.get('/path', handler)` calls.
const ROUTE_VERBS: &[&str] = &["get", "post", "put", "delete", "patch"];

/// JavaScript language analyzer.
pub struct JavaScriptAnalyzer {
    language: Language,
}

impl JavaScriptAnalyzer {
    pub fn new() -> Self {
        Self {
            language: tree_sitter_javascript::LANGUAGE.into(),
        }
    }

    fn create_parser(&self) -> anyhow::Result<Parser> {
        let mut parser = Parser::new();
        parser.set_language(&self.language)?;
        Ok(parser)
    }
}

impl Default for JavaScriptAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguageAnalyzer for JavaScriptAnalyzer {
    fn language_tag(&self) -> &'static str {
        ".js"
    }

    fn file_extensions(&self) -> &'static [&'static str] {
        &["js", "jsx", "mjs", "cjs"]
    }

    fn parse(&self, path: &Path, source: &[u8]) -> anyhow::Result<ParsedFile> {
        let mut parser = self.create_parser()?;
        let tree = parser.parse(source, None).ok_or_else(|| {
            anyhow::anyhow!("failed to parse JavaScript source: {}", path.display())
        })?;

        Ok(ParsedFile {
            tree,
            source: source.to_vec(),
            path: path.to_string_lossy().to_string(),
        })
    }

    fn extract_facts(&self, parsed: &ParsedFile) -> anyhow::Result<StructuralFacts> {
        Ok(extract_script_facts(parsed, self.language_tag()))
    }
}

/// Structural facts for a JavaScript-family parse tree.
pub(crate) fn extract_script_facts(parsed: &ParsedFile, language_tag: &str) -> StructuralFacts {
    let mut facts = StructuralFacts::empty(language_tag);
    let root = parsed.tree.root_node();

    for_each_node(root, |node| match node.kind() {
        "function_declaration" | "generator_function_declaration" => {
            if let Some(name) = parsed.field_text(node, "name") {
                facts.functions.push(name.to_string());
            }
        }
        "variable_declarator" => {
            let is_function = node.child_by_field_name("value").is_some_and(|v| {
                matches!(
                    v.kind(),
                    "arrow_function" | "function_expression" | "generator_function"
                )
            });
            if is_function {
                if let Some(name) = parsed.field_text(node, "name") {
                    facts.functions.push(name.to_string());
                }
            }
        }
        "class_declaration" | "abstract_class_declaration" => {
            if let Some(name) = parsed.field_text(node, "name") {
                let info = class_info(parsed, node);
                let class = facts.class_entry(name);
                class.methods.extend(info.methods);
                class.base_classes.extend(info.base_classes);
                if class.docstring.is_none() {
                    class.docstring = info.docstring;
                }
            }
        }
        "call_expression" => {
            if let Some(route) = route_call(parsed, node) {
                facts.routes.push(route);
            }
        }
        _ => {}
    });

    let branches = count_kinds(root, BRANCH_KINDS);
    facts.complexity = facts.functions.len() as u32 + facts.method_count() as u32 + branches;

    facts
}

fn class_info(parsed: &ParsedFile, class: Node) -> ClassInfo {
    let mut info = ClassInfo {
        docstring: jsdoc(parsed, class),
        ..Default::default()
    };

    if let Some(body) = class.child_by_field_name("body") {
        let mut walker = body.walk();
        for member in body.named_children(&mut walker) {
            if matches!(
                member.kind(),
                "method_definition" | "abstract_method_signature" | "method_signature"
            ) {
                if let Some(name) = parsed.field_text(member, "name") {
                    info.methods.push(name.to_string());
                }
            }
        }
    }

    let mut walker = class.walk();
    let heritage = class
        .named_children(&mut walker)
        .find(|c| c.kind() == "class_heritage");
    if let Some(heritage) = heritage {
        let mut walker = heritage.walk();
        for clause in heritage.named_children(&mut walker) {
            match clause.kind() {
                // TypeScript wraps bases in extends/implements clauses
                "extends_clause" | "implements_clause" => {
                    let mut inner = clause.walk();
                    for base in clause.named_children(&mut inner) {
                        if base.kind() != "type_arguments" {
                            info.base_classes.push(base_name(parsed, base));
                        }
                    }
                }
                _ => info.base_classes.push(base_name(parsed, clause)),
            }
        }
    }

    info
}

/// `Base<T>` is recorded as `Base`.
fn base_name(parsed: &ParsedFile, node: Node) -> String {
    if node.kind() == "generic_type" {
        if let Some(name) = node.child_by_field_name("name") {
            return parsed.node_text(name).to_string();
        }
    }
    parsed.node_text(node).to_string()
}

/// The `/** ... */` block directly above a class, looking through `export`.
fn jsdoc(parsed: &ParsedFile, class: Node) -> Option<String> {
    let anchor = match class.parent() {
        Some(p) if p.kind() == "export_statement" => p,
        _ => class,
    };
    let comment = anchor.prev_named_sibling().filter(|c| c.kind() == "comment")?;
    let text = parsed.node_text(comment);
    let body = text.strip_prefix("/**")?.strip_suffix("*/")?;

    let cleaned: Vec<&str> = body
        .lines()
        .map(|l| l.trim().trim_start_matches('*').trim())
        .collect();
    let doc = cleaned.join("\n").trim().to_string();
    (!doc.is_empty()).then_some(doc)
}

/// `router.get('/path', handler)`: the receiver names the route owner.
fn route_call(parsed: &ParsedFile, call: Node) -> Option<Route> {
    let function = call
        .child_by_field_name("function")
        .filter(|f| f.kind() == "member_expression")?;
    let object = function
        .child_by_field_name("object")
        .filter(|o| o.kind() == "identifier")?;
    let verb = parsed.field_text(function, "property")?;
    if !ROUTE_VERBS.contains(&verb) {
        return None;
    }

    let args = call.child_by_field_name("arguments")?;
    if args.named_child_count() < 2 {
        return None;
    }
    let path = args
        .named_child(0)
        .filter(|a| matches!(a.kind(), "string" | "template_string"))
        .map(|a| unquote(parsed.node_text(a)))
        .unwrap_or_else(|| "/unknown".to_string());

    Some(Route {
        handler: parsed.node_text(object).to_string(),
        method: verb.to_ascii_uppercase(),
        path,
    })
}
