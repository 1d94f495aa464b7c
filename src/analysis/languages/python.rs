//! Python language analyzer using tree-sitter.

use std::path::Path;

use streaming_iterator::StreamingIterator;
use tree_sitter::{Language, Node, Parser, Query, QueryCursor};

use crate::analysis::traits::{count_kinds, unquote};
use crate::analysis::{ClassInfo, LanguageAnalyzer, ParsedFile, Route, StructuralFacts};

/// Tree-sitter query for function and class definitions.
const DEFINITION_QUERY: &str = r#"
(function_definition
  name: (identifier) @func_name
) @function

(class_definition
  name: (identifier) @class_name
) @class
"#;

/// Loop and branch nodes counted toward complexity.
const LOOP_KINDS: &[&str] = &["for_statement", "while_statement"];
const BRANCH_KINDS: &[&str] = &["if_statement", "elif_clause", "try_statement"];

/// Decorator attribute names that register a route.
const ROUTE_VERBS: &[&str] = &["route", "get", "post", "put", "delete", "patch"];

/// Functions longer than this many lines get a lint hint.
const LONG_FUNCTION_LINES: usize = 50;
/// Files above this complexity get a lint hint.
const HIGH_COMPLEXITY: u32 = 10;

pub struct PythonAnalyzer {
    language: Language,
}

impl PythonAnalyzer {
    pub fn new() -> Self {
        Self {
            language: tree_sitter_python::LANGUAGE.into(),
        }
    }

    fn create_parser(&self) -> anyhow::Result<Parser> {
        let mut parser = Parser::new();
        parser.set_language(&self.language)?;
        Ok(parser)
    }

    fn extract_definitions(
        &self,
        parsed: &ParsedFile,
        facts: &mut StructuralFacts,
    ) -> anyhow::Result<()> {
        let query = Query::new(&self.language, DEFINITION_QUERY)?;
        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(&query, parsed.tree.root_node(), &parsed.source[..]);

        while let Some(m) = matches.next() {
            let mut func_name = None;
            let mut class_name = None;
            let mut def_node = None;

            for capture in m.captures {
                let capture_name = query.capture_names()[capture.index as usize];
                match capture_name {
                    "func_name" => func_name = Some(parsed.node_text(capture.node)),
                    "class_name" => class_name = Some(parsed.node_text(capture.node)),
                    "function" | "class" => def_node = Some(capture.node),
                    _ => {}
                }
            }

            let Some(node) = def_node else { continue };

            if let Some(name) = func_name {
                let lines = node.end_position().row - node.start_position().row;
                if lines > LONG_FUNCTION_LINES {
                    facts.lint.push(format!("Function {} >{} lines", name, LONG_FUNCTION_LINES));
                }
                if !is_method(node) {
                    facts.functions.push(name.to_string());
                }
                facts.routes.extend(decorator_routes(parsed, node, name));
            } else if let Some(name) = class_name {
                let class = self.extract_class(parsed, node);
                facts.classes.insert(name.to_string(), class);
            }
        }

        Ok(())
    }

    fn extract_class(&self, parsed: &ParsedFile, class_node: Node) -> ClassInfo {
        let mut info = ClassInfo::default();

        if let Some(superclasses) = class_node.child_by_field_name("superclasses") {
            let mut walker = superclasses.walk();
            for base in superclasses.named_children(&mut walker) {
                if matches!(base.kind(), "identifier" | "attribute") {
                    info.base_classes.push(parsed.node_text(base).to_string());
                }
            }
        }

        let Some(body) = class_node.child_by_field_name("body") else {
            return info;
        };

        info.docstring = docstring(parsed, body);

        let mut walker = body.walk();
        for child in body.named_children(&mut walker) {
            let def = match child.kind() {
                "function_definition" => Some(child),
                "decorated_definition" => child
                    .child_by_field_name("definition")
                    .filter(|d| d.kind() == "function_definition"),
                _ => None,
            };
            if let Some(name) = def.and_then(|d| parsed.field_text(d, "name")) {
                info.methods.push(name.to_string());
            }
        }

        info
    }
}

impl Default for PythonAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether a function definition sits directly in a class body.
fn is_method(def: Node) -> bool {
    let mut parent = def.parent();
    if parent.is_some_and(|p| p.kind() == "decorated_definition") {
        parent = parent.and_then(|p| p.parent());
    }
    match parent {
        Some(block) if block.kind() == "block" => block
            .parent()
            .is_some_and(|owner| owner.kind() == "class_definition"),
        _ => false,
    }
}

/// Docstring of a block: its first statement, when that is a bare string.
fn docstring(parsed: &ParsedFile, body: Node) -> Option<String> {
    let first = body.named_child(0)?;
    if first.kind() != "expression_statement" {
        return None;
    }
    let string = first.named_child(0)?;
    if string.kind() != "string" {
        return None;
    }

    let mut walker = string.walk();
    let content: String = string
        .named_children(&mut walker)
        .filter(|c| c.kind() == "string_content")
        .map(|c| parsed.node_text(c))
        .collect();
    let raw = if content.is_empty() {
        unquote(parsed.node_text(string))
    } else {
        content
    };

    let cleaned = clean_docstring(&raw);
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

/// Strip the common indentation of continuation lines, like `inspect.cleandoc`.
fn clean_docstring(raw: &str) -> String {
    let lines: Vec<&str> = raw.lines().collect();
    let indent = lines
        .iter()
        .skip(1)
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.len() - l.trim_start().len())
        .min()
        .unwrap_or(0);

    lines
        .iter()
        .enumerate()
        .map(|(i, l)| {
            if i == 0 {
                l.trim()
            } else {
                l.get(indent..).unwrap_or_else(|| l.trim_start()).trim_end()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Routes registered by `@app.route(...)`-style decorators on a function.
fn decorator_routes(parsed: &ParsedFile, def: Node, handler: &str) -> Vec<Route> {
    let Some(decorated) = def.parent().filter(|p| p.kind() == "decorated_definition") else {
        return Vec::new();
    };

    let mut routes = Vec::new();
    let mut walker = decorated.walk();
    for decorator in decorated.named_children(&mut walker) {
        if decorator.kind() != "decorator" {
            continue;
        }
        let Some(call) = decorator.named_child(0).filter(|c| c.kind() == "call") else {
            continue;
        };
        let Some(func) = call
            .child_by_field_name("function")
            .filter(|f| f.kind() == "attribute")
        else {
            continue;
        };
        let verb = parsed
            .field_text(func, "attribute")
            .unwrap_or("")
            .to_ascii_lowercase();
        if !ROUTE_VERBS.contains(&verb.as_str()) {
            continue;
        }

        let mut path = "/unknown".to_string();
        let mut methods = vec![verb.to_ascii_uppercase()];

        if let Some(args) = call.child_by_field_name("arguments") {
            let mut arg_walker = args.walk();
            let positional: Vec<_> = args
                .named_children(&mut arg_walker)
                .filter(|a| !matches!(a.kind(), "keyword_argument" | "comment"))
                .collect();
            if let Some(first) = positional.first().filter(|a| a.kind() == "string") {
                path = unquote(parsed.node_text(*first));
            }

            let mut kw_walker = args.walk();
            for kw in args.named_children(&mut kw_walker) {
                if kw.kind() != "keyword_argument" || parsed.field_text(kw, "name") != Some("methods")
                {
                    continue;
                }
                let Some(list) = kw.child_by_field_name("value").filter(|v| v.kind() == "list")
                else {
                    continue;
                };
                let mut list_walker = list.walk();
                let listed: Vec<String> = list
                    .named_children(&mut list_walker)
                    .filter(|e| e.kind() == "string")
                    .map(|e| unquote(parsed.node_text(e)).to_ascii_uppercase())
                    .collect();
                if !listed.is_empty() {
                    methods = listed;
                }
            }
        }

        for method in methods {
            routes.push(Route {
                handler: handler.to_string(),
                method,
                path: path.clone(),
            });
        }
    }

    routes
}

impl LanguageAnalyzer for PythonAnalyzer {
    fn language_tag(&self) -> &'static str {
        ".py"
    }

    fn file_extensions(&self) -> &'static [&'static str] {
        &["py"]
    }

    fn parse(&self, path: &Path, source: &[u8]) -> anyhow::Result<ParsedFile> {
        let mut parser = self.create_parser()?;
        let tree = parser
            .parse(source, None)
            .ok_or_else(|| anyhow::anyhow!("failed to parse Python source: {}", path.display()))?;

        Ok(ParsedFile {
            tree,
            source: source.to_vec(),
            path: path.to_string_lossy().to_string(),
        })
    }

    fn extract_facts(&self, parsed: &ParsedFile) -> anyhow::Result<StructuralFacts> {
        let mut facts = StructuralFacts::empty(self.language_tag());
        self.extract_definitions(parsed, &mut facts)?;

        let root = parsed.tree.root_node();
        let loops = count_kinds(root, LOOP_KINDS);
        let branches = count_kinds(root, BRANCH_KINDS);
        facts.complexity =
            facts.functions.len() as u32 + facts.method_count() as u32 + loops + branches;

        if facts.complexity > HIGH_COMPLEXITY {
            facts.lint.push("High complexity".to_string());
        }

        Ok(facts)
    }
}
