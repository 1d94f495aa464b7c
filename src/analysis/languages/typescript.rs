//! TypeScript language analyzer using tree-sitter.
//!
//! `.tsx` files need the TSX grammar; everything else uses the plain
//! TypeScript grammar. Extraction is shared with JavaScript.

use std::path::Path;

use tree_sitter::{Language, Parser};

use super::javascript::extract_script_facts;
use crate::analysis::{LanguageAnalyzer, ParsedFile, StructuralFacts};

pub struct TypeScriptAnalyzer {
    language: Language,
    tsx: Language,
}

impl TypeScriptAnalyzer {
    pub fn new() -> Self {
        Self {
            language: tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            tsx: tree_sitter_typescript::LANGUAGE_TSX.into(),
        }
    }

    fn create_parser(&self, path: &Path) -> anyhow::Result<Parser> {
        let is_tsx = path
            .extension()
            .is_some_and(|e| e.eq_ignore_ascii_case("tsx"));
        let mut parser = Parser::new();
        parser.set_language(if is_tsx { &self.tsx } else { &self.language })?;
        Ok(parser)
    }
}

impl Default for TypeScriptAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguageAnalyzer for TypeScriptAnalyzer {
    fn language_tag(&self) -> &'static str {
        ".ts"
    }

    fn file_extensions(&self) -> &'static [&'static str] {
        &["ts", "mts", "cts", "tsx"]
    }

    fn parse(&self, path: &Path, source: &[u8]) -> anyhow::Result<ParsedFile> {
        let mut parser = self.create_parser(path)?;
        let tree = parser.parse(source, None).ok_or_else(|| {
            anyhow::anyhow!("failed to parse TypeScript source: {}", path.display())
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

#[cfg(test)]
mod tests {
    use super::*;

    fn analyze(file: &str, source: &str) -> StructuralFacts {
        let analyzer = TypeScriptAnalyzer::new();
        let parsed = analyzer.parse(Path::new(file), source.as_bytes()).unwrap();
        analyzer.extract_facts(&parsed).unwrap()
    }

    #[test]
    fn test_classes_with_heritage() {
        let facts = analyze(
            "repo.ts",
            r#"
interface Store {}

export class Repo<T> extends Base<T> implements Store {
  private items: T[] = [];

  find(id: string): T | undefined {
    return undefined;
  }

  async save(item: T): Promise<void> {
    for (const x of this.items) {}
  }
}

export function build(): Repo<string> {
  return new Repo();
}

const parse = (s: string): number => parseInt(s);
"#,
        );

        assert_eq!(facts.language, ".ts");
        assert_eq!(facts.functions, vec!["build", "parse"]);

        let repo = &facts.classes["Repo"];
        assert_eq!(repo.methods, vec!["find", "save"]);
        assert_eq!(repo.base_classes, vec!["Base", "Store"]);

        // 2 functions + 2 methods + 1 for
        assert_eq!(facts.complexity, 5);
        assert!(facts.lint.is_empty());
    }

    #[test]
    fn test_abstract_class() {
        let facts = analyze(
            "shape.ts",
            r#"
abstract class Shape {
  abstract area(): number;
  describe(): string { return "shape"; }
}
"#,
        );
        assert_eq!(facts.classes["Shape"].methods, vec!["area", "describe"]);
    }

    #[test]
    fn test_tsx_uses_jsx_grammar() {
        let facts = analyze("App.tsx", "const App = () => <div>Hello</div>;\n");
        assert_eq!(facts.functions, vec!["App"]);
        assert!(facts.lint.is_empty());
    }

    #[test]
    fn test_express_routes() {
        let facts = analyze(
            "server.ts",
            "router.put('/items/:id', (req: Request, res: Response) => res.end());\n",
        );
        assert_eq!(facts.routes.len(), 1);
        assert_eq!(facts.routes[0].handler, "router");
        assert_eq!(facts.routes[0].method, "PUT");
        assert_eq!(facts.routes[0].path, "/items/:id");
    }
}
