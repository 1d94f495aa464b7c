//! AST-backed structural extraction.
//!
//! Each supported language has a tree-sitter analyzer that turns one source
//! file into [`StructuralFacts`]: function names, classes with their
//! methods, route declarations and a coarse complexity score.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────────┐     ┌─────────────────┐
//! │ path + source   │────▶│ TreeSitterExtractor │────▶│ StructuralFacts │
//! └─────────────────┘     │  (by extension)     │     └─────────────────┘
//!                         └─────────────────────┘
//!                                   │ unknown extension
//!                                   ▼
//!                           ┌───────────────┐
//!                           │ NullExtractor │
//!                           └───────────────┘
//! ```
//!
//! # Adding a New Language
//!
//! 1. Create a new module in `src/analysis/languages/`
//! 2. Implement the `LanguageAnalyzer` trait
//! 3. Add a static and a lookup arm in `languages/mod.rs`

mod categorize;
mod extractor;
mod facts;
mod languages;
mod traits;

pub use categorize::{agent_type, categorize, maturity_level};
pub use extractor::{language_tag, NullExtractor, TreeSitterExtractor};
pub use facts::{AgentType, AnalysisMap, ClassInfo, Maturity, Route, StructuralFacts};
pub use languages::{
    get_analyzer, registered_extensions, JavaScriptAnalyzer, PythonAnalyzer, RustAnalyzer,
    TypeScriptAnalyzer,
};
pub use traits::{LanguageAnalyzer, ParsedFile, StructuralExtractor};
