//! Fact structures extracted from one source file.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Analysis results for a scan, keyed by root-relative path.
pub type AnalysisMap = BTreeMap<String, StructuralFacts>;

/// Structural summary of one source file.
///
/// Replaced wholesale whenever the file is re-analyzed. Only categorization
/// annotates it afterwards, and only on class entries.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StructuralFacts {
    /// Dotted file suffix the facts were extracted for (`.py`, `.rs`, ...).
    pub language: String,
    /// Free-standing function names, in source order.
    pub functions: Vec<String>,
    /// Classes, structs and impl targets keyed by name.
    pub classes: BTreeMap<String, ClassInfo>,
    /// Web route declarations.
    pub routes: Vec<Route>,
    /// Coarse complexity score.
    pub complexity: u32,
    /// Style hints.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub lint: Vec<String>,
}

impl StructuralFacts {
    /// Well-formed facts with nothing in them.
    pub fn empty(language: &str) -> Self {
        Self {
            language: language.to_string(),
            ..Default::default()
        }
    }

    /// Total number of methods across all classes.
    pub fn method_count(&self) -> usize {
        self.classes.values().map(|c| c.methods.len()).sum()
    }

    /// Get or create the entry for a class name.
    pub fn class_entry(&mut self, name: &str) -> &mut ClassInfo {
        self.classes.entry(name.to_string()).or_default()
    }
}

/// A class-like definition.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ClassInfo {
    pub methods: Vec<String>,
    pub docstring: Option<String>,
    #[serde(default)]
    pub base_classes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maturity: Option<Maturity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_type: Option<AgentType>,
}

/// A route handler registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    /// Handler function (Python) or router object (JavaScript).
    pub handler: String,
    /// Upper-cased HTTP method.
    pub method: String,
    pub path: String,
}

/// Maturity label assigned by categorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Maturity {
    #[serde(rename = "Kiddie Script")]
    KiddieScript,
    Prototype,
    #[serde(rename = "Core Asset")]
    CoreAsset,
}

impl Maturity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Maturity::KiddieScript => "Kiddie Script",
            Maturity::Prototype => "Prototype",
            Maturity::CoreAsset => "Core Asset",
        }
    }
}

impl fmt::Display for Maturity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Role label assigned by categorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgentType {
    ActionAgent,
    DataAgent,
    SignalAgent,
    Utility,
}

impl fmt::Display for AgentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AgentType::ActionAgent => "ActionAgent",
            AgentType::DataAgent => "DataAgent",
            AgentType::SignalAgent => "SignalAgent",
            AgentType::Utility => "Utility",
        };
        write!(f, "{}", s)
    }
}
