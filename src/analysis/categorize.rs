//! Heuristic labelling of Python classes.
//!
//! Purely cosmetic: the labels are derived from facts already extracted and
//! only ever written onto class entries.

use super::{AgentType, AnalysisMap, ClassInfo, Maturity};

/// Annotate every class in every Python file with maturity and agent type.
pub fn categorize(analysis: &mut AnalysisMap) {
    for facts in analysis.values_mut().filter(|f| f.language == ".py") {
        for (name, class) in facts.classes.iter_mut() {
            class.maturity = Some(maturity_level(name, class));
            class.agent_type = Some(agent_type(class));
        }
    }
}

/// One point each for a docstring, more than three methods, a real base
/// class and a capitalized name.
pub fn maturity_level(name: &str, class: &ClassInfo) -> Maturity {
    let mut score = 0;
    if class.docstring.as_deref().is_some_and(|d| !d.is_empty()) {
        score += 1;
    }
    if class.methods.len() > 3 {
        score += 1;
    }
    if class.base_classes.iter().any(|b| !b.is_empty() && b != "object") {
        score += 1;
    }
    if name.chars().next().is_some_and(char::is_uppercase) {
        score += 1;
    }

    match score {
        0 => Maturity::KiddieScript,
        1 => Maturity::Prototype,
        _ => Maturity::CoreAsset,
    }
}

/// First matching rule wins: `run` method, data-ish docstring, then
/// `predict`/`analyze` methods.
pub fn agent_type(class: &ClassInfo) -> AgentType {
    let doc = class
        .docstring
        .as_deref()
        .unwrap_or_default()
        .to_lowercase();
    let has_method = |m: &str| class.methods.iter().any(|x| x == m);

    if has_method("run") {
        AgentType::ActionAgent
    } else if doc.contains("transform") || doc.contains("parse") {
        AgentType::DataAgent
    } else if has_method("predict") || has_method("analyze") {
        AgentType::SignalAgent
    } else {
        AgentType::Utility
    }
}
