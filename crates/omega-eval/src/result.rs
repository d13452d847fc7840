//! Evaluation result types.

use omega_parser::{Level, Rule};
use serde::Serialize;

/// The outcome of evaluating one rule against one document.
///
/// Borrows the rule so callers can report on it without cloning.
#[derive(Debug, Clone)]
pub struct Evaluation<'a> {
    pub matches: bool,
    pub rule: &'a Rule,
    /// Cache key the rule was loaded under, if any.
    pub key: Option<&'a str>,
    /// Selectors that evaluated true, in the order they were first evaluated.
    pub matched_selectors: Vec<String>,
}

impl Evaluation<'_> {
    /// Owned summary for serialisation.
    pub fn to_match_result(&self) -> MatchResult {
        MatchResult {
            rule: self.key.map(str::to_string),
            title: self.rule.title.clone(),
            id: self.rule.id.clone(),
            level: self.rule.level,
            tags: self.rule.tags.clone(),
            matched_selectors: self.matched_selectors.clone(),
        }
    }
}

/// A matched rule, as reported to callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchResult {
    /// Cache key of the matched rule.
    pub rule: Option<String>,
    pub title: String,
    pub id: Option<String>,
    pub level: Option<Level>,
    pub tags: Vec<String>,
    pub matched_selectors: Vec<String>,
}
