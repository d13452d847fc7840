//! Compile parsed rules into matchers and evaluate them against documents.
//!
//! The compiler parses the rule's condition once, checks that every term names
//! a selector, and turns each field condition into a [`Matcher`]. Evaluation
//! then walks the condition tree against a [`Value`], evaluating each selector
//! at most once per call.

use std::collections::HashMap;

use omega_parser::{Detection, FieldKey, Query, Rule, RuleValue, Selector, parse_condition};

use crate::document::Value;
use crate::error::{EvalError, Result};
use crate::matcher::Matcher;
use crate::result::Evaluation;

// =============================================================================
// Compiled types
// =============================================================================

/// A rule with its condition parsed and its selectors compiled.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    /// Cache key the rule was loaded under, if any.
    pub key: Option<String>,
    pub rule: Rule,
    pub query: Query,
    pub selectors: HashMap<String, CompiledSelector>,
}

impl CompiledRule {
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }
}

/// A compiled selector.
#[derive(Debug, Clone)]
pub enum CompiledSelector {
    /// AND over field conditions.
    AllOf(Vec<CompiledField>),
    /// OR over sub-selectors.
    AnyOf(Vec<CompiledSelector>),
    /// Phrases searched anywhere in the document.
    Keywords(Vec<String>),
}

/// A field key and the matcher for its rule value.
#[derive(Debug, Clone)]
pub struct CompiledField {
    pub key: FieldKey,
    pub matcher: Matcher,
}

// =============================================================================
// Public API
// =============================================================================

/// Compile a parsed rule.
///
/// Fails if the condition does not parse or references a selector the
/// detection block does not define.
pub fn compile_rule(rule: &Rule) -> Result<CompiledRule> {
    let query = parse_condition(&rule.detection.condition)?;
    check_terms(&query, &rule.detection)?;
    let selectors = compile_selectors(&rule.detection);
    log::debug!(
        "compiled rule '{}' with {} selectors",
        rule.title,
        selectors.len()
    );

    Ok(CompiledRule {
        key: None,
        rule: rule.clone(),
        query,
        selectors,
    })
}

/// Compile and evaluate `rule` against `doc` in one step.
///
/// Callers evaluating the same rule repeatedly should [`compile_rule`] once
/// and use [`evaluate_compiled`].
pub fn evaluate<'r>(doc: &Value, rule: &'r Rule) -> Result<Evaluation<'r>> {
    let query = parse_condition(&rule.detection.condition)?;
    check_terms(&query, &rule.detection)?;
    let selectors = compile_selectors(&rule.detection);

    let mut memo = Memo::default();
    let matches = eval_query(&query, &selectors, doc, &mut memo);
    Ok(Evaluation {
        matches,
        rule,
        key: None,
        matched_selectors: memo.matched,
    })
}

/// Evaluate a compiled rule against `doc`.
pub fn evaluate_compiled<'r>(compiled: &'r CompiledRule, doc: &Value) -> Evaluation<'r> {
    let mut memo = Memo::default();
    let matches = eval_query(&compiled.query, &compiled.selectors, doc, &mut memo);
    Evaluation {
        matches,
        rule: &compiled.rule,
        key: compiled.key.as_deref(),
        matched_selectors: memo.matched,
    }
}

/// Match one field condition against `doc`.
///
/// A list of rule values matches if any element does. Dotted keys descend
/// through nested maps; a missing or scalar intermediate fails the match.
pub fn evaluate_field(key: &FieldKey, value: &RuleValue, doc: &Value) -> bool {
    let field = CompiledField {
        key: key.clone(),
        matcher: Matcher::compile(&key.modifier, value),
    };
    eval_field(&field, doc)
}

// =============================================================================
// Compilation
// =============================================================================

fn check_terms(query: &Query, detection: &Detection) -> Result<()> {
    match query
        .terms()
        .into_iter()
        .find(|term| detection.selector(term).is_none())
    {
        Some(missing) => Err(EvalError::UnknownSelector(missing.to_string())),
        None => Ok(()),
    }
}

fn compile_selectors(detection: &Detection) -> HashMap<String, CompiledSelector> {
    detection
        .selectors
        .iter()
        .map(|(name, selector)| (name.clone(), compile_selector(selector)))
        .collect()
}

fn compile_selector(selector: &Selector) -> CompiledSelector {
    match selector {
        Selector::AllOf(fields) => CompiledSelector::AllOf(
            fields
                .iter()
                .map(|fc| CompiledField {
                    key: fc.key.clone(),
                    matcher: Matcher::compile(&fc.key.modifier, &fc.value),
                })
                .collect(),
        ),
        Selector::AnyOf(alternatives) => {
            CompiledSelector::AnyOf(alternatives.iter().map(compile_selector).collect())
        }
        Selector::Keywords(phrases) => CompiledSelector::Keywords(phrases.clone()),
    }
}

// =============================================================================
// Evaluation
// =============================================================================

/// Per-call selector results.
#[derive(Default)]
struct Memo<'q> {
    results: HashMap<&'q str, bool>,
    /// Selectors that evaluated true, in evaluation order.
    matched: Vec<String>,
}

fn eval_query<'q>(
    query: &'q Query,
    selectors: &HashMap<String, CompiledSelector>,
    doc: &Value,
    memo: &mut Memo<'q>,
) -> bool {
    match query {
        Query::Term(name) => {
            if let Some(&hit) = memo.results.get(name.as_str()) {
                return hit;
            }
            let hit = selectors
                .get(name)
                .is_some_and(|selector| eval_selector(selector, doc));
            memo.results.insert(name, hit);
            if hit {
                memo.matched.push(name.clone());
            }
            hit
        }
        Query::Not(inner) => !eval_query(inner, selectors, doc, memo),
        Query::And(lhs, rhs) => {
            eval_query(lhs, selectors, doc, memo) && eval_query(rhs, selectors, doc, memo)
        }
        Query::Or(lhs, rhs) => {
            eval_query(lhs, selectors, doc, memo) || eval_query(rhs, selectors, doc, memo)
        }
    }
}

fn eval_selector(selector: &CompiledSelector, doc: &Value) -> bool {
    match selector {
        CompiledSelector::AllOf(fields) => fields.iter().all(|field| eval_field(field, doc)),
        CompiledSelector::AnyOf(alternatives) => {
            alternatives.iter().any(|alt| eval_selector(alt, doc))
        }
        CompiledSelector::Keywords(phrases) => {
            phrases.iter().any(|phrase| doc.contains_phrase(phrase))
        }
    }
}

fn eval_field(field: &CompiledField, doc: &Value) -> bool {
    if field.key.base.is_empty() {
        return false;
    }
    doc.descend(&field.key.path)
        .and_then(|parent| parent.get(&field.key.base))
        .is_some_and(|value| field.matcher.matches(value))
}

// =============================================================================
// Tests
// =============================================================================
