//! Rule evaluation engine.
//!
//! The `Engine` holds a set of compiled rules and evaluates documents against
//! all of them. Compiled rules are immutable, so one engine can be shared
//! across threads and queried concurrently.

use omega_parser::{Rule, RuleSet};

use crate::compiler::{CompiledRule, compile_rule, evaluate_compiled};
use crate::document::Value;
use crate::error::{EvalError, Result};
use crate::result::Evaluation;

/// The main rule evaluation engine.
///
/// # Example
///
/// ```rust
/// use omega_parser::parse_rule_yaml;
/// use omega_eval::{Engine, Value};
/// use serde_json::json;
///
/// let rule = parse_rule_yaml(r#"
/// title: Free Nitro Scam
/// detection:
///     bio:
///         bio|contains: 'free nitro'
///     condition: bio
/// level: high
/// "#).unwrap();
///
/// let mut engine = Engine::new();
/// engine.add_rule(&rule).unwrap();
///
/// let doc = Value::from(json!({"bio": "Click for FREE NITRO"}));
/// let matches = engine.evaluate(&doc);
/// assert_eq!(matches.len(), 1);
/// assert_eq!(matches[0].rule.title, "Free Nitro Scam");
/// ```
#[derive(Debug, Clone, Default)]
pub struct Engine {
    rules: Vec<CompiledRule>,
}

impl Engine {
    /// Create a new empty engine.
    pub fn new() -> Self {
        Engine { rules: Vec::new() }
    }

    /// Compile and add a single rule.
    pub fn add_rule(&mut self, rule: &Rule) -> Result<()> {
        let compiled = compile_rule(rule)?;
        self.rules.push(compiled);
        Ok(())
    }

    /// Compile and add a rule under a cache key.
    pub fn add_keyed_rule(&mut self, key: &str, rule: &Rule) -> Result<()> {
        let compiled = compile_rule(rule)?.with_key(key);
        self.rules.push(compiled);
        Ok(())
    }

    /// Add every rule in `set`, keyed by its set key.
    ///
    /// Rules that fail to compile are skipped and returned with their keys.
    pub fn add_rule_set(&mut self, set: &RuleSet) -> Vec<(String, EvalError)> {
        let mut failures = Vec::new();
        for (key, rule) in set.iter() {
            if let Err(e) = self.add_keyed_rule(key, rule) {
                log::warn!("skipping rule '{key}': {e}");
                failures.push((key.to_string(), e));
            }
        }
        failures
    }

    /// Add an already compiled rule.
    pub fn add_compiled_rule(&mut self, rule: CompiledRule) {
        self.rules.push(rule);
    }

    /// Evaluate a document against all rules, returning the matches.
    pub fn evaluate(&self, doc: &Value) -> Vec<Evaluation<'_>> {
        self.rules
            .iter()
            .map(|rule| evaluate_compiled(rule, doc))
            .filter(|ev| ev.matches)
            .collect()
    }

    /// Number of rules loaded in the engine.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Access the compiled rules.
    pub fn rules(&self) -> &[CompiledRule] {
        &self.rules
    }
}
