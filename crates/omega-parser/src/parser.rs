//! YAML → AST parser for omega rules, and the keyed rule set loaded from disk.
//!
//! Handles:
//! - Single-document YAML rules
//! - Detection section parsing (named selectors, field keys, values)
//! - Directory-based loading into a [`RuleSet`] keyed by file name

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::Serialize;
use serde_yaml::Value;

use crate::ast::*;
use crate::error::{OmegaParserError, Result};
use crate::field::FieldKey;
use crate::validate::{ValidationResult, validate_rule};

// =============================================================================
// Public API
// =============================================================================

/// Parse a YAML string holding a single rule.
pub fn parse_rule_yaml(yaml: &str) -> Result<Rule> {
    let value: Value = serde_yaml::from_str(yaml)?;
    parse_rule_value(&value)
}

/// Parse a single rule file.
pub fn parse_rule_file(path: &Path) -> Result<Rule> {
    let content = std::fs::read_to_string(path)?;
    parse_rule_yaml(&content)
}

/// Load every `*.yml`/`*.yaml` file under `dir` (recursively) into a [`RuleSet`].
///
/// Rules are validated before they are accepted. Files that fail to read,
/// parse or validate are recorded in [`RuleSet::errors`] and skipped.
pub fn parse_rule_directory(dir: &Path) -> Result<RuleSet> {
    let mut set = RuleSet::new();
    set.load_directory(dir)?;
    Ok(set)
}

/// Load a rule file or a directory of rule files.
pub fn load_rules(path: &Path) -> Result<RuleSet> {
    let mut set = RuleSet::new();
    if path.is_dir() {
        set.load_directory(path)?;
    } else {
        set.load_file(path)?;
    }
    Ok(set)
}

/// Convert a parsed YAML value into a typed [`Rule`].
///
/// Only the shape needed for evaluation is enforced here: a string `title`
/// and a `detection` mapping with a string `condition`. Unknown enum values
/// in optional metadata are dropped. Use [`validate_rule`] to report them.
pub fn parse_rule_value(value: &Value) -> Result<Rule> {
    let m = value
        .as_mapping()
        .ok_or_else(|| OmegaParserError::InvalidRule("expected a YAML mapping".into()))?;

    let title = get_str(m, "title")
        .ok_or_else(|| OmegaParserError::MissingField("title".into()))?
        .to_string();

    let detection_val = m
        .get(val_key("detection"))
        .ok_or_else(|| OmegaParserError::MissingField("detection".into()))?;
    let detection = parse_detection(detection_val)?;

    Ok(Rule {
        title,
        detection,
        id: get_str(m, "id").map(|s| s.to_string()),
        status: get_str(m, "status").and_then(|s| s.parse().ok()),
        level: get_str(m, "level").and_then(|s| s.parse().ok()),
        description: get_str(m, "description").map(|s| s.to_string()),
        references: get_str_list(m, "references"),
        author: get_str(m, "author").map(|s| s.to_string()),
        date: get_str(m, "date").map(|s| s.to_string()),
        modified: get_str(m, "modified").map(|s| s.to_string()),
        tags: get_str_list(m, "tags"),
        falsepositives: get_str_or_str_list(m, "falsepositives"),
        related: parse_related(m.get(val_key("related"))),
        fields: get_str_list(m, "fields"),
    })
}

// =============================================================================
// Rule Set
// =============================================================================

/// Rules keyed by identifier, plus the errors met while loading them.
///
/// Directory loads key each rule by its file name up to the first `.`, so
/// `rules/new_account.yml` is stored as `new_account`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RuleSet {
    pub rules: BTreeMap<String, Rule>,
    pub errors: Vec<String>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a rule, returning the one previously stored under `key`.
    pub fn insert(&mut self, key: impl Into<String>, rule: Rule) -> Option<Rule> {
        self.rules.insert(key.into(), rule)
    }

    pub fn get(&self, key: &str) -> Option<&Rule> {
        self.rules.get(key)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Rule)> {
        self.rules.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Walk `dir` recursively and load every rule file found.
    pub fn load_directory(&mut self, dir: &Path) -> Result<()> {
        let mut entries = std::fs::read_dir(dir)?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<std::io::Result<Vec<_>>>()?;
        entries.sort();

        for path in entries {
            if path.is_dir() {
                self.load_directory(&path)?;
            } else if is_rule_file(&path) {
                self.load_file(&path)?;
            }
        }
        Ok(())
    }

    /// Load a single rule file. Only an unreadable file is an `Err`; parse
    /// and validation failures are recorded in [`RuleSet::errors`].
    pub fn load_file(&mut self, path: &Path) -> Result<()> {
        let content = std::fs::read_to_string(path)?;
        let key = rule_key(path);

        let value: Value = match serde_yaml::from_str(&content) {
            Ok(v) => v,
            Err(e) => {
                self.errors.push(format!("{}: YAML parse error: {e}", path.display()));
                return Ok(());
            }
        };

        match validate_rule(&value) {
            ValidationResult::Invalid { errors, .. } => {
                let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
                self.errors
                    .push(format!("{}: {}", path.display(), messages.join("; ")));
                return Ok(());
            }
            ValidationResult::Valid { warnings } => {
                for warning in warnings {
                    log::warn!("{}: {warning}", path.display());
                }
            }
        }

        match parse_rule_value(&value) {
            Ok(rule) => {
                log::debug!("adding rule '{}' ({key}) to rule set", rule.title);
                if self.insert(key.clone(), rule).is_some() {
                    log::warn!("{}: replaces an earlier rule keyed '{key}'", path.display());
                }
            }
            Err(e) => self.errors.push(format!("{}: {e}", path.display())),
        }
        Ok(())
    }
}

fn is_rule_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yml" | "yaml")
    )
}

/// File name up to its first `.`.
fn rule_key(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    match name.split_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem.to_string(),
        _ => name,
    }
}

// =============================================================================
// Detection Section Parsing
// =============================================================================

/// Parse the `detection:` section of a rule.
///
/// `condition` is required and kept as raw text. Every other key is a
/// named selector.
fn parse_detection(value: &Value) -> Result<Detection> {
    let m = value.as_mapping().ok_or_else(|| {
        OmegaParserError::InvalidDetection("detection section must be a mapping".into())
    })?;

    let condition = get_str(m, "condition")
        .ok_or_else(|| OmegaParserError::MissingField("detection.condition".into()))?
        .to_string();

    let mut selectors = HashMap::new();
    for (key, val) in m {
        let name = key.as_str().ok_or_else(|| {
            OmegaParserError::InvalidDetection(format!("selector name must be a string: {key:?}"))
        })?;
        if name == "condition" {
            continue;
        }
        selectors.insert(name.to_string(), parse_selector(val));
    }

    Ok(Detection {
        condition,
        selectors,
    })
}

/// Parse a single named selector.
///
/// A selector can be:
/// 1. A mapping (field conditions, AND-linked)
/// 2. A list of plain values (phrases searched anywhere)
/// 3. A list holding mappings (OR-linked sub-selectors)
fn parse_selector(value: &Value) -> Selector {
    match value {
        Value::Mapping(m) => Selector::AllOf(
            m.iter()
                .map(|(k, v)| FieldCondition {
                    key: FieldKey::parse(&scalar_text(k).unwrap_or_default()),
                    value: to_rule_value(v),
                })
                .collect(),
        ),
        Value::Sequence(seq) => {
            let all_plain = seq.iter().all(|v| !v.is_mapping() && !v.is_sequence());
            if all_plain {
                Selector::Keywords(seq.iter().filter_map(scalar_text).collect())
            } else {
                Selector::AnyOf(seq.iter().map(parse_selector).collect())
            }
        }
        Value::Tagged(tagged) => parse_selector(&tagged.value),
        // Plain value → single phrase
        other => Selector::Keywords(scalar_text(other).into_iter().collect()),
    }
}

/// Convert a YAML value on the right-hand side of a field condition.
fn to_rule_value(v: &Value) -> RuleValue {
    match v {
        Value::Bool(b) => RuleValue::Bool(*b),
        Value::Number(n) => n.as_f64().map(RuleValue::Number).unwrap_or(RuleValue::Null),
        Value::String(s) => RuleValue::String(s.clone()),
        Value::Sequence(seq) => RuleValue::List(seq.iter().map(to_rule_value).collect()),
        Value::Tagged(tagged) => to_rule_value(&tagged.value),
        Value::Null | Value::Mapping(_) => RuleValue::Null,
    }
}

/// Text form of a YAML scalar, as used for phrases and map keys.
fn scalar_text(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(number_text(n)),
        Value::Bool(b) => Some(b.to_string()),
        Value::Tagged(tagged) => scalar_text(&tagged.value),
        _ => None,
    }
}

/// Integers print without a fraction, and integral floats print like integers.
fn number_text(n: &serde_yaml::Number) -> String {
    if let Some(i) = n.as_i64() {
        i.to_string()
    } else if let Some(u) = n.as_u64() {
        u.to_string()
    } else {
        n.as_f64().map(|f| f.to_string()).unwrap_or_else(|| n.to_string())
    }
}

// =============================================================================
// Related Rules Parsing
// =============================================================================

fn parse_related(value: Option<&Value>) -> Vec<Related> {
    let Some(Value::Sequence(seq)) = value else {
        return Vec::new();
    };

    seq.iter()
        .filter_map(|item| {
            let m = item.as_mapping()?;
            let id = get_str(m, "id")?.to_string();
            let relation_type = get_str(m, "type")?.parse().ok()?;
            Some(Related { id, relation_type })
        })
        .collect()
}

// =============================================================================
// YAML Helpers
// =============================================================================

pub(crate) fn val_key(s: &str) -> Value {
    Value::String(s.to_string())
}

pub(crate) fn get_str<'a>(m: &'a serde_yaml::Mapping, key: &str) -> Option<&'a str> {
    m.get(val_key(key)).and_then(|v| v.as_str())
}

fn get_str_list(m: &serde_yaml::Mapping, key: &str) -> Vec<String> {
    match m.get(val_key(key)) {
        Some(Value::Sequence(seq)) => seq
            .iter()
            .filter_map(|v| v.as_str().map(|s| s.to_string()))
            .collect(),
        _ => Vec::new(),
    }
}

fn get_str_or_str_list(m: &serde_yaml::Mapping, key: &str) -> Vec<String> {
    match m.get(val_key(key)) {
        Some(Value::String(s)) => vec![s.clone()],
        _ => get_str_list(m, key),
    }
}

// =============================================================================
// Tests
// =============================================================================
