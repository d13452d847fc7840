//! Rule validator.
//!
//! Works on raw `serde_yaml::Value` documents, before they are turned into a
//! typed [`Rule`](crate::Rule). Errors make a rule unusable; warnings flag
//! metadata the parser silently drops and selectors that can never matter.
//!
//! ```rust
//! use omega_parser::validate::{ValidationError, validate_rule_str};
//!
//! let result = validate_rule_str("title: t\ndetection:\n  a: [x]\n  condition: a and b\n");
//! assert!(!result.is_valid());
//! assert_eq!(result.errors(), &[ValidationError::PropertyMissing("b".into())]);
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_yaml::Value;
use thiserror::Error;

use crate::ast::{Level, RelationType, Status};
use crate::condition::parse_condition;
use crate::field::{FieldKey, Modifier};
use crate::parser::{get_str, val_key};

// =============================================================================
// Public types
// =============================================================================

/// A problem that makes a rule unusable.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", content = "detail")]
pub enum ValidationError {
    #[error("input is not a rule mapping")]
    InvalidInput,

    #[error("missing required field '{0}'")]
    MissingRequired(String),

    #[error("condition failed to parse: {0}")]
    ConditionParseFailure(String),

    #[error("condition references undefined selector '{0}'")]
    PropertyMissing(String),
}

/// Outcome of validating one rule. Warnings never affect validity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ValidationResult {
    Valid {
        warnings: Vec<String>,
    },
    Invalid {
        warnings: Vec<String>,
        errors: Vec<ValidationError>,
    },
}

impl ValidationResult {
    fn from_parts(errors: Vec<ValidationError>, warnings: Vec<String>) -> Self {
        if errors.is_empty() {
            ValidationResult::Valid { warnings }
        } else {
            ValidationResult::Invalid { warnings, errors }
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationResult::Valid { .. })
    }

    pub fn warnings(&self) -> &[String] {
        match self {
            ValidationResult::Valid { warnings } | ValidationResult::Invalid { warnings, .. } => {
                warnings
            }
        }
    }

    pub fn errors(&self) -> &[ValidationError] {
        match self {
            ValidationResult::Valid { .. } => &[],
            ValidationResult::Invalid { errors, .. } => errors,
        }
    }
}

/// Validation result for a single file.
#[derive(Debug, Clone, Serialize)]
pub struct FileValidation {
    pub path: PathBuf,
    pub result: ValidationResult,
}

// =============================================================================
// Public API
// =============================================================================

/// Validate a YAML value as an omega rule.
pub fn validate_rule(value: &Value) -> ValidationResult {
    let Some(m) = value.as_mapping() else {
        return ValidationResult::from_parts(vec![ValidationError::InvalidInput], Vec::new());
    };

    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    if get_str(m, "title").is_none_or(str::is_empty) {
        errors.push(ValidationError::MissingRequired("title".into()));
    }

    validate_metadata(m, &mut warnings);
    validate_related(m, &mut warnings);
    validate_detection(m, &mut errors, &mut warnings);

    ValidationResult::from_parts(errors, warnings)
}

/// Validate YAML text. Text that is not well-formed YAML is `InvalidInput`.
pub fn validate_rule_str(text: &str) -> ValidationResult {
    match serde_yaml::from_str::<Value>(text) {
        Ok(value) => validate_rule(&value),
        Err(e) => {
            log::debug!("rule text is not valid YAML: {e}");
            ValidationResult::from_parts(vec![ValidationError::InvalidInput], Vec::new())
        }
    }
}

/// Validate a single rule file.
pub fn validate_rule_file(path: &Path) -> crate::error::Result<ValidationResult> {
    let content = std::fs::read_to_string(path)?;
    Ok(validate_rule_str(&content))
}

/// Validate every `.yml`/`.yaml` file under `dir`, recursively.
///
/// Hidden directories are skipped and symlink cycles are visited once.
pub fn validate_rule_directory(dir: &Path) -> crate::error::Result<Vec<FileValidation>> {
    let mut results = Vec::new();
    let mut visited = HashSet::new();

    fn walk(
        dir: &Path,
        results: &mut Vec<FileValidation>,
        visited: &mut HashSet<PathBuf>,
    ) -> crate::error::Result<()> {
        let Ok(canonical) = dir.canonicalize() else {
            return Ok(());
        };
        if !visited.insert(canonical) {
            return Ok(());
        }

        let mut entries: Vec<_> = std::fs::read_dir(dir)?.filter_map(|e| e.ok()).collect();
        entries.sort_by_key(|e| e.path());

        for entry in entries {
            let path = entry.path();
            if path.is_dir() {
                if path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with('.'))
                {
                    continue;
                }
                walk(&path, results, visited)?;
            } else if matches!(
                path.extension().and_then(|e| e.to_str()),
                Some("yml" | "yaml")
            ) {
                let result = validate_rule_file(&path)?;
                results.push(FileValidation { path, result });
            }
        }
        Ok(())
    }

    walk(dir, &mut results, &mut visited)?;
    Ok(results)
}

// =============================================================================
// Checks
// =============================================================================

const LIST_FIELDS: &[&str] = &["tags", "references", "falsepositives", "fields"];

fn names<T, const N: usize>(all: [T; N], as_str: fn(&T) -> &'static str) -> String {
    all.iter().map(as_str).collect::<Vec<_>>().join(", ")
}

fn validate_metadata(m: &serde_yaml::Mapping, warnings: &mut Vec<String>) {
    // ── status ───────────────────────────────────────────────────────────
    match m.get(val_key("status")) {
        None | Some(Value::Null) => {}
        Some(Value::String(s)) if s.parse::<Status>().is_ok() => {}
        Some(other) => warnings.push(format!(
            "Non-standard rule status {}, expected one of: {}",
            display_value(other),
            names(Status::ALL, Status::as_str)
        )),
    }

    // ── level ────────────────────────────────────────────────────────────
    match m.get(val_key("level")) {
        None | Some(Value::Null) => {}
        Some(Value::String(s)) if s.parse::<Level>().is_ok() => {}
        Some(other) => warnings.push(format!(
            "Non-standard rule level {}, expected one of: {}",
            display_value(other),
            names(Level::ALL, Level::as_str)
        )),
    }

    // ── list-of-string metadata ──────────────────────────────────────────
    for field in LIST_FIELDS {
        let ok = match m.get(val_key(field)) {
            None | Some(Value::Null) => true,
            Some(Value::Sequence(seq)) => seq.iter().all(Value::is_string),
            // falsepositives is commonly written as a single string
            Some(Value::String(_)) => *field == "falsepositives",
            Some(_) => false,
        };
        if !ok {
            warnings.push(format!("Non-standard {field} value, expected a list of strings"));
        }
    }
}

fn validate_related(m: &serde_yaml::Mapping, warnings: &mut Vec<String>) {
    let entries = match m.get(val_key("related")) {
        None | Some(Value::Null) => return,
        Some(Value::Sequence(seq)) => seq,
        Some(other) => {
            warnings.push(format!(
                "Non-standard related value {}, expected a list of relations",
                display_value(other)
            ));
            return;
        }
    };

    let mut seen = HashSet::new();
    let mut reported = HashSet::new();

    for (i, entry) in entries.iter().enumerate() {
        let Some(relation) = entry.as_mapping() else {
            warnings.push(format!(
                "Non-standard relation shape at related[{i}], expected a mapping with 'id' and 'type'"
            ));
            continue;
        };

        let id = get_str(relation, "id");
        let kind = get_str(relation, "type");
        if id.is_none() || kind.is_none() {
            warnings.push(format!(
                "Non-standard relation shape at related[{i}], expected a mapping with 'id' and 'type'"
            ));
        }

        if let Some(id) = id
            && !seen.insert(id)
            && reported.insert(id)
        {
            warnings.push(format!("Non-unique relation id {id} in related"));
        }

        if let Some(kind) = kind
            && kind.parse::<RelationType>().is_err()
        {
            warnings.push(format!(
                "Non-standard relation type at related[{i}], expected one of: {}, received {kind}",
                names(RelationType::ALL, RelationType::as_str)
            ));
        }
    }
}

fn validate_detection(
    m: &serde_yaml::Mapping,
    errors: &mut Vec<ValidationError>,
    warnings: &mut Vec<String>,
) {
    let detection = match m.get(val_key("detection")) {
        None | Some(Value::Null) => {
            errors.push(ValidationError::MissingRequired("detection".into()));
            return;
        }
        Some(Value::Mapping(detection)) => detection,
        Some(_) => {
            errors.push(ValidationError::MissingRequired("detection.condition".into()));
            return;
        }
    };

    for (name, selector) in detection {
        let Some(name) = name.as_str() else {
            warnings.push(format!(
                "Found non-string selector name {}, it cannot be referenced",
                display_value(name)
            ));
            continue;
        };
        if name != "condition" {
            validate_selector(name, selector, warnings);
        }
    }

    let Some(condition) = get_str(detection, "condition").filter(|c| !c.is_empty()) else {
        errors.push(ValidationError::MissingRequired("detection.condition".into()));
        return;
    };

    let query = match parse_condition(condition) {
        Ok(query) => query,
        Err(e) => {
            errors.push(ValidationError::ConditionParseFailure(e.to_string()));
            return;
        }
    };

    let terms = query.terms();
    let mut missing = HashSet::new();
    for term in &terms {
        let defined = *term != "condition" && detection.contains_key(val_key(term));
        if !defined && missing.insert(*term) {
            errors.push(ValidationError::PropertyMissing(term.to_string()));
        }
    }

    for name in detection.keys().filter_map(Value::as_str) {
        if name != "condition" && !terms.contains(&name) {
            warnings.push(format!(
                "Found unused property {name} in detection, it is never referenced by the condition"
            ));
        }
    }
}

fn validate_selector(name: &str, selector: &Value, warnings: &mut Vec<String>) {
    match selector {
        Value::Mapping(fields) if fields.is_empty() => {
            warnings.push(format!("Selector {name} is an empty map and always matches"));
        }
        Value::Mapping(fields) => {
            for (key, value) in fields {
                let key = key.as_str().unwrap_or_default();
                if let Modifier::Invalid(raw) = FieldKey::parse(key).modifier {
                    warnings.push(format!(
                        "Unknown modifier {raw} on {key} in selector {name}, it never matches"
                    ));
                }
                if !can_match(value) {
                    warnings.push(format!(
                        "Value of {key} in selector {name} is not a string, number, boolean or list, it never matches"
                    ));
                }
            }
        }
        Value::Sequence(items) => {
            for item in items.iter().filter(|v| v.is_mapping() || v.is_sequence()) {
                validate_selector(name, item, warnings);
            }
        }
        _ => {}
    }
}

fn can_match(value: &Value) -> bool {
    match value {
        Value::Bool(_) | Value::Number(_) | Value::String(_) => true,
        Value::Sequence(items) => items.iter().all(can_match),
        Value::Tagged(tagged) => can_match(&tagged.value),
        Value::Null | Value::Mapping(_) => false,
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_else(|_| format!("{other:?}")),
    }
}

// =============================================================================
// Tests
// =============================================================================
