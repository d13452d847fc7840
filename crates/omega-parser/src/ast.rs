//! AST types for omega rules: metadata enums, the detection record with its
//! selectors, and the parsed condition query.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::field::FieldKey;

// =============================================================================
// Enumerations
// =============================================================================

/// Rule maturity status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Unsupported,
    Deprecated,
    Experimental,
    Test,
    Stable,
}

impl Status {
    pub const ALL: [Status; 5] = [
        Status::Unsupported,
        Status::Deprecated,
        Status::Experimental,
        Status::Test,
        Status::Stable,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Unsupported => "unsupported",
            Status::Deprecated => "deprecated",
            Status::Experimental => "experimental",
            Status::Test => "test",
            Status::Stable => "stable",
        }
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Status::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| s.to_string())
    }
}

/// Severity level of a triggered rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Informational,
    Low,
    Medium,
    High,
    Critical,
}

impl Level {
    pub const ALL: [Level; 5] = [
        Level::Informational,
        Level::Low,
        Level::Medium,
        Level::High,
        Level::Critical,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Informational => "informational",
            Level::Low => "low",
            Level::Medium => "medium",
            Level::High => "high",
            Level::Critical => "critical",
        }
    }
}

impl FromStr for Level {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Level::ALL
            .into_iter()
            .find(|level| level.as_str() == s)
            .ok_or_else(|| s.to_string())
    }
}

/// Relationship type for the `related` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationType {
    Derived,
    Obsolete,
    Merged,
    Renamed,
    Similar,
}

impl RelationType {
    pub const ALL: [RelationType; 5] = [
        RelationType::Derived,
        RelationType::Obsolete,
        RelationType::Merged,
        RelationType::Renamed,
        RelationType::Similar,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RelationType::Derived => "derived",
            RelationType::Obsolete => "obsolete",
            RelationType::Merged => "merged",
            RelationType::Renamed => "renamed",
            RelationType::Similar => "similar",
        }
    }
}

impl FromStr for RelationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RelationType::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| s.to_string())
    }
}

// =============================================================================
// Condition Query AST
// =============================================================================

/// Parsed condition expression.
///
/// Chained `and`/`or` fold to the left, so `a and b and c` is
/// `And(And(a, b), c)`. A query holds no references into the rule and can be
/// evaluated against any number of documents.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum Query {
    /// Reference to a selector by name.
    Term(String),
    Not(Box<Query>),
    And(Box<Query>, Box<Query>),
    Or(Box<Query>, Box<Query>),
}

impl Query {
    pub fn term(name: impl Into<String>) -> Self {
        Query::Term(name.into())
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(inner: Query) -> Self {
        Query::Not(Box::new(inner))
    }

    pub fn and(lhs: Query, rhs: Query) -> Self {
        Query::And(Box::new(lhs), Box::new(rhs))
    }

    pub fn or(lhs: Query, rhs: Query) -> Self {
        Query::Or(Box::new(lhs), Box::new(rhs))
    }

    /// All term names in left-to-right order, duplicates included.
    pub fn terms(&self) -> Vec<&str> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            match node {
                Query::Term(name) => out.push(name.as_str()),
                Query::Not(inner) => stack.push(inner),
                Query::And(lhs, rhs) | Query::Or(lhs, rhs) => {
                    stack.push(rhs);
                    stack.push(lhs);
                }
            }
        }
        out
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Query::Term(name) => write!(f, "{name}"),
            Query::Not(inner) => write!(f, "not {inner}"),
            Query::And(lhs, rhs) => write!(f, "({lhs} and {rhs})"),
            Query::Or(lhs, rhs) => write!(f, "({lhs} or {rhs})"),
        }
    }
}

// =============================================================================
// Detection Section
// =============================================================================

/// A value on the rule side of a field condition.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RuleValue {
    /// YAML null or a nested mapping. Never matches.
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    /// Any element may match.
    List(Vec<RuleValue>),
}

impl From<&str> for RuleValue {
    fn from(s: &str) -> Self {
        RuleValue::String(s.to_string())
    }
}

impl From<String> for RuleValue {
    fn from(s: String) -> Self {
        RuleValue::String(s)
    }
}

impl From<f64> for RuleValue {
    fn from(n: f64) -> Self {
        RuleValue::Number(n)
    }
}

impl From<i64> for RuleValue {
    fn from(n: i64) -> Self {
        RuleValue::Number(n as f64)
    }
}

impl From<bool> for RuleValue {
    fn from(b: bool) -> Self {
        RuleValue::Bool(b)
    }
}

/// One `key: value` entry of a selector map.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldCondition {
    pub key: FieldKey,
    pub value: RuleValue,
}

/// Field conditions of a map selector, in YAML order. All must hold.
pub type FieldMap = Vec<FieldCondition>;

/// A named selector in the detection record.
///
/// A YAML mapping becomes [`Selector::AllOf`], a list of plain values becomes
/// [`Selector::Keywords`] and a list holding mappings becomes
/// [`Selector::AnyOf`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Selector {
    /// AND over the field conditions.
    AllOf(FieldMap),
    /// OR over the sub-selectors. Empty never matches.
    AnyOf(Vec<Selector>),
    /// Phrases searched anywhere in the document. Empty never matches.
    Keywords(Vec<String>),
}

/// The `detection:` block of a rule.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Detection {
    /// Raw condition text, parsed at compile time.
    pub condition: String,
    pub selectors: HashMap<String, Selector>,
}

impl Detection {
    pub fn selector(&self, name: &str) -> Option<&Selector> {
        self.selectors.get(name)
    }
}

// =============================================================================
// Rule
// =============================================================================

/// A reference to a related rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Related {
    pub id: String,
    #[serde(rename = "type")]
    pub relation_type: RelationType,
}

/// A complete omega rule.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rule {
    pub title: String,
    pub detection: Detection,

    pub id: Option<String>,
    pub status: Option<Status>,
    pub level: Option<Level>,
    pub description: Option<String>,
    pub references: Vec<String>,
    pub author: Option<String>,
    pub date: Option<String>,
    pub modified: Option<String>,
    pub tags: Vec<String>,
    pub falsepositives: Vec<String>,
    pub related: Vec<Related>,
    pub fields: Vec<String>,
}
