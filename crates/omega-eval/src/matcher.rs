//! Compiled matchers for field conditions.
//!
//! A [`Matcher`] is built once per field condition from its [`Modifier`] and
//! [`RuleValue`], and then tested against document values. Glob patterns and
//! regexes are compiled with the `regex` crate, which matches in linear time.
//! Anything that cannot be compiled (bad regex, unparsable date, unsupported
//! modifier for the value type) becomes [`Matcher::Never`].
//!
//! A matcher only matches a document value of the type it was built for:
//! numbers against numbers, booleans against booleans, strings against
//! strings, and date-like rule strings against strings or native dates.
//! Snowflake ids may also be whole numbers.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;

use omega_parser::{Comparison, DateOp, Epoch, FieldKey, Modifier, RuleValue};

use crate::document::Value;

/// A compiled value predicate.
#[derive(Debug, Clone)]
pub enum Matcher {
    /// Matches nothing.
    Never,
    Bool(bool),
    /// Equality when `cmp` is `None`.
    Number { cmp: Option<Comparison>, value: f64 },
    /// Anchored case-insensitive regex against strings. A plain rule string
    /// that reads as a date also matches native dates at the same instant.
    Text {
        regex: Regex,
        instant: Option<DateTime<FixedOffset>>,
    },
    /// Date comparison against date strings and native dates.
    Date {
        op: DateOp,
        instant: DateTime<FixedOffset>,
    },
    /// Date comparison against the timestamp embedded in a snowflake string.
    Snowflake {
        epoch: Epoch,
        op: DateOp,
        instant: DateTime<FixedOffset>,
    },
    /// A list of rule values: any may match.
    AnyOf(Vec<Matcher>),
}

impl Matcher {
    /// Build the matcher for one rule value under `modifier`.
    pub fn compile(modifier: &Modifier, value: &RuleValue) -> Matcher {
        match value {
            RuleValue::Null => Matcher::Never,
            RuleValue::List(items) => {
                Matcher::AnyOf(items.iter().map(|v| Matcher::compile(modifier, v)).collect())
            }
            RuleValue::Bool(b) => Matcher::Bool(*b),
            RuleValue::Number(n) => match modifier {
                Modifier::None => Matcher::Number {
                    cmp: None,
                    value: *n,
                },
                Modifier::Compare(cmp) => Matcher::Number {
                    cmp: Some(*cmp),
                    value: *n,
                },
                other => {
                    log::debug!("modifier {other:?} does not apply to number {n}");
                    Matcher::Never
                }
            },
            RuleValue::String(s) => compile_string(modifier, s),
        }
    }

    /// Test a document value.
    pub fn matches(&self, value: &Value) -> bool {
        match (self, value) {
            (Matcher::AnyOf(matchers), _) => matchers.iter().any(|m| m.matches(value)),
            (Matcher::Bool(expected), Value::Bool(actual)) => expected == actual,
            (Matcher::Number { cmp, value: rule }, Value::Number(doc)) => match cmp {
                None => doc == rule,
                Some(cmp) => cmp.holds(*doc, *rule),
            },
            (Matcher::Text { regex, .. }, Value::String(s)) => regex.is_match(s),
            (
                Matcher::Text {
                    instant: Some(rule),
                    ..
                },
                Value::Date(doc),
            ) => compare_instants(DateOp::Equal, doc, rule),
            (Matcher::Date { op, instant }, Value::String(s)) => {
                parse_instant(s).is_some_and(|doc| compare_instants(*op, &doc, instant))
            }
            (Matcher::Date { op, instant }, Value::Date(doc)) => {
                compare_instants(*op, doc, instant)
            }
            (Matcher::Snowflake { epoch, op, instant }, Value::String(s)) => {
                snowflake_instant(s, *epoch)
                    .is_some_and(|doc| compare_instants(*op, &doc, instant))
            }
            (Matcher::Snowflake { epoch, op, instant }, Value::Number(n)) => {
                integral_id(*n)
                    .and_then(|id| snowflake_from_id(id, *epoch))
                    .is_some_and(|doc| compare_instants(*op, &doc, instant))
            }
            _ => false,
        }
    }
}

fn compile_string(modifier: &Modifier, s: &str) -> Matcher {
    let pattern = match modifier {
        Modifier::None => glob_to_regex(s),
        Modifier::Contains => format!(".*{}.*", glob_to_regex(s)),
        Modifier::StartsWith => format!("{}.*", glob_to_regex(s)),
        Modifier::EndsWith => format!(".*{}", glob_to_regex(s)),
        Modifier::Re => {
            // Validate alone first so the pattern cannot escape the anchor group.
            if let Err(e) = Regex::new(s) {
                log::debug!("invalid regex {s:?}: {e}");
                return Matcher::Never;
            }
            return build_regex("(?i)", s)
                .map(|regex| Matcher::Text {
                    regex,
                    instant: None,
                })
                .unwrap_or(Matcher::Never);
        }
        Modifier::Date(op) => {
            return match parse_instant(s) {
                Some(instant) => Matcher::Date { op: *op, instant },
                None => {
                    log::debug!("unparsable rule date {s:?}");
                    Matcher::Never
                }
            };
        }
        Modifier::Snowflake { epoch, op } => {
            return match parse_instant(s) {
                Some(instant) => Matcher::Snowflake {
                    epoch: *epoch,
                    op: *op,
                    instant,
                },
                None => {
                    log::debug!("unparsable rule date {s:?}");
                    Matcher::Never
                }
            };
        }
        Modifier::Compare(_) | Modifier::Invalid(_) => {
            log::debug!("modifier {modifier:?} does not apply to string {s:?}");
            return Matcher::Never;
        }
    };

    let instant = match modifier {
        Modifier::None => parse_instant(s),
        _ => None,
    };
    build_regex("(?is)", &pattern)
        .map(|regex| Matcher::Text { regex, instant })
        .unwrap_or(Matcher::Never)
}

fn build_regex(flags: &str, pattern: &str) -> Option<Regex> {
    match Regex::new(&format!("{flags}^(?:{pattern})$")) {
        Ok(regex) => Some(regex),
        Err(e) => {
            log::debug!("pattern {pattern:?} failed to compile: {e}");
            None
        }
    }
}

/// Translate a glob to regex syntax: `*` is any run of characters, `?` is
/// exactly one character, everything else is literal.
pub fn glob_to_regex(glob: &str) -> String {
    let mut out = String::with_capacity(glob.len() + 8);
    let mut literal = String::new();
    for ch in glob.chars() {
        match ch {
            '*' | '?' => {
                out.push_str(&regex::escape(&literal));
                literal.clear();
                out.push_str(if ch == '*' { ".*" } else { "." });
            }
            c => literal.push(c),
        }
    }
    out.push_str(&regex::escape(&literal));
    out
}

// =============================================================================
// Dates and snowflakes
// =============================================================================

/// Parse a `YYYY/MM/DD` day (UTC midnight) or an ISO-8601 timestamp.
///
/// Timestamps without an offset are taken as UTC.
pub fn parse_instant(s: &str) -> Option<DateTime<FixedOffset>> {
    let s = s.trim();
    let utc = |naive: NaiveDateTime| naive.and_utc().fixed_offset();

    if let Ok(day) = NaiveDate::parse_from_str(s, "%Y/%m/%d") {
        return day.and_hms_opt(0, 0, 0).map(utc);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt);
    }
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Some(dt);
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(utc(naive));
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|day| day.and_hms_opt(0, 0, 0))
        .map(utc)
}

/// Creation instant of a snowflake: `(id >> 22) + epoch` milliseconds.
pub fn snowflake_instant(id: &str, epoch: Epoch) -> Option<DateTime<FixedOffset>> {
    snowflake_from_id(id.trim().parse().ok()?, epoch)
}

fn snowflake_from_id(id: u64, epoch: Epoch) -> Option<DateTime<FixedOffset>> {
    let millis = ((id >> 22) as i64).checked_add(epoch.offset_millis())?;
    DateTime::<Utc>::from_timestamp_millis(millis).map(|d| d.fixed_offset())
}

/// Numeric ids only count when exactly representable.
fn integral_id(n: f64) -> Option<u64> {
    const MAX_EXACT: f64 = 9_007_199_254_740_992.0;
    (n.fract() == 0.0 && (0.0..=MAX_EXACT).contains(&n)).then_some(n as u64)
}

/// `doc <op> rule` at millisecond resolution; `SameDay` compares UTC dates.
pub fn compare_instants(
    op: DateOp,
    doc: &DateTime<FixedOffset>,
    rule: &DateTime<FixedOffset>,
) -> bool {
    match op {
        DateOp::Equal => doc.timestamp_millis() == rule.timestamp_millis(),
        DateOp::Before => doc.timestamp_millis() < rule.timestamp_millis(),
        DateOp::After => doc.timestamp_millis() > rule.timestamp_millis(),
        DateOp::SameDay => {
            doc.with_timezone(&Utc).date_naive() == rule.with_timezone(&Utc).date_naive()
        }
    }
}

// =============================================================================
// Primitive entry points
// =============================================================================

/// Match a document number against a rule number under `key`'s modifier.
pub fn match_number(key: &str, rule: f64, doc: f64) -> bool {
    Matcher::compile(&FieldKey::parse(key).modifier, &RuleValue::Number(rule))
        .matches(&Value::Number(doc))
}

/// Match a document string against a rule string under `key`'s modifier.
pub fn match_string(key: &str, rule: &str, doc: &str) -> bool {
    Matcher::compile(&FieldKey::parse(key).modifier, &RuleValue::from(rule))
        .matches(&Value::from(doc))
}

/// Match a document date (native or string) against a rule date.
///
/// The comparison comes from a `date` modifier; a key without one compares
/// for equality.
pub fn match_date(key: &str, rule: &str, doc: &Value) -> bool {
    let op = match FieldKey::parse(key).modifier {
        Modifier::Date(op) => op,
        Modifier::None => DateOp::Equal,
        _ => return false,
    };
    Matcher::compile(&Modifier::Date(op), &RuleValue::from(rule)).matches(doc)
}

/// Match a document snowflake against a rule date. `key` must carry a
/// `snowflake` modifier.
pub fn match_snowflake(key: &str, rule: &str, doc: &str) -> bool {
    let modifier = FieldKey::parse(key).modifier;
    matches!(modifier, Modifier::Snowflake { .. })
        && Matcher::compile(&modifier, &RuleValue::from(rule)).matches(&Value::from(doc))
}

// =============================================================================
// Tests
// =============================================================================


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    // -------------------------------------------------------------------------
    // Literal globs are case-insensitive equality
    // -------------------------------------------------------------------------
    proptest! {
        #[test]
        fn literal_glob_is_case_insensitive_equality(
            rule in "[a-zA-Z0-9 .+()\\[\\]^$|{}-]{0,12}",
            doc in "[a-zA-Z0-9 .+()-]{0,12}",
        ) {
            prop_assert!(match_string("k", &rule, &rule.to_uppercase()));
            prop_assert!(match_string("k", &rule, &rule.to_lowercase()));
            prop_assert_eq!(
                match_string("k", &rule, &doc),
                rule.to_lowercase() == doc.to_lowercase()
            );
        }
    }

    // -------------------------------------------------------------------------
    // Comparison modifiers agree with the f64 operators
    // -------------------------------------------------------------------------
    proptest! {
        #[test]
        fn comparisons_agree_with_operators(rule in -1e9f64..1e9, doc in -1e9f64..1e9) {
            prop_assert_eq!(match_number("n", rule, doc), doc == rule);
            prop_assert_eq!(match_number("n|gt", rule, doc), doc > rule);
            prop_assert_eq!(match_number("n|>=", rule, doc), doc >= rule);
            prop_assert_eq!(match_number("n|lt", rule, doc), doc < rule);
            prop_assert_eq!(match_number("n|<=", rule, doc), doc <= rule);
        }
    }

    // -------------------------------------------------------------------------
    // contains agrees with substring search for literal patterns
    // -------------------------------------------------------------------------
    proptest! {
        #[test]
        fn contains_agrees_with_substring(needle in "[a-z]{1,4}", hay in "[a-z\\n]{0,16}") {
            prop_assert_eq!(
                match_string("k|contains", &needle, &hay),
                hay.contains(needle.as_str())
            );
        }
    }
}
