//! Field keys: `basekey(.subkey)*(|modifier)*`.
//!
//! A key such as `user.created_at|date|before` is split once at load time into
//! the dotted path (`["user"]`), the field name (`created_at`) and a typed
//! [`Modifier`]. Anything the matchers cannot interpret becomes
//! [`Modifier::Invalid`], which never matches.

use std::fmt;

use serde::{Serialize, Serializer};

/// Numeric comparison operators (`gt`/`>`, `gte`/`>=`, `lt`/`<`, `lte`/`<=`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Comparison {
    Gt,
    Gte,
    Lt,
    Lte,
}

impl Comparison {
    fn from_modifier(s: &str) -> Option<Self> {
        match s {
            "gt" | ">" => Some(Comparison::Gt),
            "gte" | ">=" => Some(Comparison::Gte),
            "lt" | "<" => Some(Comparison::Lt),
            "lte" | "<=" => Some(Comparison::Lte),
            _ => None,
        }
    }

    /// `doc <op> rule`.
    pub fn holds(&self, doc: f64, rule: f64) -> bool {
        match self {
            Comparison::Gt => doc > rule,
            Comparison::Gte => doc >= rule,
            Comparison::Lt => doc < rule,
            Comparison::Lte => doc <= rule,
        }
    }
}

/// How a document instant is compared to the rule instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DateOp {
    /// Same instant, millisecond resolution.
    Equal,
    Before,
    After,
    /// Same UTC calendar day.
    SameDay,
}

impl DateOp {
    fn from_modifier(s: Option<&str>) -> Option<Self> {
        match s {
            None => Some(DateOp::Equal),
            Some("before") => Some(DateOp::Before),
            Some("after") => Some(DateOp::After),
            Some("sameday") => Some(DateOp::SameDay),
            Some(_) => None,
        }
    }
}

/// Base epoch added to the timestamp bits of a snowflake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Epoch {
    Unix,
    Discord,
    Twitter,
    Millis(i64),
}

impl Epoch {
    pub const DISCORD_MILLIS: i64 = 1_420_070_400_000;
    pub const TWITTER_MILLIS: i64 = 1_288_834_974_657;

    fn from_argument(arg: &str) -> Option<Self> {
        match arg {
            "" => Some(Epoch::Unix),
            "discord" => Some(Epoch::Discord),
            "twitter" | "x" => Some(Epoch::Twitter),
            other => other.parse().ok().map(Epoch::Millis),
        }
    }

    pub fn offset_millis(&self) -> i64 {
        match self {
            Epoch::Unix => 0,
            Epoch::Discord => Self::DISCORD_MILLIS,
            Epoch::Twitter => Self::TWITTER_MILLIS,
            Epoch::Millis(ms) => *ms,
        }
    }
}

/// The operator encoded in the pipe segments of a field key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Modifier {
    /// Plain equality for numbers and booleans, anchored glob for strings.
    None,
    Compare(Comparison),
    Contains,
    StartsWith,
    EndsWith,
    Re,
    Date(DateOp),
    Snowflake { epoch: Epoch, op: DateOp },
    /// Unrecognised or malformed modifier chain, kept verbatim.
    Invalid(String),
}

impl Modifier {
    /// Parse the pipe segments that follow the field name.
    pub fn from_segments(segments: &[&str]) -> Self {
        let Some((&first, rest)) = segments.split_first() else {
            return Modifier::None;
        };
        let invalid = || Modifier::Invalid(segments.join("|"));

        if first == "date" {
            return match (rest.len(), DateOp::from_modifier(rest.first().copied())) {
                (0 | 1, Some(op)) => Modifier::Date(op),
                _ => invalid(),
            };
        }

        if let Some(arg) = snowflake_argument(first) {
            let epoch = Epoch::from_argument(arg);
            let op = DateOp::from_modifier(rest.first().copied());
            return match (rest.len(), epoch, op) {
                (0 | 1, Some(epoch), Some(op)) => Modifier::Snowflake { epoch, op },
                _ => invalid(),
            };
        }

        if !rest.is_empty() {
            return invalid();
        }

        match first {
            "contains" => Modifier::Contains,
            "startswith" => Modifier::StartsWith,
            "endswith" => Modifier::EndsWith,
            "re" => Modifier::Re,
            other => Comparison::from_modifier(other)
                .map(Modifier::Compare)
                .unwrap_or_else(invalid),
        }
    }
}

/// `snowflake` -> `Some("")`, `snowflake(discord)` -> `Some("discord")`.
fn snowflake_argument(segment: &str) -> Option<&str> {
    let rest = segment.strip_prefix("snowflake")?;
    if rest.is_empty() {
        return Some("");
    }
    rest.strip_prefix('(')?.strip_suffix(')')
}

/// A parsed field key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldKey {
    /// The key exactly as written in the rule.
    pub raw: String,
    /// Dot segments leading to the field's parent structure.
    pub path: Vec<String>,
    /// The field name looked up in the parent structure.
    pub base: String,
    pub modifier: Modifier,
}

impl FieldKey {
    pub fn parse(raw: &str) -> Self {
        let (name, modifiers) = match raw.split_once('|') {
            Some((name, modifiers)) => (name, Some(modifiers)),
            None => (raw, None),
        };

        let mut path: Vec<String> = name.split('.').map(str::to_string).collect();
        let base = path.pop().unwrap_or_default();

        let segments: Vec<&str> = modifiers
            .map(|m| m.split('|').collect())
            .unwrap_or_default();

        FieldKey {
            raw: raw.to_string(),
            path,
            base,
            modifier: Modifier::from_segments(&segments),
        }
    }
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl Serialize for FieldKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_key() {
        let key = FieldKey::parse("username");
        assert!(key.path.is_empty());
        assert_eq!(key.base, "username");
        assert_eq!(key.modifier, Modifier::None);
    }

    #[test]
    fn test_nested_key_with_modifier() {
        let key = FieldKey::parse("user.profile.created_at|date|before");
        assert_eq!(key.path, vec!["user", "profile"]);
        assert_eq!(key.base, "created_at");
        assert_eq!(key.modifier, Modifier::Date(DateOp::Before));
    }

    #[test]
    fn test_comparison_aliases() {
        assert_eq!(
            FieldKey::parse("n|gte").modifier,
            Modifier::Compare(Comparison::Gte)
        );
        assert_eq!(
            FieldKey::parse("n|>=").modifier,
            Modifier::Compare(Comparison::Gte)
        );
        assert_eq!(
            FieldKey::parse("n|<").modifier,
            Modifier::Compare(Comparison::Lt)
        );
    }

    #[test]
    fn test_snowflake_epochs() {
        let cases = [
            ("id|snowflake", Epoch::Unix),
            ("id|snowflake()", Epoch::Unix),
            ("id|snowflake(discord)", Epoch::Discord),
            ("id|snowflake(twitter)", Epoch::Twitter),
            ("id|snowflake(x)", Epoch::Twitter),
            ("id|snowflake(1000)", Epoch::Millis(1000)),
        ];
        for (raw, epoch) in cases {
            assert_eq!(
                FieldKey::parse(raw).modifier,
                Modifier::Snowflake {
                    epoch,
                    op: DateOp::Equal
                },
                "{raw}"
            );
        }
        assert_eq!(
            FieldKey::parse("id|snowflake(discord)|sameday").modifier,
            Modifier::Snowflake {
                epoch: Epoch::Discord,
                op: DateOp::SameDay
            }
        );
    }

    #[test]
    fn test_malformed_modifiers_are_invalid() {
        for raw in [
            "id|snowflake(mars)",
            "id|snowflake(discord",
            "id|date|tomorrow",
            "id|date|before|after",
            "id|contains|all",
            "id|between",
            "id|CONTAINS",
        ] {
            assert!(
                matches!(FieldKey::parse(raw).modifier, Modifier::Invalid(_)),
                "{raw}"
            );
        }
    }

    #[test]
    fn test_modifier_segments_do_not_split_on_dots() {
        let key = FieldKey::parse("a.b|snowflake(1.5)");
        assert_eq!(key.path, vec!["a"]);
        assert_eq!(key.base, "b");
        assert!(matches!(key.modifier, Modifier::Invalid(_)));
    }
}
