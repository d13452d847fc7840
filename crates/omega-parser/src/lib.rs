//! # omega-parser
//!
//! Parser and validator for omega detection rules.
//!
//! An omega rule is a YAML document with metadata and a `detection` block of
//! named selectors, combined by a boolean `condition`. This crate handles:
//!
//! - **Condition expressions**: `and`, `or`, `not` and parenthesised groups,
//!   parsed into a [`Query`] tree
//! - **Field keys**: dotted paths with pipe modifiers such as
//!   `user.created_at|date|before` or `id|snowflake(discord)|after`
//! - **Rules**: YAML into a typed [`Rule`], single files or whole directories
//!   keyed by file name ([`RuleSet`])
//! - **Validation**: required fields, condition parseability, selector
//!   cross-references and metadata hygiene ([`validate_rule`])
//!
//! ## Quick Start
//!
//! ```rust
//! use omega_parser::{parse_rule_yaml, validate_rule_str};
//!
//! let yaml = r#"
//! title: Nitro scam name
//! level: medium
//! detection:
//!     name:
//!         username|contains: 'free nitro'
//!     condition: name
//! "#;
//!
//! assert!(validate_rule_str(yaml).is_valid());
//! let rule = parse_rule_yaml(yaml).unwrap();
//! assert_eq!(rule.title, "Nitro scam name");
//! ```

pub mod ast;
pub mod condition;
pub mod error;
pub mod field;
pub mod parser;
pub mod validate;

pub use ast::{
    Detection, FieldCondition, FieldMap, Level, Query, Related, RelationType, Rule, RuleValue,
    Selector, Status,
};
pub use condition::{MAX_CONDITION_OPERATORS, parse_condition};
pub use error::{OmegaParserError, Result};
pub use field::{Comparison, DateOp, Epoch, FieldKey, Modifier};
pub use parser::{
    RuleSet, load_rules, parse_rule_directory, parse_rule_file, parse_rule_value, parse_rule_yaml,
};
pub use validate::{
    FileValidation, ValidationError, ValidationResult, validate_rule, validate_rule_directory,
    validate_rule_file, validate_rule_str,
};
