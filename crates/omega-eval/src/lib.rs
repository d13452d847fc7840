//! # omega-eval
//!
//! Evaluator for omega detection rules.
//!
//! This crate consumes the rules produced by [`omega_parser`] and evaluates
//! them against structured documents using a compile-then-evaluate model:
//!
//! - **Documents** are [`Value`] trees, usually converted from JSON.
//! - **Matchers** are compiled once per field condition. Globs and regexes run
//!   on the linear-time `regex` engine; malformed patterns, dates and
//!   snowflakes compile to matchers that never match.
//! - **Evaluation** walks the parsed condition, evaluating each selector at
//!   most once per document.
//!
//! ## Quick Start
//!
//! ```rust
//! use omega_parser::parse_rule_yaml;
//! use omega_eval::{Value, evaluate};
//! use serde_json::json;
//!
//! let rule = parse_rule_yaml(r#"
//! title: Fresh account with default avatar
//! detection:
//!     fresh:
//!         user.created_at|date|after: '2024/01/01'
//!     no_avatar:
//!         user.has_avatar: false
//!     condition: fresh and no_avatar
//! "#).unwrap();
//!
//! let doc = Value::from(json!({
//!     "user": {"created_at": "2024-03-05T10:00:00Z", "has_avatar": false}
//! }));
//! let result = evaluate(&doc, &rule).unwrap();
//! assert!(result.matches);
//! assert_eq!(result.matched_selectors, vec!["fresh", "no_avatar"]);
//! ```

pub mod compiler;
pub mod document;
pub mod engine;
pub mod error;
pub mod matcher;
pub mod result;

pub use compiler::{
    CompiledField, CompiledRule, CompiledSelector, compile_rule, evaluate, evaluate_compiled,
    evaluate_field,
};
pub use document::Value;
pub use engine::Engine;
pub use error::{EvalError, Result};
pub use matcher::{Matcher, match_date, match_number, match_snowflake, match_string};
pub use result::{Evaluation, MatchResult};
