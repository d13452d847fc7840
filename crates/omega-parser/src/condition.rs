//! Condition expression parser using a pest PEG grammar and a Pratt parser.
//!
//! Parses condition strings like:
//! - `"selection"`
//! - `"selection and not filter"`
//! - `"(new_account or no_avatar) and suspicious_name"`
//!
//! `not` binds tightest and applies to a single atom, then `and`, then `or`.
//! Keywords are lowercase only, and fullwidth `（ ）` and square brackets
//! are accepted as parentheses.

use std::sync::LazyLock;

use pest::Parser;
use pest::iterators::Pair;
use pest::pratt_parser::{Assoc, Op, PrattParser};
use pest_derive::Parser;

use crate::ast::Query;
use crate::error::{OmegaParserError, Result};

// ---------------------------------------------------------------------------
// Pest parser (generated from omega.pest grammar)
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[grammar = "src/omega.pest"]
struct ConditionParser;

/// Most `and`/`or`/`not` operators a condition may contain. Every operator
/// adds one level to the query tree, and the tree is walked recursively.
pub const MAX_CONDITION_OPERATORS: usize = 1_000;

static PRATT: LazyLock<PrattParser<Rule>> = LazyLock::new(|| {
    PrattParser::new()
        .op(Op::infix(Rule::or_op, Assoc::Left))
        .op(Op::infix(Rule::and_op, Assoc::Left))
        .op(Op::prefix(Rule::not_op))
});

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Parse a condition expression string into a [`Query`].
///
/// # Examples
///
/// ```
/// use omega_parser::{Query, parse_condition};
///
/// let query = parse_condition("a and not b").unwrap();
/// assert_eq!(query, Query::and(Query::term("a"), Query::not(Query::term("b"))));
/// ```
pub fn parse_condition(input: &str) -> Result<Query> {
    let mut pairs = ConditionParser::parse(Rule::condition, input)
        .map_err(|e| OmegaParserError::Condition(e.to_string()))?;

    // condition = { SOI ~ expr ~ EOI }
    let expr_pair = pairs
        .next()
        .and_then(|condition| condition.into_inner().find(|p| p.as_rule() == Rule::expr))
        .ok_or_else(|| OmegaParserError::Condition(format!("empty condition '{input}'")))?;

    let operators = expr_pair
        .clone()
        .into_inner()
        .flatten()
        .filter(|p| matches!(p.as_rule(), Rule::and_op | Rule::or_op | Rule::not_op))
        .count();
    if operators > MAX_CONDITION_OPERATORS {
        return Err(OmegaParserError::Condition(format!(
            "condition has {operators} operators, the limit is {MAX_CONDITION_OPERATORS}"
        )));
    }

    Ok(parse_expr(expr_pair, &PRATT))
}

// ---------------------------------------------------------------------------
// Internal parsing helpers
// ---------------------------------------------------------------------------

fn parse_expr(pair: Pair<'_, Rule>, pratt: &PrattParser<Rule>) -> Query {
    pratt
        .map_primary(|primary| match primary.as_rule() {
            Rule::term => Query::Term(primary.as_str().to_string()),
            Rule::expr => parse_expr(primary, pratt),
            other => unreachable!("unexpected primary rule: {other:?}"),
        })
        .map_prefix(|op, rhs| match op.as_rule() {
            Rule::not_op => Query::not(rhs),
            other => unreachable!("unexpected prefix rule: {other:?}"),
        })
        .map_infix(|lhs, op, rhs| match op.as_rule() {
            Rule::and_op => Query::and(lhs, rhs),
            Rule::or_op => Query::or(lhs, rhs),
            other => unreachable!("unexpected infix rule: {other:?}"),
        })
        .parse(pair.into_inner())
}

// =============================================================================
// Tests
// =============================================================================
