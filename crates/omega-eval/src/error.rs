//! Evaluation-specific error types.

use thiserror::Error;

/// Errors that can occur while compiling a rule for evaluation.
///
/// Matching itself never fails: malformed patterns, dates and snowflakes
/// compile to matchers that never match.
#[derive(Debug, Error)]
pub enum EvalError {
    /// The condition failed to parse.
    #[error("parser error: {0}")]
    Parser(#[from] omega_parser::OmegaParserError),

    /// A term in the condition names no selector in the detection block.
    #[error("unknown selector in condition: {0}")]
    UnknownSelector(String),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, EvalError>;
