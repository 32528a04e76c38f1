//! Engine error taxonomy: compile, load, and evaluation failures.

use std::time::Duration;

use thiserror::Error;

/// Errors compiling a single rule.
///
/// Fatal for that rule only: the registry records the failure against
/// the rule's name and continues loading the others.
#[derive(Debug, Error)]
pub enum CompileError {
    /// A pattern failed to compile (malformed regex, empty literal).
    #[error("rule `{rule}`: invalid pattern `${id}`: {reason}")]
    InvalidPattern {
        rule: String,
        id: String,
        reason: String,
    },

    /// Two patterns in one rule share an identifier.
    #[error("rule `{rule}`: duplicate pattern identifier `${id}`")]
    DuplicateIdentifier { rule: String, id: String },

    /// The condition references an identifier the rule does not declare.
    #[error("rule `{rule}`: condition references undeclared pattern `${id}`")]
    UnknownPattern { rule: String, id: String },

    /// An `of` quantifier falls outside `1 <= k <= |set|`.
    #[error("rule `{rule}`: quantifier requires {wanted} of a {available}-pattern set")]
    InvalidQuantifier {
        rule: String,
        wanted: u64,
        available: usize,
    },
}

/// Errors constructing a registry. No partial registry is returned.
#[derive(Debug, Error)]
pub enum LoadError {
    /// Two rules share a name.
    #[error("duplicate rule name `{0}`")]
    DuplicateRuleName(String),
}

/// Errors during rule evaluation.
#[derive(Debug, Error)]
pub enum EvalError {
    /// The per-rule scan deadline expired. The verdict for the rule is
    /// inconclusive, not a flag; other rules are unaffected.
    #[error("rule `{rule}`: scan exceeded {timeout:?}")]
    Timeout { rule: String, timeout: Duration },

    /// A condition referenced a pattern with no scan entry. This cannot
    /// happen for registry-compiled rules — compile-time reference
    /// validation plus the scanner's zero-count seeding cover every
    /// identifier — so it indicates a construction defect, not a
    /// runtime condition.
    #[error("rule `{rule}`: pattern `${pattern}` missing from scan results")]
    UnreachableState { rule: String, pattern: String },
}

/// Result alias for compilation.
pub type CompileResult<T> = std::result::Result<T, CompileError>;
