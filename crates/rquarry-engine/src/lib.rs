//! # rquarry-engine
//!
//! The evaluation engine for rquarry detection rules.
//!
//! This crate consumes the rule model produced by [`rquarry_rules`] and
//! decides, per rule and per byte buffer, whether the buffer is flagged,
//! using a compile-then-evaluate model:
//!
//! - **Pattern compiler**: literals become `memmem` finders, regexes
//!   become byte-oriented automata; condition references, quantifier
//!   bounds, and size units are resolved and validated once.
//! - **Scanner**: every compiled pattern is run over the whole buffer;
//!   occurrence counts and offsets are recorded per identifier.
//!   Literal counts include overlapping occurrences; regex counts are
//!   leftmost-first non-overlapping.
//! - **Condition evaluator**: pure boolean evaluation over scan results
//!   and the caller-reported file size, with short-circuiting `and`/`or`
//!   and `N of (set)` quantifiers.
//! - **Registry**: holds the immutable compiled rules and produces one
//!   [`Verdict`] per rule in load order, optionally in parallel or under
//!   a per-rule wall-clock timeout.
//!
//! ## Quick Start
//!
//! ```rust
//! use rquarry_engine::Registry;
//!
//! // The built-in rule set: malicious JavaScript, malicious PDF, EICAR.
//! let registry = Registry::builtin().unwrap();
//!
//! let buffer = b"eval(unescape('%68%69'))";
//! let verdicts = registry.evaluate_all(buffer, buffer.len() as u64);
//!
//! let js = verdicts
//!     .iter()
//!     .find(|v| v.rule_name == "suspicious_js_obfuscation")
//!     .unwrap();
//! assert!(js.flagged);
//! ```

pub mod compiler;
pub mod engine;
pub mod error;
pub mod matcher;
pub mod result;
pub mod scanner;

// Re-export the most commonly used types and functions at crate root
pub use compiler::{
    CompileOptions, CompiledCondition, CompiledRule, compile_rule, eval_condition, evaluate_rule,
};
pub use engine::Registry;
pub use error::{CompileError, CompileResult, EvalError, LoadError};
pub use matcher::{CompiledMatcher, CompiledPattern};
pub use result::Verdict;
pub use scanner::{Deadline, PatternHits, ScanResults, scan, scan_with_deadline};
