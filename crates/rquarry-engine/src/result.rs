//! Verdict types for rule evaluation.

use serde::Serialize;

/// The per-rule, per-buffer outcome.
///
/// Carries the evidence a report generator needs to explain why a rule
/// fired: every pattern identifier that occurred in the buffer, in
/// declaration order. Produced once per (rule, buffer) evaluation and
/// handed to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Verdict {
    /// Name of the evaluated rule.
    pub rule_name: String,
    /// Whether the rule's condition held for the buffer.
    pub flagged: bool,
    /// Identifiers of patterns that occurred at least once.
    pub matched_patterns: Vec<String>,
}
