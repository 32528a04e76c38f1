//! Compile rule definitions into executable form, and evaluate compiled
//! conditions against scan results.
//!
//! The compiler transforms the rule model (`RuleDef`, `PatternDef`,
//! `ConditionExpr`) into compiled forms (`CompiledRule`,
//! `CompiledPattern`, `CompiledCondition`): patterns become byte
//! matchers, `them` expands to the declared identifier list, quantifiers
//! are bounds-checked against their sets, condition references are
//! validated against the declared patterns, and size literals resolve to
//! raw byte counts under the configured unit basis.
//!
//! Compilation is deterministic and idempotent: the same definition
//! always produces a structurally identical compiled rule.

use memchr::memmem;
use regex::bytes::Regex;

use rquarry_rules::{
    CompareOp, ConditionExpr, MetaValue, PatternDef, PatternKind, PatternSet, Quantifier,
    RuleDef, UnitBasis,
};

use crate::error::{CompileError, CompileResult, EvalError};
use crate::matcher::{CompiledMatcher, CompiledPattern};
use crate::result::Verdict;
use crate::scanner::ScanResults;

// =============================================================================
// Compiled types
// =============================================================================

/// Options governing rule compilation.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompileOptions {
    /// Unit convention for `filesize` literals. Binary (1024-based)
    /// by default: `500KB` = 512000 bytes.
    pub unit_basis: UnitBasis,
}

/// A compiled rule, ready for evaluation. Immutable after compilation.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub name: String,
    pub meta: Vec<(String, MetaValue)>,
    /// Compiled patterns in declaration order.
    pub patterns: Vec<CompiledPattern>,
    pub condition: CompiledCondition,
    /// The raw condition text, kept for reporting.
    pub condition_string: String,
}

/// A condition tree with all compile-time resolution applied: size
/// thresholds are raw byte counts and quantified sets are explicit
/// identifier lists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompiledCondition {
    And(Vec<CompiledCondition>),
    Or(Vec<CompiledCondition>),
    Not(Box<CompiledCondition>),
    /// Pattern presence: occurrence count > 0.
    Pattern(String),
    /// File-size predicate with the threshold resolved to bytes.
    Size { op: CompareOp, bytes: u64 },
    /// At least `min_count` members of `set` present.
    Of { min_count: u64, set: Vec<String> },
}

// =============================================================================
// Compilation
// =============================================================================

/// Compile a rule definition into a [`CompiledRule`].
pub fn compile_rule(def: &RuleDef, options: &CompileOptions) -> CompileResult<CompiledRule> {
    // Duplicate identifiers first: a duplicate would make every
    // condition reference to that identifier ambiguous.
    for (i, p) in def.patterns.iter().enumerate() {
        if def.patterns[..i].iter().any(|q| q.id == p.id) {
            return Err(CompileError::DuplicateIdentifier {
                rule: def.name.clone(),
                id: p.id.clone(),
            });
        }
    }

    let patterns = def
        .patterns
        .iter()
        .map(|p| compile_pattern(&def.name, p))
        .collect::<CompileResult<Vec<_>>>()?;

    let declared: Vec<&str> = def.patterns.iter().map(|p| p.id.as_str()).collect();
    let condition = compile_condition(&def.name, &def.condition, &declared, options)?;

    Ok(CompiledRule {
        name: def.name.clone(),
        meta: def.meta.clone(),
        patterns,
        condition,
        condition_string: def.condition_string.clone(),
    })
}

fn compile_pattern(rule: &str, def: &PatternDef) -> CompileResult<CompiledPattern> {
    let matcher = match &def.kind {
        PatternKind::Literal { value, nocase } => {
            if value.is_empty() {
                return Err(CompileError::InvalidPattern {
                    rule: rule.to_string(),
                    id: def.id.clone(),
                    reason: "empty literal".to_string(),
                });
            }
            if *nocase {
                CompiledMatcher::LiteralNoCase(value.clone().into_bytes())
            } else {
                CompiledMatcher::Literal(memmem::Finder::new(value.as_bytes()).into_owned())
            }
        }
        PatternKind::Regex { pattern } => {
            let regex = Regex::new(pattern).map_err(|e| CompileError::InvalidPattern {
                rule: rule.to_string(),
                id: def.id.clone(),
                reason: e.to_string(),
            })?;
            CompiledMatcher::Regex(regex)
        }
    };
    Ok(CompiledPattern {
        id: def.id.clone(),
        matcher,
    })
}

fn compile_condition(
    rule: &str,
    expr: &ConditionExpr,
    declared: &[&str],
    options: &CompileOptions,
) -> CompileResult<CompiledCondition> {
    match expr {
        ConditionExpr::And(args) => {
            let compiled = args
                .iter()
                .map(|a| compile_condition(rule, a, declared, options))
                .collect::<CompileResult<Vec<_>>>()?;
            Ok(CompiledCondition::And(compiled))
        }
        ConditionExpr::Or(args) => {
            let compiled = args
                .iter()
                .map(|a| compile_condition(rule, a, declared, options))
                .collect::<CompileResult<Vec<_>>>()?;
            Ok(CompiledCondition::Or(compiled))
        }
        ConditionExpr::Not(inner) => Ok(CompiledCondition::Not(Box::new(compile_condition(
            rule, inner, declared, options,
        )?))),
        ConditionExpr::Pattern(id) => {
            if !declared.contains(&id.as_str()) {
                return Err(CompileError::UnknownPattern {
                    rule: rule.to_string(),
                    id: id.clone(),
                });
            }
            Ok(CompiledCondition::Pattern(id.clone()))
        }
        ConditionExpr::Size { op, size } => Ok(CompiledCondition::Size {
            op: *op,
            bytes: size.resolve(options.unit_basis),
        }),
        ConditionExpr::Of { quantifier, set } => {
            let ids: Vec<String> = match set {
                PatternSet::Them => declared.iter().map(|s| s.to_string()).collect(),
                PatternSet::Ids(ids) => {
                    let mut out = Vec::with_capacity(ids.len());
                    for id in ids {
                        if !declared.contains(&id.as_str()) {
                            return Err(CompileError::UnknownPattern {
                                rule: rule.to_string(),
                                id: id.clone(),
                            });
                        }
                        // A repeated member would inflate the present count.
                        if !out.contains(id) {
                            out.push(id.clone());
                        }
                    }
                    out
                }
            };
            let min_count = match quantifier {
                Quantifier::Any => 1,
                Quantifier::All => ids.len() as u64,
                Quantifier::Count(n) => *n,
            };
            if min_count < 1 || min_count > ids.len() as u64 {
                return Err(CompileError::InvalidQuantifier {
                    rule: rule.to_string(),
                    wanted: min_count,
                    available: ids.len(),
                });
            }
            Ok(CompiledCondition::Of {
                min_count,
                set: ids,
            })
        }
    }
}

// =============================================================================
// Condition evaluation
// =============================================================================

/// Evaluate a compiled condition against scan results. Pure and total:
/// every well-formed tree yields a boolean for any results/file size.
///
/// `And`/`Or` short-circuit left to right. An identifier with no scan
/// entry evaluates as absent here; [`evaluate_rule`] checks the
/// every-identifier-seeded invariant up front and reports a violation
/// instead of evaluating.
pub fn eval_condition(cond: &CompiledCondition, results: &ScanResults, file_size: u64) -> bool {
    match cond {
        CompiledCondition::And(args) => args.iter().all(|a| eval_condition(a, results, file_size)),
        CompiledCondition::Or(args) => args.iter().any(|a| eval_condition(a, results, file_size)),
        CompiledCondition::Not(inner) => !eval_condition(inner, results, file_size),
        CompiledCondition::Pattern(id) => results.is_present(id),
        CompiledCondition::Size { op, bytes } => op.matches(file_size, *bytes),
        CompiledCondition::Of { min_count, set } => {
            let present = set.iter().filter(|id| results.is_present(id)).count() as u64;
            present >= *min_count
        }
    }
}

/// Evaluate a compiled rule against scan results, producing a verdict.
///
/// Returns [`EvalError::UnreachableState`] when the condition references
/// a pattern with no scan entry. For registry-built rules that state is
/// unreachable: compile-time validation rejects undeclared references
/// and the scanner seeds an entry for every compiled pattern.
pub fn evaluate_rule(
    rule: &CompiledRule,
    results: &ScanResults,
    file_size: u64,
) -> Result<Verdict, EvalError> {
    if let Some(missing) = find_unresolved(&rule.condition, results) {
        return Err(EvalError::UnreachableState {
            rule: rule.name.clone(),
            pattern: missing,
        });
    }

    let flagged = eval_condition(&rule.condition, results, file_size);
    let matched_patterns = rule
        .patterns
        .iter()
        .filter(|p| results.is_present(&p.id))
        .map(|p| p.id.clone())
        .collect();

    Ok(Verdict {
        rule_name: rule.name.clone(),
        flagged,
        matched_patterns,
    })
}

/// First condition-referenced identifier missing from the scan results.
fn find_unresolved(cond: &CompiledCondition, results: &ScanResults) -> Option<String> {
    match cond {
        CompiledCondition::And(args) | CompiledCondition::Or(args) => {
            args.iter().find_map(|a| find_unresolved(a, results))
        }
        CompiledCondition::Not(inner) => find_unresolved(inner, results),
        CompiledCondition::Pattern(id) => results.count(id).is_none().then(|| id.clone()),
        CompiledCondition::Size { .. } => None,
        CompiledCondition::Of { set, .. } => {
            set.iter().find(|id| results.count(id).is_none()).cloned()
        }
    }
}

// =============================================================================
// Tests
// =============================================================================


// =============================================================================
// Property-based tests
// =============================================================================
