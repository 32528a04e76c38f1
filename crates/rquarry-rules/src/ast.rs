//! AST types for detection rules: patterns, metadata, and condition
//! expressions.
//!
//! These types are the in-memory rule model that front ends populate and
//! the engine compiles. They carry no matching logic of their own.

use std::fmt;

use serde::Serialize;

use crate::value::SizeLiteral;

// =============================================================================
// Patterns
// =============================================================================

/// How a pattern matches the scanned buffer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum PatternKind {
    /// Exact byte substring. `nocase` switches to ASCII case-insensitive
    /// comparison; the default is case-sensitive.
    Literal { value: String, nocase: bool },
    /// Regular expression matched against the raw bytes of the buffer.
    Regex { pattern: String },
}

/// A single declared pattern: identifier plus matching kind.
///
/// The identifier is stored without the `$` sigil and must be unique
/// within its rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatternDef {
    pub id: String,
    pub kind: PatternKind,
}

impl PatternDef {
    pub fn literal(id: &str, value: &str) -> Self {
        PatternDef {
            id: id.to_string(),
            kind: PatternKind::Literal {
                value: value.to_string(),
                nocase: false,
            },
        }
    }

    pub fn regex(id: &str, pattern: &str) -> Self {
        PatternDef {
            id: id.to_string(),
            kind: PatternKind::Regex {
                pattern: pattern.to_string(),
            },
        }
    }
}

// =============================================================================
// Metadata
// =============================================================================

/// A metadata value attached to a rule.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetaValue {
    String(String),
    Bool(bool),
    Integer(i64),
}

impl fmt::Display for MetaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetaValue::String(s) => write!(f, "{s}"),
            MetaValue::Bool(b) => write!(f, "{b}"),
            MetaValue::Integer(n) => write!(f, "{n}"),
        }
    }
}

// =============================================================================
// Condition expression AST
// =============================================================================

/// Comparison operator in a `filesize` predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CompareOp {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
}

impl CompareOp {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "<" => Some(CompareOp::Lt),
            "<=" => Some(CompareOp::Le),
            ">" => Some(CompareOp::Gt),
            ">=" => Some(CompareOp::Ge),
            "==" => Some(CompareOp::Eq),
            _ => None,
        }
    }

    /// Apply the comparison: `lhs <op> rhs`.
    pub fn matches(self, lhs: u64, rhs: u64) -> bool {
        match self {
            CompareOp::Lt => lhs < rhs,
            CompareOp::Le => lhs <= rhs,
            CompareOp::Gt => lhs > rhs,
            CompareOp::Ge => lhs >= rhs,
            CompareOp::Eq => lhs == rhs,
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
            CompareOp::Eq => "==",
        };
        write!(f, "{s}")
    }
}

/// Quantifier in an `of` expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Quantifier {
    /// At least one: `1 of ...` or `any of ...`
    Any,
    /// Every member: `all of ...`
    All,
    /// At least N members: `N of ...`
    Count(u64),
}

impl fmt::Display for Quantifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Quantifier::Any => write!(f, "any"),
            Quantifier::All => write!(f, "all"),
            Quantifier::Count(n) => write!(f, "{n}"),
        }
    }
}

/// Target set of an `of` expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum PatternSet {
    /// Every pattern declared by the rule: `... of them`
    Them,
    /// An explicit identifier list: `... of ($a, $b, $c)`
    Ids(Vec<String>),
}

impl fmt::Display for PatternSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatternSet::Them => write!(f, "them"),
            PatternSet::Ids(ids) => {
                let parts: Vec<String> = ids.iter().map(|id| format!("${id}")).collect();
                write!(f, "({})", parts.join(", "))
            }
        }
    }
}

/// Parsed condition expression AST.
///
/// Produced by the PEG parser + Pratt parser from condition strings like
/// `$eicar` or `2 of ($eval, $unescape) and filesize < 500KB`.
/// Pattern absence is expressed as `Not(Pattern(id))`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ConditionExpr {
    /// Logical AND of sub-expressions.
    And(Vec<ConditionExpr>),
    /// Logical OR of sub-expressions.
    Or(Vec<ConditionExpr>),
    /// Logical NOT of a sub-expression.
    Not(Box<ConditionExpr>),
    /// Presence of a declared pattern: `$id`.
    Pattern(String),
    /// File-size predicate: `filesize < 500KB`.
    Size { op: CompareOp, size: SizeLiteral },
    /// Quantified set membership: `2 of ($a, $b, $c)`, `all of them`.
    Of {
        quantifier: Quantifier,
        set: PatternSet,
    },
}

impl ConditionExpr {
    /// Visit every pattern identifier referenced by this expression,
    /// including identifiers inside `of` sets. `them` references no
    /// explicit identifiers.
    pub fn for_each_pattern_ref<F: FnMut(&str)>(&self, f: &mut F) {
        match self {
            ConditionExpr::And(args) | ConditionExpr::Or(args) => {
                for a in args {
                    a.for_each_pattern_ref(f);
                }
            }
            ConditionExpr::Not(inner) => inner.for_each_pattern_ref(f),
            ConditionExpr::Pattern(id) => f(id),
            ConditionExpr::Size { .. } => {}
            ConditionExpr::Of { set, .. } => {
                if let PatternSet::Ids(ids) = set {
                    for id in ids {
                        f(id);
                    }
                }
            }
        }
    }
}

impl fmt::Display for ConditionExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConditionExpr::And(args) => {
                let parts: Vec<String> = args.iter().map(|a| format!("{a}")).collect();
                write!(f, "({})", parts.join(" and "))
            }
            ConditionExpr::Or(args) => {
                let parts: Vec<String> = args.iter().map(|a| format!("{a}")).collect();
                write!(f, "({})", parts.join(" or "))
            }
            ConditionExpr::Not(arg) => write!(f, "not {arg}"),
            ConditionExpr::Pattern(id) => write!(f, "${id}"),
            ConditionExpr::Size { op, size } => write!(f, "filesize {op} {size}"),
            ConditionExpr::Of { quantifier, set } => write!(f, "{quantifier} of {set}"),
        }
    }
}

// =============================================================================
// Rules
// =============================================================================

/// A complete rule definition: the unit the engine compiles.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleDef {
    /// Rule name, unique within a registry.
    pub name: String,
    /// Ordered metadata mapping. Insertion order is preserved for
    /// reporting; it carries no semantics.
    pub meta: Vec<(String, MetaValue)>,
    /// Ordered pattern declarations.
    pub patterns: Vec<PatternDef>,
    /// Parsed condition expression.
    pub condition: ConditionExpr,
    /// The raw condition text the expression was parsed from.
    pub condition_string: String,
}

impl RuleDef {
    /// Look up a declared pattern by identifier (without the `$` sigil).
    pub fn pattern(&self, id: &str) -> Option<&PatternDef> {
        self.patterns.iter().find(|p| p.id == id)
    }

    /// Look up a metadata value by key.
    pub fn meta_value(&self, key: &str) -> Option<&MetaValue> {
        self.meta
            .iter()
            .find_map(|(k, v)| (k.as_str() == key).then_some(v))
    }
}

/// A collection of parsed rules from one or more sources.
///
/// Parse failures are collected per document rather than failing the
/// whole source; a malformed rule is reported and skipped.
#[derive(Debug, Clone, Serialize)]
pub struct RuleSet {
    pub rules: Vec<RuleDef>,
    /// Parsing errors collected while loading.
    #[serde(skip)]
    pub errors: Vec<String>,
}

impl RuleSet {
    pub fn new() -> Self {
        RuleSet {
            rules: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================
