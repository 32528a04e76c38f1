//! YAML → rule-model parser.
//!
//! Handles:
//! - Single-document YAML (one rule)
//! - Multi-document YAML (`---` separators)
//! - Ordered pattern and metadata mappings
//! - Directory-based rule collection loading
//!
//! Rule files are deliberately small: name, metadata, a pattern mapping,
//! and a condition string in the grammar defined by [`crate::condition`].
//! Anything beyond populating the in-memory model is out of scope.

use std::path::Path;

use serde::Deserialize;
use serde_yaml::{Mapping, Value};
use tracing::debug;

use crate::ast::{MetaValue, PatternDef, PatternKind, RuleDef, RuleSet};
use crate::condition::parse_condition;
use crate::error::{Result, RuleParserError};

// =============================================================================
// Public API
// =============================================================================

/// Parse a YAML string containing one or more rule documents.
///
/// Documents are separated by `---`. A document that fails to parse is
/// recorded in [`RuleSet::errors`] with its rule name (when recoverable)
/// and skipped; the remaining documents still load.
pub fn parse_rules_yaml(yaml: &str) -> Result<RuleSet> {
    let mut set = RuleSet::new();

    for doc in serde_yaml::Deserializer::from_str(yaml) {
        let value: Value = match Value::deserialize(doc) {
            Ok(v) => v,
            Err(e) => {
                set.errors.push(format!("YAML parse error: {e}"));
                continue;
            }
        };

        // Skip empty documents (trailing `---`).
        if value.is_null() {
            continue;
        }

        match parse_rule_document(&value) {
            Ok(rule) => set.rules.push(rule),
            Err(e) => {
                let label = value
                    .as_mapping()
                    .and_then(|m| get(m, "name"))
                    .and_then(Value::as_str)
                    .unwrap_or("<unnamed>");
                set.errors.push(format!("rule `{label}`: {e}"));
            }
        }
    }

    Ok(set)
}

/// Parse a single rule file from a path.
pub fn parse_rules_file(path: &Path) -> Result<RuleSet> {
    let content = std::fs::read_to_string(path)?;
    parse_rules_yaml(&content)
}

/// Parse all rule files from a directory (recursively).
///
/// Files with `.yml` or `.yaml` extensions are loaded; a file that fails
/// to read is recorded as an error entry, not a hard failure.
pub fn parse_rules_directory(dir: &Path) -> Result<RuleSet> {
    let mut set = RuleSet::new();

    fn walk(dir: &Path, set: &mut RuleSet) -> Result<()> {
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.is_dir() {
                walk(&path, set)?;
            } else if matches!(
                path.extension().and_then(|e| e.to_str()),
                Some("yml" | "yaml")
            ) {
                match parse_rules_file(&path) {
                    Ok(sub) => {
                        set.rules.extend(sub.rules);
                        set.errors.extend(sub.errors);
                    }
                    Err(e) => {
                        set.errors.push(format!("{}: {e}", path.display()));
                    }
                }
            }
        }
        Ok(())
    }

    walk(dir, &mut set)?;
    debug!(
        rules = set.rules.len(),
        errors = set.errors.len(),
        "loaded rule directory {}",
        dir.display()
    );
    Ok(set)
}

// =============================================================================
// Document parsing
// =============================================================================

fn parse_rule_document(value: &Value) -> Result<RuleDef> {
    let mapping = value.as_mapping().ok_or_else(|| {
        RuleParserError::InvalidRule("document is not a YAML mapping".into())
    })?;

    let name = get(mapping, "name")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| RuleParserError::MissingField("name".into()))?;
    if name.is_empty() {
        return Err(RuleParserError::InvalidRule("rule name is empty".into()));
    }

    let meta = match get(mapping, "meta") {
        Some(v) => parse_meta(v)?,
        None => Vec::new(),
    };

    let patterns_val =
        get(mapping, "patterns").ok_or_else(|| RuleParserError::MissingField("patterns".into()))?;
    let patterns = parse_patterns(patterns_val)?;
    if patterns.is_empty() {
        return Err(RuleParserError::InvalidRule(
            "rule declares no patterns".into(),
        ));
    }

    let condition_string = get(mapping, "condition")
        .and_then(Value::as_str)
        .map(|s| s.trim().to_string())
        .ok_or_else(|| RuleParserError::MissingField("condition".into()))?;
    let condition = parse_condition(&condition_string)?;

    Ok(RuleDef {
        name,
        meta,
        patterns,
        condition,
        condition_string,
    })
}

fn parse_meta(value: &Value) -> Result<Vec<(String, MetaValue)>> {
    let mapping = value.as_mapping().ok_or_else(|| {
        RuleParserError::InvalidRule("`meta` must be a mapping".into())
    })?;

    let mut meta = Vec::with_capacity(mapping.len());
    for (k, v) in mapping {
        let key = k
            .as_str()
            .ok_or_else(|| RuleParserError::InvalidRule("metadata key must be a string".into()))?
            .to_string();
        let value = match v {
            Value::String(s) => MetaValue::String(s.clone()),
            Value::Bool(b) => MetaValue::Bool(*b),
            Value::Number(n) => {
                let i = n.as_i64().ok_or_else(|| {
                    RuleParserError::InvalidRule(format!(
                        "metadata value for `{key}` is not an integer"
                    ))
                })?;
                MetaValue::Integer(i)
            }
            other => {
                return Err(RuleParserError::InvalidRule(format!(
                    "unsupported metadata value for `{key}`: {other:?}"
                )));
            }
        };
        meta.push((key, value));
    }
    Ok(meta)
}

fn parse_patterns(value: &Value) -> Result<Vec<PatternDef>> {
    let mapping = value.as_mapping().ok_or_else(|| {
        RuleParserError::InvalidRule("`patterns` must be a mapping".into())
    })?;

    let mut patterns: Vec<PatternDef> = Vec::with_capacity(mapping.len());
    for (k, v) in mapping {
        let raw_id = k.as_str().ok_or_else(|| {
            RuleParserError::InvalidPattern("pattern identifier must be a string".into())
        })?;
        let id = raw_id.strip_prefix('$').unwrap_or(raw_id);
        if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(RuleParserError::InvalidPattern(format!(
                "invalid pattern identifier `{raw_id}`"
            )));
        }
        if patterns.iter().any(|p| p.id == id) {
            return Err(RuleParserError::InvalidPattern(format!(
                "duplicate pattern identifier `${id}`"
            )));
        }

        let kind = parse_pattern_kind(id, v)?;
        patterns.push(PatternDef {
            id: id.to_string(),
            kind,
        });
    }
    Ok(patterns)
}

fn parse_pattern_kind(id: &str, value: &Value) -> Result<PatternKind> {
    match value {
        // Shorthand: a bare string is a case-sensitive literal.
        Value::String(s) => Ok(PatternKind::Literal {
            value: s.clone(),
            nocase: false,
        }),
        Value::Mapping(m) => {
            let regex = get(m, "regex").and_then(Value::as_str);
            let string = get(m, "string").and_then(Value::as_str);
            let nocase = get(m, "nocase").and_then(Value::as_bool).unwrap_or(false);

            match (string, regex) {
                (Some(_), Some(_)) => Err(RuleParserError::InvalidPattern(format!(
                    "pattern `${id}` declares both `string` and `regex`"
                ))),
                (None, Some(pattern)) => {
                    if nocase {
                        return Err(RuleParserError::InvalidPattern(format!(
                            "pattern `${id}`: `nocase` does not apply to regex patterns, \
                             use an inline (?i) flag"
                        )));
                    }
                    Ok(PatternKind::Regex {
                        pattern: pattern.to_string(),
                    })
                }
                (Some(value), None) => Ok(PatternKind::Literal {
                    value: value.to_string(),
                    nocase,
                }),
                (None, None) => Err(RuleParserError::InvalidPattern(format!(
                    "pattern `${id}` must declare `string` or `regex`"
                ))),
            }
        }
        other => Err(RuleParserError::InvalidPattern(format!(
            "pattern `${id}` has unsupported value: {other:?}"
        ))),
    }
}

fn get<'a>(mapping: &'a Mapping, key: &str) -> Option<&'a Value> {
    mapping.get(Value::String(key.to_string()))
}

// =============================================================================
// Tests
// =============================================================================
