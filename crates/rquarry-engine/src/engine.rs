//! Rule registry: immutable compiled rules plus batch evaluation.
//!
//! The registry follows a trivial lifecycle: `load` compiles every rule
//! definition once, after which the registry is immutable and reusable
//! across arbitrarily many scans. Compiled rules can be read by any
//! number of threads concurrently; there is no writer after load.

use std::collections::HashSet;
use std::time::Duration;

use rayon::prelude::*;
use tracing::{debug, warn};

use rquarry_rules::{RuleDef, RuleSet, builtin_rule_set};

use crate::compiler::{CompileOptions, CompiledRule, compile_rule, evaluate_rule};
use crate::error::{CompileError, EvalError, LoadError};
use crate::result::Verdict;
use crate::scanner::{Deadline, scan, scan_with_deadline};

/// An immutable set of compiled rules.
///
/// # Example
///
/// ```rust
/// use rquarry_rules::parse_rules_yaml;
/// use rquarry_engine::Registry;
///
/// let yaml = r#"
/// name: eicar_test
/// patterns:
///     $eicar: 'EICAR-STANDARD-ANTIVIRUS-TEST-FILE'
/// condition: $eicar
/// "#;
///
/// let set = parse_rules_yaml(yaml).unwrap();
/// let registry = Registry::load(&set.rules).unwrap();
///
/// let buffer = b"xx EICAR-STANDARD-ANTIVIRUS-TEST-FILE xx";
/// let verdicts = registry.evaluate_all(buffer, buffer.len() as u64);
/// assert!(verdicts[0].flagged);
/// assert_eq!(verdicts[0].matched_patterns, vec!["eicar"]);
/// ```
#[derive(Debug)]
pub struct Registry {
    rules: Vec<CompiledRule>,
    skipped: Vec<(String, CompileError)>,
}

impl Registry {
    /// Compile rule definitions with default options (binary units).
    pub fn load(defs: &[RuleDef]) -> Result<Self, LoadError> {
        Self::load_with(defs, CompileOptions::default())
    }

    /// Compile rule definitions.
    ///
    /// Duplicate rule names abort the whole load; no partial registry is
    /// returned. A rule that fails to compile is recorded in
    /// [`skipped`](Self::skipped) with its error and does not block the
    /// other rules.
    pub fn load_with(defs: &[RuleDef], options: CompileOptions) -> Result<Self, LoadError> {
        let mut seen = HashSet::new();
        for def in defs {
            if !seen.insert(def.name.as_str()) {
                return Err(LoadError::DuplicateRuleName(def.name.clone()));
            }
        }

        let mut rules = Vec::with_capacity(defs.len());
        let mut skipped = Vec::new();
        for def in defs {
            match compile_rule(def, &options) {
                Ok(rule) => rules.push(rule),
                Err(e) => {
                    warn!("skipping rule `{}`: {e}", def.name);
                    skipped.push((def.name.clone(), e));
                }
            }
        }

        debug!(
            rules = rules.len(),
            skipped = skipped.len(),
            "registry loaded"
        );
        Ok(Registry { rules, skipped })
    }

    /// Load from a parsed rule set (parse errors were already collected
    /// by the front end).
    pub fn from_rule_set(set: &RuleSet) -> Result<Self, LoadError> {
        Self::load(&set.rules)
    }

    /// Compile the embedded built-in rule set.
    pub fn builtin() -> Result<Self, LoadError> {
        Self::load(&builtin_rule_set().rules)
    }

    /// Access the compiled rules, in load order.
    pub fn rules(&self) -> &[CompiledRule] {
        &self.rules
    }

    /// Number of rules that compiled successfully.
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Rules that failed to compile, with their errors.
    pub fn skipped(&self) -> &[(String, CompileError)] {
        &self.skipped
    }

    /// Evaluate every rule against a buffer.
    ///
    /// `file_size` is the candidate's size as reported by the caller —
    /// usually `buffer.len()`, but a front end may report the on-disk
    /// size when it feeds a truncated buffer.
    ///
    /// One verdict per rule, in registry load order. Each rule's own
    /// pattern set is scanned independently; patterns are not
    /// deduplicated across rules.
    pub fn evaluate_all(&self, buffer: &[u8], file_size: u64) -> Vec<Verdict> {
        self.rules
            .iter()
            .map(|rule| evaluate_compiled(rule, buffer, file_size))
            .collect()
    }

    /// Evaluate every rule with a per-rule wall-clock timeout.
    ///
    /// A rule whose scan exceeds the timeout yields
    /// [`EvalError::Timeout`] — an inconclusive outcome, not a flag —
    /// and evaluation continues with the next rule. Output order is
    /// registry load order.
    pub fn evaluate_all_with_timeout(
        &self,
        buffer: &[u8],
        file_size: u64,
        timeout: Duration,
    ) -> Vec<Result<Verdict, EvalError>> {
        self.rules
            .iter()
            .map(|rule| {
                let deadline = Deadline::after(timeout);
                match scan_with_deadline(buffer, &rule.patterns, Some(&deadline)) {
                    Some(results) => evaluate_rule(rule, &results, file_size),
                    None => Err(EvalError::Timeout {
                        rule: rule.name.clone(),
                        timeout,
                    }),
                }
            })
            .collect()
    }

    /// Evaluate every rule in parallel.
    ///
    /// Compiled rules are immutable and evaluation is pure, so rules may
    /// be evaluated by any number of workers; results are collected back
    /// into registry load order regardless of scheduling.
    pub fn par_evaluate_all(&self, buffer: &[u8], file_size: u64) -> Vec<Verdict> {
        self.rules
            .par_iter()
            .map(|rule| evaluate_compiled(rule, buffer, file_size))
            .collect()
    }
}

fn evaluate_compiled(rule: &CompiledRule, buffer: &[u8], file_size: u64) -> Verdict {
    let results = scan(buffer, &rule.patterns);
    match evaluate_rule(rule, &results, file_size) {
        Ok(verdict) => verdict,
        // Compile-time reference validation plus scanner seeding cover
        // every identifier a registry-built rule can mention.
        Err(e) => unreachable!("registry invariant violated: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rquarry_rules::parse_rules_yaml;

    fn registry_from_yaml(yaml: &str) -> Registry {
        let set = parse_rules_yaml(yaml).unwrap();
        assert!(set.errors.is_empty(), "{:?}", set.errors);
        Registry::load(&set.rules).unwrap()
    }

    #[test]
    fn test_simple_match() {
        let registry = registry_from_yaml(
            r#"
name: find_needle
patterns:
    $n: 'needle'
condition: $n
"#,
        );
        let verdicts = registry.evaluate_all(b"hay needle hay", 14);
        assert_eq!(verdicts.len(), 1);
        assert!(verdicts[0].flagged);
        assert_eq!(verdicts[0].rule_name, "find_needle");
    }

    #[test]
    fn test_no_match() {
        let registry = registry_from_yaml(
            r#"
name: find_needle
patterns:
    $n: 'needle'
condition: $n
"#,
        );
        let verdicts = registry.evaluate_all(b"just hay", 8);
        assert!(!verdicts[0].flagged);
        assert!(verdicts[0].matched_patterns.is_empty());
    }

    #[test]
    fn test_verdict_order_matches_load_order() {
        let registry = registry_from_yaml(
            r#"
name: rule_b
patterns:
    $x: 'bbb'
condition: $x
---
name: rule_a
patterns:
    $x: 'aaa'
condition: $x
"#,
        );
        let verdicts = registry.evaluate_all(b"aaa", 3);
        assert_eq!(verdicts[0].rule_name, "rule_b");
        assert_eq!(verdicts[1].rule_name, "rule_a");
        assert!(!verdicts[0].flagged);
        assert!(verdicts[1].flagged);
    }

    #[test]
    fn test_duplicate_rule_name_aborts_load() {
        let set = parse_rules_yaml(
            r#"
name: twin
patterns:
    $a: 'x'
condition: $a
---
name: twin
patterns:
    $b: 'y'
condition: $b
"#,
        )
        .unwrap();
        let err = Registry::load(&set.rules).unwrap_err();
        assert!(matches!(err, LoadError::DuplicateRuleName(ref n) if n == "twin"));
    }

    #[test]
    fn test_bad_rule_is_skipped_others_load() {
        let set = parse_rules_yaml(
            r#"
name: broken_regex
patterns:
    $r:
        regex: '([unclosed'
condition: $r
---
name: fine
patterns:
    $a: 'x'
condition: $a
"#,
        )
        .unwrap();
        assert!(set.errors.is_empty(), "{:?}", set.errors);

        let registry = Registry::load(&set.rules).unwrap();
        assert_eq!(registry.rule_count(), 1);
        assert_eq!(registry.skipped().len(), 1);
        let (name, error) = &registry.skipped()[0];
        assert_eq!(name, "broken_regex");
        assert!(error.to_string().contains("broken_regex"));
    }

    #[test]
    fn test_parallel_matches_serial() {
        let registry = Registry::builtin().unwrap();
        let buffer = b"eval(unescape( /JavaScript /AA /OpenAction";
        let serial = registry.evaluate_all(buffer, buffer.len() as u64);
        let parallel = registry.par_evaluate_all(buffer, buffer.len() as u64);
        assert_eq!(serial, parallel);
    }

    #[test]
    fn test_registry_reusable_across_scans() {
        let registry = registry_from_yaml(
            r#"
name: find_needle
patterns:
    $n: 'needle'
condition: $n
"#,
        );
        assert!(registry.evaluate_all(b"a needle", 8)[0].flagged);
        assert!(!registry.evaluate_all(b"plain hay", 9)[0].flagged);
        assert!(registry.evaluate_all(b"needle again", 12)[0].flagged);
    }

    #[test]
    fn test_builtin_registry_loads_all_rules() {
        let registry = Registry::builtin().unwrap();
        assert_eq!(registry.rule_count(), 3);
        assert!(registry.skipped().is_empty());
    }
}
