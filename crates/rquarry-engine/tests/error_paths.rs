//! Failure-path coverage: compile rejections, load aborts, and
//! evaluation timeouts.

use std::time::Duration;

use rquarry_engine::{
    CompileError, CompileOptions, EvalError, LoadError, Registry, compile_rule, evaluate_rule,
    scan,
};
use rquarry_rules::{
    ConditionExpr, PatternDef, PatternSet, Quantifier, RuleDef, parse_condition, parse_rules_yaml,
};

fn rule_with(patterns: Vec<PatternDef>, condition: &str) -> RuleDef {
    RuleDef {
        name: "under_test".to_string(),
        meta: Vec::new(),
        patterns,
        condition: parse_condition(condition).unwrap(),
        condition_string: condition.to_string(),
    }
}

// ---------------------------------------------------------------------------
// CompileError
// ---------------------------------------------------------------------------

#[test]
fn duplicate_pattern_identifier_rejected() {
    // Two patterns sharing an identifier must not compile to a
    // partial or ambiguous matcher.
    let def = rule_with(
        vec![
            PatternDef::literal("dup", "first"),
            PatternDef::literal("dup", "second"),
        ],
        "$dup",
    );
    let err = compile_rule(&def, &CompileOptions::default()).unwrap_err();
    assert!(
        matches!(err, CompileError::DuplicateIdentifier { ref id, .. } if id == "dup"),
        "got: {err}"
    );
    assert!(err.to_string().contains("under_test"));
}

#[test]
fn malformed_regex_rejected() {
    let def = rule_with(vec![PatternDef::regex("r", "([unclosed")], "$r");
    let err = compile_rule(&def, &CompileOptions::default()).unwrap_err();
    assert!(
        matches!(err, CompileError::InvalidPattern { ref id, .. } if id == "r"),
        "got: {err}"
    );
}

#[test]
fn empty_literal_rejected() {
    let def = rule_with(vec![PatternDef::literal("e", "")], "$e");
    let err = compile_rule(&def, &CompileOptions::default()).unwrap_err();
    assert!(matches!(err, CompileError::InvalidPattern { .. }), "got: {err}");
}

#[test]
fn undeclared_condition_reference_rejected() {
    let def = rule_with(vec![PatternDef::literal("a", "x")], "$a and $missing");
    let err = compile_rule(&def, &CompileOptions::default()).unwrap_err();
    assert!(
        matches!(err, CompileError::UnknownPattern { ref id, .. } if id == "missing"),
        "got: {err}"
    );
}

#[test]
fn undeclared_reference_inside_of_set_rejected() {
    let def = rule_with(
        vec![PatternDef::literal("a", "x"), PatternDef::literal("b", "y")],
        "2 of ($a, $ghost)",
    );
    let err = compile_rule(&def, &CompileOptions::default()).unwrap_err();
    assert!(
        matches!(err, CompileError::UnknownPattern { ref id, .. } if id == "ghost"),
        "got: {err}"
    );
}

#[test]
fn quantifier_larger_than_set_rejected() {
    let def = rule_with(
        vec![PatternDef::literal("a", "x"), PatternDef::literal("b", "y")],
        "3 of ($a, $b)",
    );
    let err = compile_rule(&def, &CompileOptions::default()).unwrap_err();
    assert!(
        matches!(
            err,
            CompileError::InvalidQuantifier {
                wanted: 3,
                available: 2,
                ..
            }
        ),
        "got: {err}"
    );
}

#[test]
fn zero_quantifier_rejected() {
    let def = rule_with(
        vec![PatternDef::literal("a", "x"), PatternDef::literal("b", "y")],
        "0 of them",
    );
    let err = compile_rule(&def, &CompileOptions::default()).unwrap_err();
    assert!(matches!(err, CompileError::InvalidQuantifier { wanted: 0, .. }), "got: {err}");
}

#[test]
fn quantifier_equal_to_set_size_accepted() {
    let def = rule_with(
        vec![PatternDef::literal("a", "x"), PatternDef::literal("b", "y")],
        "2 of ($a, $b)",
    );
    assert!(compile_rule(&def, &CompileOptions::default()).is_ok());
}

// ---------------------------------------------------------------------------
// LoadError
// ---------------------------------------------------------------------------

#[test]
fn duplicate_rule_name_returns_no_partial_registry() {
    let defs = vec![
        rule_with(vec![PatternDef::literal("a", "x")], "$a"),
        rule_with(vec![PatternDef::literal("b", "y")], "$b"),
    ];
    // Both defs share the name "under_test".
    let err = Registry::load(&defs).unwrap_err();
    assert!(matches!(err, LoadError::DuplicateRuleName(ref n) if n == "under_test"));
}

#[test]
fn compile_failure_is_attributed_and_skipped() {
    let yaml = r#"
name: will_not_compile
patterns:
    $a: 'x'
condition: $a and $phantom
---
name: will_compile
patterns:
    $b: 'y'
condition: $b
"#;
    let set = parse_rules_yaml(yaml).unwrap();
    let registry = Registry::load(&set.rules).unwrap();
    assert_eq!(registry.rule_count(), 1);
    assert_eq!(registry.skipped().len(), 1);

    let (name, error) = &registry.skipped()[0];
    assert_eq!(name, "will_not_compile");
    let message = error.to_string();
    assert!(message.contains("will_not_compile"));
    assert!(message.contains("phantom"));

    // The surviving rule still evaluates.
    let verdicts = registry.evaluate_all(b"y", 1);
    assert_eq!(verdicts.len(), 1);
    assert!(verdicts[0].flagged);
}

// ---------------------------------------------------------------------------
// EvalError
// ---------------------------------------------------------------------------

#[test]
fn zero_timeout_reports_inconclusive_per_rule() {
    let registry = Registry::builtin().unwrap();
    let outcomes = registry.evaluate_all_with_timeout(b"anything", 8, Duration::ZERO);
    assert_eq!(outcomes.len(), registry.rule_count());
    for outcome in &outcomes {
        match outcome {
            Err(EvalError::Timeout { rule, .. }) => assert!(!rule.is_empty()),
            other => panic!("expected timeout, got {other:?}"),
        }
    }
}

#[test]
fn generous_timeout_matches_untimed_evaluation() {
    let registry = Registry::builtin().unwrap();
    let buffer = b"eval(unescape( and /JavaScript /AA /OpenAction";
    let untimed = registry.evaluate_all(buffer, buffer.len() as u64);
    let timed = registry.evaluate_all_with_timeout(
        buffer,
        buffer.len() as u64,
        Duration::from_secs(60),
    );
    let timed: Vec<_> = timed.into_iter().map(|r| r.unwrap()).collect();
    assert_eq!(untimed, timed);
}

#[test]
fn missing_scan_entry_is_an_unreachable_state_error() {
    let def = rule_with(vec![PatternDef::literal("a", "x")], "$a");
    let rule = compile_rule(&def, &CompileOptions::default()).unwrap();
    // Hand the evaluator results that never scanned the rule's patterns.
    let foreign_results = scan(b"x", &[]);
    let err = evaluate_rule(&rule, &foreign_results, 1).unwrap_err();
    assert!(
        matches!(
            err,
            EvalError::UnreachableState { ref rule, ref pattern }
                if rule == "under_test" && pattern == "a"
        ),
        "got: {err}"
    );
}

// ---------------------------------------------------------------------------
// Programmatic condition construction
// ---------------------------------------------------------------------------

#[test]
fn programmatic_all_of_empty_set_rejected() {
    // A rule built in memory with no patterns and `all of them` has an
    // empty quantifier set; the invariant 1 <= k <= |set| cannot hold.
    let def = RuleDef {
        name: "empty_set".to_string(),
        meta: Vec::new(),
        patterns: Vec::new(),
        condition: ConditionExpr::Of {
            quantifier: Quantifier::All,
            set: PatternSet::Them,
        },
        condition_string: "all of them".to_string(),
    };
    let err = compile_rule(&def, &CompileOptions::default()).unwrap_err();
    assert!(matches!(err, CompileError::InvalidQuantifier { available: 0, .. }), "got: {err}");
}
