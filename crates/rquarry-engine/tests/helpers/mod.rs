use rquarry_engine::{Registry, Verdict};
use rquarry_rules::parse_rules_yaml;

pub fn registry_from_yaml(yaml: &str) -> Registry {
    let set = parse_rules_yaml(yaml).unwrap();
    assert!(set.errors.is_empty(), "{:?}", set.errors);
    Registry::load(&set.rules).unwrap()
}

pub fn eval(yaml: &str, buffer: &[u8]) -> Vec<Verdict> {
    registry_from_yaml(yaml).evaluate_all(buffer, buffer.len() as u64)
}

/// Evaluate the built-in rules and return the verdict for one rule.
pub fn builtin_verdict(rule_name: &str, buffer: &[u8]) -> Verdict {
    let registry = Registry::builtin().unwrap();
    registry
        .evaluate_all(buffer, buffer.len() as u64)
        .into_iter()
        .find(|v| v.rule_name == rule_name)
        .expect("rule not found in builtin registry")
}
