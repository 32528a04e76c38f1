//! Built-in detection rules shipped with the repository.
//!
//! The rule sources live under `rules/` at the workspace root and are
//! embedded at compile time, so the CLI and library consumers get a
//! working rule set without any filesystem dependency.

use crate::ast::RuleSet;
use crate::parser::parse_rules_yaml;

/// Obfuscated-JavaScript dropper heuristics.
pub const MALICIOUS_JS: &str = include_str!("../../../rules/malicious_js.yaml");

/// Active-content PDF structure heuristics.
pub const MALICIOUS_PDF: &str = include_str!("../../../rules/malicious_pdf.yaml");

/// EICAR antivirus test-file signature.
pub const EICAR: &str = include_str!("../../../rules/eicar.yaml");

/// Parse the embedded rule set.
///
/// Parse failures in the embedded sources would indicate a packaging
/// defect; they surface through [`RuleSet::errors`] like any other
/// source and are asserted empty by tests.
pub fn builtin_rule_set() -> RuleSet {
    let mut set = RuleSet::new();
    for src in [MALICIOUS_JS, MALICIOUS_PDF, EICAR] {
        match parse_rules_yaml(src) {
            Ok(sub) => {
                set.rules.extend(sub.rules);
                set.errors.extend(sub.errors);
            }
            Err(e) => set.errors.push(e.to_string()),
        }
    }
    set
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_rules_parse_cleanly() {
        let set = builtin_rule_set();
        assert!(set.errors.is_empty(), "{:?}", set.errors);
        assert_eq!(set.len(), 3);

        let names: Vec<&str> = set.rules.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "suspicious_js_obfuscation",
                "suspicious_pdf_structure",
                "eicar_test_signature",
            ]
        );
    }

    #[test]
    fn test_js_rule_shape() {
        let set = builtin_rule_set();
        let js = set
            .rules
            .iter()
            .find(|r| r.name == "suspicious_js_obfuscation")
            .unwrap();
        assert_eq!(js.patterns.len(), 6);
        assert!(js.pattern("eval").is_some());
        assert!(js.pattern("xor").is_some());
    }

    #[test]
    fn test_pdf_rule_shape() {
        let set = builtin_rule_set();
        let pdf = set
            .rules
            .iter()
            .find(|r| r.name == "suspicious_pdf_structure")
            .unwrap();
        assert_eq!(pdf.patterns.len(), 6);
        assert!(pdf.pattern("openaction").is_some());
    }
}
