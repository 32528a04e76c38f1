//! # rquarry-rules
//!
//! The rule model and front end for the rquarry detection engine.
//!
//! This crate parses declarative detection rules into a strongly-typed
//! model, handling:
//!
//! - **Rule files**: small YAML documents with a name, metadata mapping,
//!   ordered pattern declarations, and a condition expression
//! - **Patterns**: literal byte strings (optionally case-insensitive)
//!   and regular expressions
//! - **Condition expressions**: `and`, `or`, `not`, `N of (...)`,
//!   `any of them`, `all of them`, `filesize` comparisons, parenthesized
//!   groups
//! - **Size literals**: `500KB`, `10MB`, ... with a configurable
//!   1024/1000 unit basis resolved at compile time
//!
//! ## Architecture
//!
//! - **PEG grammar** ([`pest`]) for condition expression parsing with
//!   correct operator precedence (`not` > `and` > `or`) and Pratt parsing
//! - **serde_yaml** for rule-file deserialization with preserved
//!   mapping order
//! - Embedded built-in rules (malicious JavaScript, malicious PDF,
//!   EICAR) in [`builtin`]
//!
//! ## Quick Start
//!
//! ```rust
//! use rquarry_rules::parse_rules_yaml;
//!
//! let yaml = r#"
//! name: eicar_test_signature
//! patterns:
//!     $eicar: 'EICAR-STANDARD-ANTIVIRUS-TEST-FILE'
//! condition: $eicar
//! "#;
//!
//! let set = parse_rules_yaml(yaml).unwrap();
//! assert!(set.errors.is_empty());
//! assert_eq!(set.rules[0].name, "eicar_test_signature");
//! ```
//!
//! ## Parsing condition expressions
//!
//! ```rust
//! use rquarry_rules::parse_condition;
//!
//! let expr = parse_condition("2 of ($eval, $unescape) or $xor").unwrap();
//! println!("{expr}");
//! ```

pub mod ast;
pub mod builtin;
pub mod condition;
pub mod error;
pub mod parser;
pub mod value;

// Re-export the most commonly used types and functions at crate root
pub use ast::{
    CompareOp, ConditionExpr, MetaValue, PatternDef, PatternKind, PatternSet, Quantifier,
    RuleDef, RuleSet,
};
pub use builtin::builtin_rule_set;
pub use condition::parse_condition;
pub use error::{Result, RuleParserError};
pub use parser::{parse_rules_directory, parse_rules_file, parse_rules_yaml};
pub use value::{SizeLiteral, SizeUnit, UnitBasis};
