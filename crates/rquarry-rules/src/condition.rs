//! Condition expression parser using a pest PEG grammar + Pratt parser.
//!
//! Parses condition strings like:
//! - `$eicar`
//! - `2 of ($eval, $unescape, $write) or $xor`
//! - `3 of ($js, $aa, $openaction) and filesize < 10MB`
//! - `all of them`
//!
//! This grammar is the contract front ends target when translating rule
//! text into the in-memory condition tree.

use pest::Parser;
use pest::iterators::Pair;
use pest::pratt_parser::{Assoc, Op, PrattParser};
use pest_derive::Parser;

use crate::ast::{CompareOp, ConditionExpr, PatternSet, Quantifier};
use crate::error::{Result, RuleParserError};
use crate::value::SizeLiteral;

// ---------------------------------------------------------------------------
// Pest parser (generated from quarry.pest grammar)
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[grammar = "src/quarry.pest"]
struct QuarryConditionParser;

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Parse a condition expression string into an AST.
///
/// # Examples
///
/// ```
/// use rquarry_rules::condition::parse_condition;
///
/// let expr = parse_condition("2 of ($a, $b, $c) and filesize < 500KB").unwrap();
/// println!("{expr}");
/// ```
pub fn parse_condition(input: &str) -> Result<ConditionExpr> {
    let pairs = QuarryConditionParser::parse(Rule::condition, input)
        .map_err(|e| RuleParserError::Condition(e.to_string()))?;

    let pratt = PrattParser::new()
        .op(Op::infix(Rule::or_op, Assoc::Left))
        .op(Op::infix(Rule::and_op, Assoc::Left))
        .op(Op::prefix(Rule::not_op));

    // condition = { SOI ~ expr ~ EOI }
    let condition_pair = pairs.into_iter().next().unwrap();
    let expr_pair = condition_pair
        .into_inner()
        .find(|p| p.as_rule() == Rule::expr)
        .unwrap();

    parse_expr(expr_pair, &pratt)
}

// ---------------------------------------------------------------------------
// Internal parsing helpers
// ---------------------------------------------------------------------------

fn parse_expr(pair: Pair<'_, Rule>, pratt: &PrattParser<Rule>) -> Result<ConditionExpr> {
    pratt
        .map_primary(|primary| match primary.as_rule() {
            Rule::pattern_ref => Ok(ConditionExpr::Pattern(pattern_ref_id(&primary))),
            Rule::of_expr => parse_of(primary),
            Rule::size_cmp => parse_size_cmp(primary),
            Rule::expr => parse_expr(primary, pratt),
            other => unreachable!("unexpected primary rule: {other:?}"),
        })
        .map_prefix(|op, rhs| match op.as_rule() {
            Rule::not_op => Ok(ConditionExpr::Not(Box::new(rhs?))),
            other => unreachable!("unexpected prefix rule: {other:?}"),
        })
        .map_infix(|lhs, op, rhs| match op.as_rule() {
            Rule::and_op => Ok(merge_binary(ConditionExpr::And, lhs?, rhs?)),
            Rule::or_op => Ok(merge_binary(ConditionExpr::Or, lhs?, rhs?)),
            other => unreachable!("unexpected infix rule: {other:?}"),
        })
        .parse(pair.into_inner())
}

/// Flatten nested binary operators of the same kind.
/// `a and (b and c)` → `And(a, b, c)` instead of `And(a, And(b, c))`.
fn merge_binary(
    ctor: fn(Vec<ConditionExpr>) -> ConditionExpr,
    lhs: ConditionExpr,
    rhs: ConditionExpr,
) -> ConditionExpr {
    let is_same = |expr: &ConditionExpr| -> bool {
        matches!(
            (&ctor(vec![]), expr),
            (ConditionExpr::And(_), ConditionExpr::And(_))
                | (ConditionExpr::Or(_), ConditionExpr::Or(_))
        )
    };

    let mut args = Vec::new();

    for side in [lhs, rhs] {
        if is_same(&side) {
            match side {
                ConditionExpr::And(children) | ConditionExpr::Or(children) => {
                    args.extend(children);
                }
                _ => unreachable!(),
            }
        } else {
            args.push(side);
        }
    }

    ctor(args)
}

/// Strip the `$` sigil from a pattern reference token.
fn pattern_ref_id(pair: &Pair<'_, Rule>) -> String {
    pair.as_str()
        .strip_prefix('$')
        .unwrap_or(pair.as_str())
        .to_string()
}

fn parse_of(pair: Pair<'_, Rule>) -> Result<ConditionExpr> {
    let mut quantifier_pair = None;
    let mut target_pair = None;

    for p in pair.into_inner() {
        match p.as_rule() {
            Rule::quantifier => quantifier_pair = Some(p),
            Rule::of_target => target_pair = Some(p),
            _ => {}
        }
    }

    let quantifier = parse_quantifier(quantifier_pair.expect("of expression must have quantifier"))?;
    let set = parse_of_target(target_pair.expect("of expression must have target"));

    Ok(ConditionExpr::Of { quantifier, set })
}

fn parse_quantifier(pair: Pair<'_, Rule>) -> Result<Quantifier> {
    let inner = pair
        .into_inner()
        .next()
        .expect("quantifier must have child");
    match inner.as_rule() {
        Rule::all_kw => Ok(Quantifier::All),
        Rule::any_kw => Ok(Quantifier::Any),
        Rule::uint => {
            let n: u64 = inner.as_str().parse().map_err(|_| {
                RuleParserError::Condition(format!(
                    "quantifier out of range: {}",
                    inner.as_str()
                ))
            })?;
            if n == 1 {
                Ok(Quantifier::Any)
            } else {
                Ok(Quantifier::Count(n))
            }
        }
        other => unreachable!("unexpected quantifier rule: {other:?}"),
    }
}

fn parse_of_target(pair: Pair<'_, Rule>) -> PatternSet {
    let inner = pair.into_inner().next().expect("target must have child");
    match inner.as_rule() {
        Rule::them_kw => PatternSet::Them,
        Rule::pattern_list => {
            let ids = inner
                .into_inner()
                .filter(|p| p.as_rule() == Rule::pattern_ref)
                .map(|p| pattern_ref_id(&p))
                .collect();
            PatternSet::Ids(ids)
        }
        other => unreachable!("unexpected of target rule: {other:?}"),
    }
}

fn parse_size_cmp(pair: Pair<'_, Rule>) -> Result<ConditionExpr> {
    let mut op = None;
    let mut size = None;

    for p in pair.into_inner() {
        match p.as_rule() {
            Rule::cmp_op => op = CompareOp::from_str(p.as_str()),
            Rule::size_lit => size = Some(SizeLiteral::parse(p.as_str())?),
            _ => {}
        }
    }

    Ok(ConditionExpr::Size {
        op: op.expect("size comparison must have operator"),
        size: size.expect("size comparison must have literal"),
    })
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::SizeUnit;

    #[test]
    fn test_simple_pattern() {
        let expr = parse_condition("$eicar").unwrap();
        assert_eq!(expr, ConditionExpr::Pattern("eicar".to_string()));
    }

    #[test]
    fn test_and() {
        let expr = parse_condition("$a and $b").unwrap();
        assert_eq!(
            expr,
            ConditionExpr::And(vec![
                ConditionExpr::Pattern("a".to_string()),
                ConditionExpr::Pattern("b".to_string()),
            ])
        );
    }

    #[test]
    fn test_or() {
        let expr = parse_condition("$a or $b").unwrap();
        assert_eq!(
            expr,
            ConditionExpr::Or(vec![
                ConditionExpr::Pattern("a".to_string()),
                ConditionExpr::Pattern("b".to_string()),
            ])
        );
    }

    #[test]
    fn test_not() {
        let expr = parse_condition("not $uri").unwrap();
        assert_eq!(
            expr,
            ConditionExpr::Not(Box::new(ConditionExpr::Pattern("uri".to_string())))
        );
    }

    #[test]
    fn test_and_not() {
        let expr = parse_condition("$a and not $b").unwrap();
        assert_eq!(
            expr,
            ConditionExpr::And(vec![
                ConditionExpr::Pattern("a".to_string()),
                ConditionExpr::Not(Box::new(ConditionExpr::Pattern("b".to_string()))),
            ])
        );
    }

    #[test]
    fn test_precedence_not_and_or() {
        // "$a or not $b and $c" should parse as "$a or ((not $b) and $c)"
        let expr = parse_condition("$a or not $b and $c").unwrap();
        assert_eq!(
            expr,
            ConditionExpr::Or(vec![
                ConditionExpr::Pattern("a".to_string()),
                ConditionExpr::And(vec![
                    ConditionExpr::Not(Box::new(ConditionExpr::Pattern("b".to_string()))),
                    ConditionExpr::Pattern("c".to_string()),
                ]),
            ])
        );
    }

    #[test]
    fn test_parentheses() {
        let expr = parse_condition("($a or $b) and $c").unwrap();
        assert_eq!(
            expr,
            ConditionExpr::And(vec![
                ConditionExpr::Or(vec![
                    ConditionExpr::Pattern("a".to_string()),
                    ConditionExpr::Pattern("b".to_string()),
                ]),
                ConditionExpr::Pattern("c".to_string()),
            ])
        );
    }

    #[test]
    fn test_triple_and_flattened() {
        let expr = parse_condition("$a and $b and $c").unwrap();
        assert_eq!(
            expr,
            ConditionExpr::And(vec![
                ConditionExpr::Pattern("a".to_string()),
                ConditionExpr::Pattern("b".to_string()),
                ConditionExpr::Pattern("c".to_string()),
            ])
        );
    }

    #[test]
    fn test_count_of_list() {
        let expr = parse_condition("2 of ($a, $b, $c)").unwrap();
        assert_eq!(
            expr,
            ConditionExpr::Of {
                quantifier: Quantifier::Count(2),
                set: PatternSet::Ids(vec!["a".into(), "b".into(), "c".into()]),
            }
        );
    }

    #[test]
    fn test_one_of_normalizes_to_any() {
        let expr = parse_condition("1 of ($a, $b)").unwrap();
        assert_eq!(
            expr,
            ConditionExpr::Of {
                quantifier: Quantifier::Any,
                set: PatternSet::Ids(vec!["a".into(), "b".into()]),
            }
        );
    }

    #[test]
    fn test_any_of_them() {
        let expr = parse_condition("any of them").unwrap();
        assert_eq!(
            expr,
            ConditionExpr::Of {
                quantifier: Quantifier::Any,
                set: PatternSet::Them,
            }
        );
    }

    #[test]
    fn test_all_of_them() {
        let expr = parse_condition("all of them").unwrap();
        assert_eq!(
            expr,
            ConditionExpr::Of {
                quantifier: Quantifier::All,
                set: PatternSet::Them,
            }
        );
    }

    #[test]
    fn test_zero_of_parses_as_count() {
        // Rejected later at compile time; the grammar accepts any uint.
        let expr = parse_condition("0 of them").unwrap();
        assert_eq!(
            expr,
            ConditionExpr::Of {
                quantifier: Quantifier::Count(0),
                set: PatternSet::Them,
            }
        );
    }

    #[test]
    fn test_filesize_lt() {
        let expr = parse_condition("filesize < 500KB").unwrap();
        assert_eq!(
            expr,
            ConditionExpr::Size {
                op: CompareOp::Lt,
                size: SizeLiteral {
                    value: 500,
                    unit: SizeUnit::Kilobytes,
                },
            }
        );
    }

    #[test]
    fn test_filesize_operators() {
        for (input, op) in [
            ("filesize <= 10MB", CompareOp::Le),
            ("filesize > 1024", CompareOp::Gt),
            ("filesize >= 1GB", CompareOp::Ge),
            ("filesize == 68B", CompareOp::Eq),
        ] {
            match parse_condition(input).unwrap() {
                ConditionExpr::Size { op: parsed, .. } => assert_eq!(parsed, op, "{input}"),
                other => panic!("expected size comparison for {input}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_javascript_rule_condition() {
        // The shipped JavaScript rule's condition, end to end.
        let expr = parse_condition(
            "(2 of ($eval, $unescape, $write, $fromcharcode, $atob) or $xor) \
             and filesize < 500KB",
        )
        .unwrap();
        assert_eq!(
            expr,
            ConditionExpr::And(vec![
                ConditionExpr::Or(vec![
                    ConditionExpr::Of {
                        quantifier: Quantifier::Count(2),
                        set: PatternSet::Ids(vec![
                            "eval".into(),
                            "unescape".into(),
                            "write".into(),
                            "fromcharcode".into(),
                            "atob".into(),
                        ]),
                    },
                    ConditionExpr::Pattern("xor".to_string()),
                ]),
                ConditionExpr::Size {
                    op: CompareOp::Lt,
                    size: SizeLiteral {
                        value: 500,
                        unit: SizeUnit::Kilobytes,
                    },
                },
            ])
        );
    }

    #[test]
    fn test_not_of_expression() {
        let expr = parse_condition("$a and not 2 of ($b, $c)").unwrap();
        assert_eq!(
            expr,
            ConditionExpr::And(vec![
                ConditionExpr::Pattern("a".to_string()),
                ConditionExpr::Not(Box::new(ConditionExpr::Of {
                    quantifier: Quantifier::Count(2),
                    set: PatternSet::Ids(vec!["b".into(), "c".into()]),
                })),
            ])
        );
    }

    #[test]
    fn test_identifier_with_underscores_and_digits() {
        let expr = parse_condition("$str_0 and $str_1").unwrap();
        assert_eq!(
            expr,
            ConditionExpr::And(vec![
                ConditionExpr::Pattern("str_0".to_string()),
                ConditionExpr::Pattern("str_1".to_string()),
            ])
        );
    }

    #[test]
    fn test_parse_errors() {
        for input in [
            "",
            "$",
            "2 of",
            "of them",
            "filesize <",
            "filesize ~ 10MB",
            "$a and",
            "eicar", // bare identifier without sigil
            "$a && $b",
        ] {
            assert!(
                parse_condition(input).is_err(),
                "expected parse error for {input:?}"
            );
        }
    }

    #[test]
    fn test_trailing_garbage_rejected() {
        assert!(parse_condition("$a extra").is_err());
        assert!(parse_condition("filesize < 10MBx").is_err());
    }
}
