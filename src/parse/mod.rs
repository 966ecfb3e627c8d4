//! Rule text → [`Node`] tree.
//!
//! Rule text is a sequence of `attribute comparator value` conditions joined
//! by the uppercase keywords `AND` / `OR`, with parentheses for grouping:
//!
//! ```text
//! (age > 30 AND department = 'Sales') OR experience > 5
//! ```
//!
//! Tokens are whitespace separated, except that comparators and parentheses
//! split on their own. A word is a keyword only when it is exactly `AND` or
//! `OR`, so attributes such as `Amount` or `ORDERS` are never mistaken for
//! one. Both keywords have the same precedence and associate left to right;
//! use parentheses to group differently.

mod error;
mod lexer;
mod parser;

pub use error::ParseError;
pub use parser::ParseOptions;

use crate::Node;

/// Parse rule text into a tree using the default [`ParseOptions`].
///
/// # Errors
///
/// Returns [`ParseError`] if the text is not a well-formed rule.
pub fn parse(rule_text: &str) -> Result<Node, ParseError> {
    parse_with(rule_text, &ParseOptions::default())
}

/// Parse rule text into a tree with explicit limits.
///
/// # Errors
///
/// Returns [`ParseError`] if the text is not a well-formed rule or exceeds
/// the configured nesting depth.
pub fn parse_with(rule_text: &str, options: &ParseOptions) -> Result<Node, ParseError> {
    let tokens = lexer::tokenize(rule_text)?;
    let root = parser::build(&tokens, rule_text.len(), *options)?;
    tracing::debug!(
        conditions = root.leaf_count(),
        operators = root.operator_count(),
        "parsed rule"
    );
    Ok(root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{attr, BoolOp, Comparator, Value};

    fn op_of(node: &Node) -> BoolOp {
        match node {
            Node::Operator { op, .. } => *op,
            other => panic!("expected operator, got {other:?}"),
        }
    }

    #[test]
    fn parse_single_condition() {
        assert_eq!(parse("age > 30").unwrap(), attr("age").gt(30));
    }

    #[test]
    fn parse_all_comparators() {
        let cases = [
            (">", Comparator::Gt),
            ("<", Comparator::Lt),
            ("=", Comparator::Eq),
        ];
        for (sym, expected) in cases {
            let node = parse(&format!("x {sym} 1")).unwrap();
            match &node {
                Node::Operand(cond) => assert_eq!(cond.comparator, expected, "failed for {sym}"),
                other => panic!("expected operand for {sym}, got {other:?}"),
            }
        }
    }

    #[test]
    fn parse_value_types() {
        let cases = [
            ("42", Value::Int(42)),
            ("-7", Value::Int(-7)),
            ("3.5", Value::Float(3.5)),
            ("'Sales'", Value::from("Sales")),
            ("\"Sales\"", Value::from("Sales")),
            ("Sales", Value::from("Sales")),
            ("'42'", Value::from("42")),
        ];
        for (literal, expected) in cases {
            let node = parse(&format!("x = {literal}")).unwrap();
            match &node {
                Node::Operand(cond) => assert_eq!(cond.value, expected, "failed for {literal}"),
                other => panic!("expected operand for {literal}, got {other:?}"),
            }
        }
    }

    #[test]
    fn quoted_number_is_numeric_for_ordering() {
        assert_eq!(parse("age > '30'").unwrap(), attr("age").gt(30));
    }

    #[test]
    fn parse_and() {
        let node = parse("age > 30 AND department = 'Sales'").unwrap();
        assert_eq!(node, attr("age").gt(30).and(attr("department").eq("Sales")));
    }

    #[test]
    fn keywords_associate_left_to_right() {
        let node = parse("a = 1 OR b = 2 AND c = 3").unwrap();
        assert_eq!(
            node,
            attr("a").eq(1).or(attr("b").eq(2)).and(attr("c").eq(3))
        );
    }

    #[test]
    fn parentheses_group() {
        let node = parse("a = 1 OR (b = 2 AND c = 3)").unwrap();
        assert_eq!(op_of(&node), BoolOp::Or);
        assert_eq!(
            node,
            attr("a").eq(1).or(attr("b").eq(2).and(attr("c").eq(3)))
        );
    }

    #[test]
    fn nested_parentheses() {
        let node = parse("((age > 30 AND department = 'Sales') OR (age < 25 AND department = 'Marketing')) AND (salary > 50000 OR experience > 5)").unwrap();
        assert_eq!(node.leaf_count(), 6);
        assert_eq!(node.operator_count(), 5);
        assert_eq!(op_of(&node), BoolOp::And);
    }

    #[test]
    fn redundant_parentheses_are_transparent() {
        assert_eq!(parse("((age > 30))").unwrap(), parse("age > 30").unwrap());
    }

    #[test]
    fn attributes_starting_with_keyword_letters() {
        let node = parse("Amount > 5 AND Orders < 3 OR ANDROID = 1").unwrap();
        let attrs: Vec<&str> = node.attributes().into_iter().collect();
        assert_eq!(attrs, ["ANDROID", "Amount", "Orders"]);
    }

    #[test]
    fn two_field_condition_is_malformed() {
        assert!(matches!(
            parse("age 30"),
            Err(ParseError::MalformedCondition { .. })
        ));
    }

    #[test]
    fn lowercase_keyword_rejected() {
        assert_eq!(
            parse("age > 30 and salary > 5"),
            Err(ParseError::UnsupportedOperator {
                operator: "and".into(),
                offset: 9,
            })
        );
    }

    #[test]
    fn unsupported_comparator() {
        assert_eq!(
            parse("age >= 30"),
            Err(ParseError::UnsupportedOperator {
                operator: ">=".into(),
                offset: 4,
            })
        );
    }

    #[test]
    fn depth_limit() {
        let opts = ParseOptions::new().max_depth(2);
        assert!(parse_with("((a = 1))", &opts).is_ok());
        assert_eq!(
            parse_with("(((a = 1)))", &opts),
            Err(ParseError::NestingTooDeep { limit: 2 })
        );
    }

    #[test]
    fn empty_input() {
        assert_eq!(parse(""), Err(ParseError::Empty));
        assert_eq!(parse("   "), Err(ParseError::Empty));
    }
}
