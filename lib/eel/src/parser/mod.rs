//! Eel parser.
//!
//! This module is split into submodules:
//! - `ast`: AST type definitions
//! - `grammar`: Chumsky parser

mod ast;
mod grammar;

pub use ast::*;
use chumsky::Parser as _;
use tracing::trace;

use crate::{error::SyntaxError, lexer};

/// Parses `source` into an expression tree.
///
/// # Errors
///
/// If `source` is not a complete, valid Eel expression, a [`SyntaxError`] is returned carrying the byte offset of the
/// first offending token (or the end of the input).
pub fn parse(source: &str) -> Result<Expr, SyntaxError> {
    let (tokens, spans): (Vec<_>, Vec<_>) = lexer::tokenize(source)?.into_iter().unzip();

    let result = grammar::build_parser()
        .parse(&tokens[..])
        .into_result()
        .map_err(|errors| {
            let Some(error) = errors.into_iter().next() else {
                return SyntaxError {
                    position: 0,
                    found: "end of input".to_string(),
                    expected: Vec::new(),
                };
            };

            let index = error.span().start;
            let (position, found) = match spans.get(index) {
                Some(span) => (span.start, format!("'{}'", &source[span.clone()])),
                None => (source.len(), "end of input".to_string()),
            };
            let expected = error.expected().map(|pattern| pattern.to_string()).collect();

            trace!(position, found = %found, "Failed to parse expression.");
            SyntaxError {
                position,
                found,
                expected,
            }
        });
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    fn lit<V: Into<Value>>(value: V) -> Expr {
        Expr::Literal(value.into())
    }

    fn prop(name: &str) -> Expr {
        Expr::Path(PathExpr {
            root: Segment::Property(name.to_string()),
            segments: Vec::new(),
        })
    }

    fn bin(op: BinaryOp, left: Expr, right: Expr) -> Expr {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    #[test]
    fn literals() {
        assert_eq!(parse("42").unwrap(), lit(42));
        assert_eq!(parse("-3").unwrap(), lit(-3));
        assert_eq!(parse("1.5").unwrap(), lit(1.5));
        assert_eq!(parse("-.5").unwrap(), lit(-0.5));
        assert_eq!(parse("TRUE").unwrap(), lit(true));
        assert_eq!(parse(r#""say \"hi\" \\ \n""#).unwrap(), lit(r#"say "hi" \ \n"#));
        assert_eq!(parse(r"'it\'s'").unwrap(), lit(r"it\'s"));
        assert_eq!(parse("99999999999999999999").unwrap(), lit(1e20));
    }

    #[test]
    fn precedence() {
        assert_eq!(
            parse("1 + 2 * 3").unwrap(),
            bin(BinaryOp::Add, lit(1), bin(BinaryOp::Mul, lit(2), lit(3)))
        );
        assert_eq!(
            parse("1 - 2 - 3").unwrap(),
            bin(BinaryOp::Sub, bin(BinaryOp::Sub, lit(1), lit(2)), lit(3))
        );
        assert_eq!(
            parse("a + 1 == 2").unwrap(),
            bin(BinaryOp::Eq, bin(BinaryOp::Add, prop("a"), lit(1)), lit(2))
        );
        assert_eq!(parse("2 - -1").unwrap(), bin(BinaryOp::Sub, lit(2), lit(-1)));

        let Expr::Logical { op, left, .. } = parse("a && b || c").unwrap() else {
            panic!("expected logical expression");
        };
        assert_eq!(op, LogicalOp::Or);
        assert!(matches!(*left, Expr::Logical { op: LogicalOp::And, .. }));

        assert_eq!(parse("!!a").unwrap(), Expr::Not(Box::new(Expr::Not(Box::new(prop("a"))))));
    }

    #[test]
    fn ternary_is_right_associative() {
        let Expr::Conditional { otherwise, .. } = parse("a ? 1 : b ? 2 : 3").unwrap() else {
            panic!("expected conditional");
        };
        assert!(matches!(*otherwise, Expr::Conditional { .. }));

        let Expr::Conditional { then, .. } = parse("a ? b ? 1 : 2 : 3").unwrap() else {
            panic!("expected conditional");
        };
        assert!(matches!(*then, Expr::Conditional { .. }));
    }

    #[test]
    fn paths() {
        let Expr::Path(path) = parse("q(node).children('x')[0].name").unwrap() else {
            panic!("expected path");
        };
        assert_eq!(
            path.root,
            Segment::Method {
                name: "q".to_string(),
                arguments: vec![prop("node")],
            }
        );
        assert_eq!(path.segments.len(), 3);
        assert_eq!(
            path.segments[0],
            Segment::Method {
                name: "children".to_string(),
                arguments: vec![lit("x")],
            }
        );
        assert_eq!(path.segments[1], Segment::Offset(Box::new(lit(0))));
        assert_eq!(path.segments[2], Segment::Property("name".to_string()));
    }

    #[test]
    fn collections() {
        assert_eq!(parse("[]").unwrap(), Expr::Array(Vec::new()));
        assert_eq!(parse("{}").unwrap(), Expr::Object(Vec::new()));
        assert_eq!(parse("[1, 'a']").unwrap(), Expr::Array(vec![lit(1), lit("a")]));
        assert_eq!(
            parse("{a: 1, 'b': 2, 3: 4, [c]: 5}").unwrap(),
            Expr::Object(vec![
                (ObjectKey::Name("a".to_string()), lit(1)),
                (ObjectKey::Literal(Value::from("b")), lit(2)),
                (ObjectKey::Literal(Value::Int(3)), lit(4)),
                (ObjectKey::Computed(Box::new(prop("c"))), lit(5)),
            ])
        );
    }

    #[test]
    fn syntax_errors_point_at_offending_input() {
        let err = parse("1 +").unwrap_err();
        assert_eq!(err.position, 3);
        assert_eq!(err.found, "end of input");

        let err = parse("a b").unwrap_err();
        assert_eq!(err.position, 2);
        assert_eq!(err.found, "'b'");

        let err = parse("1 < 2 < 3").unwrap_err();
        assert_eq!(err.position, 6);

        let err = parse("").unwrap_err();
        assert_eq!(err.position, 0);

        assert!(parse("foo(").is_err());
        assert!(parse("-a").is_err());
    }

    #[test]
    fn numeric_literals_must_be_finite() {
        let huge = format!("1{}", "0".repeat(400));
        assert_eq!(parse(&huge).unwrap_err().position, 0);

        let err = parse(&format!("2 + -{}", huge)).unwrap_err();
        assert_eq!(err.position, 4);

        assert_eq!(parse("99999999999999999999").unwrap(), lit(1e20));
    }
}
