//! Chumsky grammar for Eel.

use chumsky::prelude::*;

use super::ast::*;
use crate::{lexer::Token, value::Value};

/// Type alias for our input - a slice of tokens
pub type TokenInput<'src> = &'src [Token<'src>];

/// Type alias for parser extra
pub type ParserExtra<'src> = extra::Err<Rich<'src, Token<'src>>>;

/// Strips the quotes from a double-quoted literal and resolves `\"` and `\\`.
fn unescape(literal: &str) -> String {
    let inner = &literal[1..literal.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some(escaped @ ('"' | '\\')) => out.push(escaped),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Single-quoted literals are taken verbatim between the quotes.
fn verbatim(literal: &str) -> String {
    literal[1..literal.len() - 1].to_string()
}

/// Integer-looking literals become `Int`, falling back to `Float` when out of range.
///
/// Returns `None` for literals that do not fit a finite `f64`.
fn number(text: &str) -> Option<Value> {
    if !text.contains('.') {
        if let Ok(i) = text.parse::<i64>() {
            return Some(Value::Int(i));
        }
    }
    text.parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .map(Value::Float)
}

fn string_parser<'a>() -> impl chumsky::Parser<'a, TokenInput<'a>, String, ParserExtra<'a>> + Clone {
    select_ref! {
        Token::DoubleQuoted(s) => unescape(s),
        Token::SingleQuoted(s) => verbatim(s),
    }
}

fn identifier_parser<'a>() -> impl chumsky::Parser<'a, TokenInput<'a>, String, ParserExtra<'a>> + Clone {
    select_ref! { Token::Identifier(s) => s.to_string() }
}

/// Parser for literal values: numbers (with an optional leading minus), strings and booleans.
fn literal_parser<'a>() -> impl chumsky::Parser<'a, TokenInput<'a>, Expr, ParserExtra<'a>> + Clone {
    let number_literal = just(&Token::Minus)
        .or_not()
        .then(select_ref! {
            Token::Integer(s) => *s,
            Token::Decimal(s) => *s,
        })
        .try_map(|(minus, digits), span| {
            let value = match minus {
                Some(_) => number(&format!("-{}", digits)),
                None => number(digits),
            };
            value.ok_or_else(|| Rich::custom(span, "numeric literal out of range"))
        });

    let bool_literal = select_ref! {
        Token::True => Value::Bool(true),
        Token::False => Value::Bool(false),
    };

    choice((number_literal, string_parser().map(Value::from), bool_literal)).map(Expr::Literal)
}

/// Parser for comparison operators
fn comparison_op_parser<'a>() -> impl chumsky::Parser<'a, TokenInput<'a>, BinaryOp, ParserExtra<'a>> + Clone {
    choice((
        just(&Token::Eq).to(BinaryOp::Eq),
        just(&Token::NotEq).to(BinaryOp::NotEq),
        just(&Token::LessEq).to(BinaryOp::LessEq),
        just(&Token::GreaterEq).to(BinaryOp::GreaterEq),
        just(&Token::Less).to(BinaryOp::Less),
        just(&Token::Greater).to(BinaryOp::Greater),
    ))
}

fn binary(left: Expr, (op, right): (BinaryOp, Expr)) -> Expr {
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

fn logical(op: LogicalOp) -> impl Fn(Expr, Expr) -> Expr + Clone {
    move |left, right| Expr::Logical {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

/// Build the chumsky parser for a complete Eel expression.
pub fn build_parser<'a>() -> impl chumsky::Parser<'a, TokenInput<'a>, Expr, ParserExtra<'a>> {
    let expression = recursive(|expr| {
        let arguments = expr
            .clone()
            .separated_by(just(&Token::Comma))
            .collect::<Vec<_>>()
            .delimited_by(just(&Token::LParen), just(&Token::RParen));

        // `name` or `name(args)`
        let property_or_method = identifier_parser()
            .then(arguments.or_not())
            .map(|(name, arguments)| match arguments {
                Some(arguments) => Segment::Method { name, arguments },
                None => Segment::Property(name),
            });

        let offset = expr
            .clone()
            .delimited_by(just(&Token::LBracket), just(&Token::RBracket))
            .map(|key| Segment::Offset(Box::new(key)));

        let segment = choice((just(&Token::Dot).ignore_then(property_or_method.clone()), offset));

        let path = property_or_method
            .then(segment.repeated().collect::<Vec<_>>())
            .map(|(root, segments)| Expr::Path(PathExpr { root, segments }));

        let array = expr
            .clone()
            .separated_by(just(&Token::Comma))
            .collect::<Vec<_>>()
            .delimited_by(just(&Token::LBracket), just(&Token::RBracket))
            .map(Expr::Array);

        let object_key = choice((
            identifier_parser().map(ObjectKey::Name),
            string_parser().map(|s| ObjectKey::Literal(Value::from(s))),
            select_ref! { Token::Integer(s) => *s }.try_map(|s, span| {
                number(s)
                    .map(ObjectKey::Literal)
                    .ok_or_else(|| Rich::custom(span, "numeric literal out of range"))
            }),
            expr.clone()
                .delimited_by(just(&Token::LBracket), just(&Token::RBracket))
                .map(|key| ObjectKey::Computed(Box::new(key))),
        ));

        let object = object_key
            .then_ignore(just(&Token::Colon))
            .then(expr.clone())
            .separated_by(just(&Token::Comma))
            .collect::<Vec<_>>()
            .delimited_by(just(&Token::LBrace), just(&Token::RBrace))
            .map(Expr::Object);

        let wrapped = expr.clone().delimited_by(just(&Token::LParen), just(&Token::RParen));

        let primary = choice((literal_parser(), path, array, object, wrapped)).boxed();

        let unary = recursive(|unary| {
            just(&Token::Not)
                .ignore_then(unary)
                .map(|operand| Expr::Not(Box::new(operand)))
                .or(primary)
        });

        let product_op = choice((
            just(&Token::Star).to(BinaryOp::Mul),
            just(&Token::Slash).to(BinaryOp::Div),
            just(&Token::Percent).to(BinaryOp::Mod),
        ));

        let product = unary.clone().foldl(product_op.then(unary).repeated(), binary);

        let sum_op = choice((just(&Token::Plus).to(BinaryOp::Add), just(&Token::Minus).to(BinaryOp::Sub)));

        let sum = product.clone().foldl(sum_op.then(product).repeated(), binary);

        // Comparisons do not chain: `a < b < c` is a syntax error.
        let comparison = sum
            .clone()
            .then(comparison_op_parser().then(sum).or_not())
            .map(|(left, rest)| match rest {
                Some(rest) => binary(left, rest),
                None => left,
            })
            .boxed();

        let conjunction = comparison
            .clone()
            .foldl(just(&Token::And).ignore_then(comparison).repeated(), logical(LogicalOp::And));

        let disjunction = conjunction
            .clone()
            .foldl(just(&Token::Or).ignore_then(conjunction).repeated(), logical(LogicalOp::Or));

        disjunction
            .then(
                just(&Token::Question)
                    .ignore_then(expr.clone())
                    .then_ignore(just(&Token::Colon))
                    .then(expr)
                    .or_not(),
            )
            .map(|(condition, branches)| match branches {
                Some((then, otherwise)) => Expr::Conditional {
                    condition: Box::new(condition),
                    then: Box::new(then),
                    otherwise: Box::new(otherwise),
                },
                None => condition,
            })
    });

    expression.then_ignore(end())
}
