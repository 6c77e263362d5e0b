//! Reader for fragment source text.

use logos::Logos;

use crate::error::FragmentError;

#[derive(Logos, Debug, PartialEq, Clone)]
#[logos(skip r"[ \t\r\n]+")]
enum FragmentToken<'a> {
    #[token("(")]
    Open,

    #[token(")")]
    Close,

    #[token("$context")]
    Context,

    #[regex(r"\$_[0-9]+", |lex| lex.slice()[2..].parse::<usize>().ok())]
    Variable(usize),

    #[regex(r"-?[0-9]+", |lex| lex.slice())]
    Integer(&'a str),

    #[regex(r"-?[0-9]+\.[0-9]+([eE][-+]?[0-9]+)?|-?[0-9]+[eE][-+]?[0-9]+", |lex| lex.slice())]
    Float(&'a str),

    #[regex(r#""([^"\\]|\\.)*""#, |lex| lex.slice())]
    String(&'a str),

    #[regex(r"[a-z][a-z?]*", |lex| lex.slice())]
    Symbol(&'a str),
}

/// A node of the fragment syntax tree.
#[derive(Debug, PartialEq)]
pub(super) enum NodeKind<'a> {
    Integer(i64),
    Float(f64),
    String(String),
    Symbol(&'a str),
    Context,
    Variable(usize),
    List(Vec<Node<'a>>),
}

#[derive(Debug, PartialEq)]
pub(super) struct Node<'a> {
    pub kind: NodeKind<'a>,
    pub position: usize,
}

fn error(position: usize, message: impl Into<String>) -> FragmentError {
    FragmentError {
        position,
        message: message.into(),
    }
}

fn unquote(literal: &str) -> String {
    let inner = &literal[1..literal.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut escaped = false;
    for c in inner.chars() {
        if escaped {
            if !matches!(c, '"' | '\\') {
                out.push('\\');
            }
            out.push(c);
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else {
            out.push(c);
        }
    }
    out
}

/// Reads exactly one node from `source`.
pub(super) fn read(source: &str) -> Result<Node<'_>, FragmentError> {
    let mut lexer = FragmentToken::lexer(source);
    let mut tokens = Vec::new();
    while let Some(result) = lexer.next() {
        match result {
            Ok(token) => tokens.push((token, lexer.span().start)),
            Err(()) => return Err(error(lexer.span().start, format!("unexpected '{}'", lexer.slice()))),
        }
    }

    let mut tokens = tokens.into_iter().peekable();
    let node = read_node(&mut tokens, source.len())?;
    match tokens.next() {
        None => Ok(node),
        Some((_, position)) => Err(error(position, "trailing input after fragment")),
    }
}

fn read_node<'a, I>(tokens: &mut std::iter::Peekable<I>, end: usize) -> Result<Node<'a>, FragmentError>
where
    I: Iterator<Item = (FragmentToken<'a>, usize)>,
{
    let Some((token, position)) = tokens.next() else {
        return Err(error(end, "unexpected end of fragment"));
    };

    let kind = match token {
        FragmentToken::Open => {
            let mut items = Vec::new();
            loop {
                match tokens.peek() {
                    Some((FragmentToken::Close, _)) => {
                        tokens.next();
                        break;
                    }
                    Some(_) => items.push(read_node(tokens, end)?),
                    None => return Err(error(end, "unclosed form")),
                }
            }
            NodeKind::List(items)
        }
        FragmentToken::Close => return Err(error(position, "unexpected ')'")),
        FragmentToken::Context => NodeKind::Context,
        FragmentToken::Variable(index) => NodeKind::Variable(index),
        FragmentToken::Integer(digits) => match digits.parse::<i64>() {
            Ok(i) => NodeKind::Integer(i),
            Err(_) => return Err(error(position, format!("integer '{}' out of range", digits))),
        },
        FragmentToken::Float(digits) => match digits.parse::<f64>() {
            Ok(f) => NodeKind::Float(f),
            Err(_) => return Err(error(position, format!("invalid float '{}'", digits))),
        },
        FragmentToken::String(literal) => NodeKind::String(unquote(literal)),
        FragmentToken::Symbol(symbol) => NodeKind::Symbol(symbol),
    };

    Ok(Node { kind, position })
}
