use std::{fmt, ops::Range};

use logos::Logos;

use crate::error::SyntaxError;

/// Eel language tokens.
#[derive(Logos, Debug, PartialEq, Eq, Clone, Hash)]
#[logos(skip r"[ \t\r\n]+")]
pub enum Token<'a> {
    // ===== Logical operators =====
    #[token("&&")]
    #[token("and")]
    And,

    #[token("||")]
    #[token("or")]
    Or,

    #[token("!")]
    #[token("not")]
    Not,

    // ===== Boolean literals =====
    #[token("true", ignore(case))]
    True,

    #[token("false", ignore(case))]
    False,

    // ===== Comparison operators =====
    #[token("==")]
    Eq,

    #[token("!=")]
    NotEq,

    #[token("<=")]
    LessEq,

    #[token(">=")]
    GreaterEq,

    #[token("<")]
    Less,

    #[token(">")]
    Greater,

    // ===== Arithmetic operators =====
    #[token("+")]
    Plus,

    #[token("-")]
    Minus,

    #[token("*")]
    Star,

    #[token("/")]
    Slash,

    #[token("%")]
    Percent,

    // ===== Delimiters =====
    #[token("(")]
    LParen,

    #[token(")")]
    RParen,

    #[token("[")]
    LBracket,

    #[token("]")]
    RBracket,

    #[token("{")]
    LBrace,

    #[token("}")]
    RBrace,

    #[token(",")]
    Comma,

    #[token(".")]
    Dot,

    #[token(":")]
    Colon,

    #[token("?")]
    Question,

    // ===== Literals =====
    /// Double-quoted string, quotes included: "..."
    #[regex(r#""[^"\\]*(?:\\.[^"\\]*)*""#, |lex| lex.slice())]
    DoubleQuoted(&'a str),

    /// Single-quoted string, quotes included: '...'
    #[regex(r"'[^'\\]*(?:\\.[^'\\]*)*'", |lex| lex.slice())]
    SingleQuoted(&'a str),

    /// Decimal literal: 6.14, .5
    #[regex(r"[0-9]*\.[0-9]+", |lex| lex.slice())]
    Decimal(&'a str),

    /// Integer literal: 42
    #[regex(r"[0-9]+", priority = 2, callback = |lex| lex.slice())]
    Integer(&'a str),

    // ===== Identifiers =====
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_-]*", priority = 1, callback = |lex| lex.slice())]
    Identifier(&'a str),
}

impl fmt::Display for Token<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            Self::And => "&&",
            Self::Or => "||",
            Self::Not => "!",
            Self::True => "true",
            Self::False => "false",
            Self::Eq => "==",
            Self::NotEq => "!=",
            Self::LessEq => "<=",
            Self::GreaterEq => ">=",
            Self::Less => "<",
            Self::Greater => ">",
            Self::Plus => "+",
            Self::Minus => "-",
            Self::Star => "*",
            Self::Slash => "/",
            Self::Percent => "%",
            Self::LParen => "(",
            Self::RParen => ")",
            Self::LBracket => "[",
            Self::RBracket => "]",
            Self::LBrace => "{",
            Self::RBrace => "}",
            Self::Comma => ",",
            Self::Dot => ".",
            Self::Colon => ":",
            Self::Question => "?",
            Self::DoubleQuoted(s)
            | Self::SingleQuoted(s)
            | Self::Decimal(s)
            | Self::Integer(s)
            | Self::Identifier(s) => s,
        };
        f.write_str(symbol)
    }
}

/// Tokens paired with their byte spans in the source.
pub type SpannedTokens<'a> = Vec<(Token<'a>, Range<usize>)>;

/// Tokenizes `input`, keeping the byte span of every token.
///
/// # Errors
///
/// If any part of the input is not a valid token, a [`SyntaxError`] pointing at it is returned.
pub fn tokenize(input: &str) -> Result<SpannedTokens<'_>, SyntaxError> {
    let mut lexer = Token::lexer(input);
    let mut tokens = Vec::new();
    while let Some(result) = lexer.next() {
        match result {
            Ok(token) => tokens.push((token, lexer.span())),
            Err(()) => {
                let span = lexer.span();
                return Err(SyntaxError {
                    position: span.start,
                    found: format!("'{}'", &input[span]),
                    expected: Vec::new(),
                });
            }
        }
    }
    Ok(tokens)
}
