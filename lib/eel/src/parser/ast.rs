//! AST type definitions.
//!
//! Both evaluators consume the same tree: the interpreter walks it to produce a value, and the compiler walks it to
//! produce a fragment.

use crate::value::Value;

/// Arithmetic and comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    NotEq,
    Less,
    LessEq,
    Greater,
    GreaterEq,
}

impl BinaryOp {
    const ALL: [BinaryOp; 11] = [
        Self::Add,
        Self::Sub,
        Self::Mul,
        Self::Div,
        Self::Mod,
        Self::Eq,
        Self::NotEq,
        Self::Less,
        Self::LessEq,
        Self::Greater,
        Self::GreaterEq,
    ];

    /// Returns the operator as written in Eel source.
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Mod => "%",
            Self::Eq => "==",
            Self::NotEq => "!=",
            Self::Less => "<",
            Self::LessEq => "<=",
            Self::Greater => ">",
            Self::GreaterEq => ">=",
        }
    }

    /// Returns the head of the fragment form implementing this operator.
    pub fn fragment_name(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Sub => "sub",
            Self::Mul => "mul",
            Self::Div => "div",
            Self::Mod => "mod",
            Self::Eq => "eq",
            Self::NotEq => "ne",
            Self::Less => "lt",
            Self::LessEq => "le",
            Self::Greater => "gt",
            Self::GreaterEq => "ge",
        }
    }

    /// Looks up an operator by its fragment form head.
    pub fn from_fragment_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.fragment_name() == name)
    }

    /// Returns `true` for `==`, `!=`, `<`, `<=`, `>` and `>=`.
    pub fn is_comparison(self) -> bool {
        !matches!(self, Self::Add | Self::Sub | Self::Mul | Self::Div | Self::Mod)
    }
}

/// Short-circuiting logical operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

impl LogicalOp {
    /// Returns the operator as written in Eel source.
    pub fn symbol(self) -> &'static str {
        match self {
            Self::And => "&&",
            Self::Or => "||",
        }
    }
}

/// A single step of an object path.
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    /// `.name`, or a bare identifier at the start of a path.
    Property(String),

    /// `[expr]`
    Offset(Box<Expr>),

    /// `.name(args)`, or `name(args)` at the start of a path.
    Method { name: String, arguments: Vec<Expr> },
}

/// An object path such as `a.b[0].c(1)`.
#[derive(Debug, Clone, PartialEq)]
pub struct PathExpr {
    /// First segment, resolved against the evaluation context. Never an offset.
    pub root: Segment,

    /// Remaining segments, each resolved against the result of the previous one.
    pub segments: Vec<Segment>,
}

impl PathExpr {
    /// Iterates over every segment, root first.
    pub fn iter(&self) -> impl Iterator<Item = &Segment> {
        std::iter::once(&self.root).chain(self.segments.iter())
    }
}

/// Key of an object literal entry.
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectKey {
    /// `{name: ...}`
    Name(String),

    /// `{"name": ...}` or `{1: ...}`
    Literal(Value),

    /// `{[expr]: ...}`
    Computed(Box<Expr>),
}

/// Expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Path(PathExpr),
    Array(Vec<Expr>),
    Object(Vec<(ObjectKey, Expr)>),
    Not(Box<Expr>),
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Logical {
        op: LogicalOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Conditional {
        condition: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
}
