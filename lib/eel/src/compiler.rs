//! Compiling evaluator.
//!
//! Walks the same tree as the interpreter, but instead of computing a value it emits a fragment: an S-expression that
//! the [`fragment`][crate::fragment] runtime turns into a reusable closure tree. Scratch variables (`$_1`, `$_2`,
//! ...) are numbered from a counter that starts over for every compilation.

use std::fmt::Write as _;

use tracing::debug;

use crate::{
    error::Error,
    parser::{self, Expr, LogicalOp, ObjectKey, PathExpr, Segment},
    value::Value,
};

/// Compiles `expression` into fragment source.
///
/// # Errors
///
/// If the expression cannot be parsed, an error is returned.
pub fn compile(expression: &str) -> Result<String, Error> {
    let expr = parser::parse(expression)?;
    let mut compiler = Compiler::default();
    let fragment = compiler.compile(&expr);
    debug!(expression, variables = compiler.counter, "Compiled expression.");
    Ok(fragment)
}

/// Emits fragments for parsed expressions.
#[derive(Debug, Default)]
pub struct Compiler {
    counter: usize,
}

impl Compiler {
    /// Emits the fragment for `expr`.
    pub fn compile(&mut self, expr: &Expr) -> String {
        match expr {
            Expr::Literal(value) => literal(value),
            Expr::Path(path) => self.path(path),
            Expr::Array(items) => items.iter().fold("(list)".to_string(), |collection, item| {
                format!("(push {} {})", collection, self.operand(item))
            }),
            Expr::Object(entries) => entries.iter().fold("(map)".to_string(), |collection, (key, value)| {
                // Values are emitted before keys so that both backends evaluate entries in the same order.
                let value = self.operand(value);
                let key = match key {
                    ObjectKey::Name(name) => quote(name),
                    ObjectKey::Literal(key) => literal(key),
                    ObjectKey::Computed(key) => self.operand(key),
                };
                format!("(push {} {} {})", collection, value, key)
            }),
            Expr::Not(operand) => format!("(not {})", self.operand(operand)),
            Expr::Binary { op, left, right } => {
                format!("({} {} {})", op.fragment_name(), self.operand(left), self.operand(right))
            }
            Expr::Logical { op, left, right } => {
                let left = self.operand(left);
                let var = self.next_variable();
                let right = self.compile(right);
                match op {
                    LogicalOp::And => format!("(let {var} {left} (if {var} {right} {var}))"),
                    LogicalOp::Or => format!("(let {var} {left} (if {var} {var} {right}))"),
                }
            }
            Expr::Conditional {
                condition,
                then,
                otherwise,
            } => {
                let condition = self.operand(condition);
                let then = self.compile(then);
                let otherwise = self.compile(otherwise);
                let (c, t, e) = (self.next_variable(), self.next_variable(), self.next_variable());
                format!("(let {c} {condition} (let {t} {then} (let {e} {otherwise} (if {c} {t} {e}))))")
            }
        }
    }

    fn next_variable(&mut self) -> String {
        self.counter += 1;
        format!("$_{}", self.counter)
    }

    /// Emits `expr` in an operand position, where a wrapped context must be unwrapped first.
    fn operand(&mut self, expr: &Expr) -> String {
        let inner = self.compile(expr);
        let var = self.next_variable();
        format!("(let {var} {inner} (if (context? {var}) (unwrap {var}) {var}))")
    }

    fn path(&mut self, path: &PathExpr) -> String {
        path.iter()
            .fold("$context".to_string(), |target, segment| self.segment(target, segment))
    }

    fn segment(&mut self, target: String, segment: &Segment) -> String {
        match segment {
            Segment::Property(name) => format!("(get {} {})", target, quote(name)),
            Segment::Offset(key) => format!("(get {} {})", target, self.operand(key)),
            Segment::Method { name, arguments } => {
                let mut out = format!("(call {} {}", target, quote(name));
                for argument in arguments {
                    let argument = self.operand(argument);
                    let _ = write!(out, " {}", argument);
                }
                out.push(')');
                out
            }
        }
    }
}

/// Quotes `s` as a fragment string literal.
pub(crate) fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        if matches!(c, '"' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

fn literal(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Int(i) => i.to_string(),
        // Debug formatting always keeps a `.` or an exponent, so the literal reads back as a float.
        Value::Float(f) => format!("{:?}", f),
        Value::String(s) => quote(s),
        // The parser only produces scalar literals.
        other => quote(&format!("{:?}", other)),
    }
}
