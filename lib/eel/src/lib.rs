//! Eel: a small embedded expression language.
//!
//! Expressions such as `node.children('item')[0].title + ' (' + count + ')'` are evaluated against a [`Context`],
//! which wraps a dynamic [`Value`] graph and resolves properties, offsets and method calls against it.
//!
//! Two evaluators share a single parser:
//!
//! - the interpreter ([`evaluate`], [`Interpreter`]) walks the parsed tree directly, and
//! - the compiler ([`compile`], [`compile_expression`]) emits a fragment that is compiled once into a reusable
//!   [`CompiledExpression`]. [`ExpressionCache`] shares compiled expressions between callers.
//!
//! Both produce the same results for the same expression and context.
//!
//! # Example
//!
//! ```
//! use eel::{Context, Value};
//!
//! let context = Context::new(Value::map([("a", Value::map([("b", 41)]))]));
//! assert_eq!(eel::evaluate("a.b + 1", &context).unwrap(), Value::Int(42));
//!
//! let compiled = eel::compile_expression("a.b + 1").unwrap();
//! assert_eq!(compiled.invoke(&context).unwrap(), Value::Int(42));
//! ```

use serde::Deserialize;

mod cache;
pub use self::cache::ExpressionCache;

mod compiler;
pub use self::compiler::{compile, Compiler};

mod context;
pub use self::context::{AllowList, Context, DeniedCallPolicy, Resolution};

mod error;
pub use self::error::{BoxError, Error, EvalError, FragmentError, SyntaxError};

mod fragment;
pub use self::fragment::CompiledExpression;

mod interpreter;
pub use self::interpreter::Interpreter;

pub mod lexer;

mod ops;

pub mod parser;

mod value;
pub use self::value::{EelObject, Function, Map, Value};

/// Options shared by both evaluators.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
pub struct EvaluationOptions {
    /// What to do when a protected context rejects a method call.
    #[serde(default)]
    pub denied_calls: DeniedCallPolicy,
}

/// Parses and evaluates `expression` against `context` with the interpreter and default options.
///
/// # Errors
///
/// If the expression cannot be parsed, or evaluation fails, an error is returned.
pub fn evaluate(expression: &str, context: &Context) -> Result<Value, Error> {
    Interpreter::default().evaluate(expression, context)
}

/// Compiles `expression` all the way to a reusable [`CompiledExpression`].
///
/// # Errors
///
/// If the expression cannot be parsed, an error is returned.
pub fn compile_expression(expression: &str) -> Result<CompiledExpression, Error> {
    CompiledExpression::from_fragment(compile(expression)?)
}
