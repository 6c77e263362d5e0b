//! Fragment runtime.
//!
//! Fragments are the compiler's output: small S-expressions over a handful of forms. A fragment is compiled once into
//! a tree of boxed closures, which can then be invoked any number of times, from any number of threads, against
//! different contexts.
//!
//! | Form                        | Meaning                                                      |
//! |-----------------------------|--------------------------------------------------------------|
//! | `(let $_N value body)`      | bind `value` to `$_N` while evaluating `body`                |
//! | `(if test then else)`       | branch on the truthiness of `test`                           |
//! | `(context? x)`              | `true` if `x` is a wrapped context                           |
//! | `(unwrap x)`                | the value wrapped by context `x`                             |
//! | `(list)`, `(map)`           | a new, empty, wrapped collection                             |
//! | `(push c v [k])`            | push `v` (under `k`) onto collection `c`                     |
//! | `(get t k)`                 | resolve `k` against `t`                                      |
//! | `(call t "m" args...)`      | call method `m` on `t`                                       |
//! | `(not x)`                   | boolean negation                                             |
//! | `(add a b)` ... `(ge a b)`  | binary operators                                             |

mod reader;

use std::fmt;

use tracing::debug;

use self::reader::{Node, NodeKind};
use crate::{
    context::{Context, DeniedCallPolicy},
    error::{Error, EvalError, FragmentError},
    ops,
    parser::BinaryOp,
    value::{Map, Value},
    EvaluationOptions,
};

/// Intermediate result: either a plain value or a wrapped context.
#[derive(Clone, Debug)]
enum Term {
    Value(Value),
    Context(Context),
}

impl Default for Term {
    fn default() -> Self {
        Self::Value(Value::Null)
    }
}

impl Term {
    fn into_value(self) -> Value {
        match self {
            Self::Value(value) => value,
            Self::Context(context) => context.into_inner(),
        }
    }

    fn into_context(self) -> Context {
        match self {
            Self::Value(value) => Context::new(value),
            Self::Context(context) => context,
        }
    }

    fn is_truthy(&self) -> bool {
        match self {
            Self::Value(value) => value.is_truthy(),
            Self::Context(context) => context.unwrap().is_truthy(),
        }
    }
}

struct Frame {
    root: Context,
    slots: Vec<Term>,
    denied_calls: DeniedCallPolicy,
}

type Closure = Box<dyn Fn(&mut Frame) -> Result<Term, EvalError> + Send + Sync>;

fn invalid(node: &Node<'_>, message: impl Into<String>) -> Error {
    Error::from(FragmentError {
        position: node.position,
        message: message.into(),
    })
}

fn closure<F>(f: F) -> Closure
where
    F: Fn(&mut Frame) -> Result<Term, EvalError> + Send + Sync + 'static,
{
    Box::new(f)
}

fn constant(value: Value) -> Closure {
    closure(move |_| Ok(Term::Value(value.clone())))
}

/// Compiles fragment nodes into closures, tracking which scratch variables are in scope.
///
/// Every `let` gets its own frame slot, so the frame size depends on the fragment's shape rather than on the variable
/// numbers it happens to use, and a nested `let` of an already bound variable shadows it.
#[derive(Default)]
struct Builder {
    // (variable, slot) pairs, innermost last.
    scope: Vec<(usize, usize)>,
    slots: usize,
}

impl Builder {
    fn build(&mut self, node: &Node<'_>) -> Result<Closure, Error> {
        match &node.kind {
            NodeKind::Integer(i) => Ok(constant(Value::Int(*i))),
            NodeKind::Float(f) => Ok(constant(Value::Float(*f))),
            NodeKind::String(s) => Ok(constant(Value::from(s.as_str()))),
            NodeKind::Symbol("true") => Ok(constant(Value::Bool(true))),
            NodeKind::Symbol("false") => Ok(constant(Value::Bool(false))),
            NodeKind::Symbol("null") => Ok(constant(Value::Null)),
            NodeKind::Symbol(symbol) => Err(invalid(node, format!("unexpected symbol '{}'", symbol))),
            NodeKind::Context => Ok(closure(|frame| Ok(Term::Context(frame.root.clone())))),
            NodeKind::Variable(index) => {
                let Some(&(_, slot)) = self.scope.iter().rev().find(|(variable, _)| variable == index) else {
                    return Err(invalid(node, format!("unbound variable $_{}", index)));
                };
                Ok(closure(move |frame| Ok(frame.slots[slot].clone())))
            }
            NodeKind::List(items) => self.build_form(node, items),
        }
    }

    fn build_form(&mut self, node: &Node<'_>, items: &[Node<'_>]) -> Result<Closure, Error> {
        let Some((head, args)) = items.split_first() else {
            return Err(invalid(node, "empty form"));
        };
        let NodeKind::Symbol(name) = head.kind else {
            return Err(invalid(head, "expected a form name"));
        };

        let arity = |expected: &[usize]| -> Result<(), Error> {
            if expected.contains(&args.len()) {
                Ok(())
            } else {
                Err(invalid(
                    node,
                    format!("'{}' takes {:?} arguments, got {}", name, expected, args.len()),
                ))
            }
        };

        match name {
            "let" => {
                arity(&[3])?;
                let NodeKind::Variable(index) = args[0].kind else {
                    return Err(invalid(&args[0], "expected a variable"));
                };
                let value = self.build(&args[1])?;
                let slot = self.slots;
                self.slots += 1;
                self.scope.push((index, slot));
                let body = self.build(&args[2]);
                self.scope.pop();
                let body = body?;
                Ok(closure(move |frame| {
                    let bound = value(frame)?;
                    frame.slots[slot] = bound;
                    body(frame)
                }))
            }
            "if" => {
                arity(&[3])?;
                let test = self.build(&args[0])?;
                let then = self.build(&args[1])?;
                let otherwise = self.build(&args[2])?;
                Ok(closure(move |frame| {
                    if test(frame)?.is_truthy() {
                        then(frame)
                    } else {
                        otherwise(frame)
                    }
                }))
            }
            "context?" => {
                arity(&[1])?;
                let operand = self.build(&args[0])?;
                Ok(closure(move |frame| {
                    Ok(Term::Value(Value::Bool(matches!(operand(frame)?, Term::Context(_)))))
                }))
            }
            "unwrap" => {
                arity(&[1])?;
                let operand = self.build(&args[0])?;
                Ok(closure(move |frame| Ok(Term::Value(operand(frame)?.into_value()))))
            }
            "not" => {
                arity(&[1])?;
                let operand = self.build(&args[0])?;
                Ok(closure(move |frame| Ok(Term::Value(Value::Bool(!operand(frame)?.is_truthy())))))
            }
            "list" => {
                arity(&[0])?;
                Ok(closure(|_| Ok(Term::Context(Context::new(Value::from(Vec::new()))))))
            }
            "map" => {
                arity(&[0])?;
                Ok(closure(|_| Ok(Term::Context(Context::new(Value::from(Map::new()))))))
            }
            "push" => {
                arity(&[2, 3])?;
                let collection = self.build(&args[0])?;
                let value = self.build(&args[1])?;
                let key = args.get(2).map(|key| self.build(key)).transpose()?;
                Ok(closure(move |frame| {
                    let mut collection = collection(frame)?.into_context();
                    let value = value(frame)?.into_value();
                    let key = match &key {
                        Some(key) => Some(key(frame)?.into_value()),
                        None => None,
                    };
                    collection.push(value, key.as_ref())?;
                    Ok(Term::Context(collection))
                }))
            }
            "get" => {
                arity(&[2])?;
                let target = self.build(&args[0])?;
                let key = self.build(&args[1])?;
                Ok(closure(move |frame| {
                    let target = target(frame)?.into_context();
                    let key = key(frame)?.into_value();
                    Ok(Term::Context(target.get_and_wrap(&key)))
                }))
            }
            "call" => {
                if args.len() < 2 {
                    return Err(invalid(node, "'call' takes a target and a method name"));
                }
                let target = self.build(&args[0])?;
                let NodeKind::String(method) = &args[1].kind else {
                    return Err(invalid(&args[1], "expected a method name string"));
                };
                let method = method.clone();
                let arguments = args[2..]
                    .iter()
                    .map(|argument| self.build(argument))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(closure(move |frame| {
                    let target = target(frame)?.into_context();
                    let arguments = arguments
                        .iter()
                        .map(|argument| argument(frame).map(Term::into_value))
                        .collect::<Result<Vec<_>, _>>()?;
                    target
                        .call_and_wrap_with(&method, &arguments, frame.denied_calls)
                        .map(Term::Context)
                }))
            }
            operator => {
                let Some(op) = BinaryOp::from_fragment_name(operator) else {
                    return Err(Error::from(EvalError::UnsupportedOperator {
                        operator: operator.to_string(),
                    }));
                };
                arity(&[2])?;
                let left = self.build(&args[0])?;
                let right = self.build(&args[1])?;
                Ok(closure(move |frame| {
                    let left = left(frame)?.into_value();
                    let right = right(frame)?.into_value();
                    ops::binary(op, &left, &right).map(Term::Value)
                }))
            }
        }
    }
}

/// A compiled, reusable expression.
///
/// `CompiledExpression` is immutable: every invocation gets a fresh set of scratch variables, so a single instance can
/// be shared across threads.
pub struct CompiledExpression {
    fragment: String,
    root: Closure,
    slots: usize,
}

impl CompiledExpression {
    /// Compiles fragment source, as produced by [`compile`][crate::compile].
    ///
    /// # Errors
    ///
    /// If the fragment is malformed or references an unbound variable, [`Error::Fragment`] is returned. If it uses an
    /// unknown form, [`EvalError::UnsupportedOperator`] is returned.
    pub fn from_fragment<S: Into<String>>(fragment: S) -> Result<Self, Error> {
        let fragment = fragment.into();
        let node = reader::read(&fragment)?;
        let mut builder = Builder::default();
        let root = builder.build(&node)?;
        let slots = builder.slots;
        debug!(slots, len = fragment.len(), "Compiled fragment.");
        Ok(Self { fragment, root, slots })
    }

    /// Returns the fragment source this expression was compiled from.
    pub fn fragment(&self) -> &str {
        &self.fragment
    }

    /// Invokes the expression against `context` with default options, returning the unwrapped result.
    ///
    /// # Errors
    ///
    /// If evaluation fails, an error is returned.
    pub fn invoke(&self, context: &Context) -> Result<Value, EvalError> {
        self.invoke_with(context, &EvaluationOptions::default())
    }

    /// Invokes the expression against `context`, returning the unwrapped result.
    ///
    /// # Errors
    ///
    /// If evaluation fails, an error is returned.
    pub fn invoke_with(&self, context: &Context, options: &EvaluationOptions) -> Result<Value, EvalError> {
        let mut frame = Frame {
            root: context.clone(),
            slots: vec![Term::default(); self.slots],
            denied_calls: options.denied_calls,
        };
        (self.root)(&mut frame).map(Term::into_value)
    }
}

impl fmt::Debug for CompiledExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledExpression")
            .field("fragment", &self.fragment)
            .field("slots", &self.slots)
            .finish()
    }
}
