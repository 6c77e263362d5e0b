//! Interpreting evaluator.

use tracing::trace;

use crate::{
    context::Context,
    error::{Error, EvalError},
    ops,
    parser::{self, Expr, LogicalOp, ObjectKey, PathExpr, Segment},
    value::{Map, Value},
    EvaluationOptions,
};

/// Evaluates expressions by walking the parsed tree.
#[derive(Clone, Debug, Default)]
pub struct Interpreter {
    options: EvaluationOptions,
}

impl Interpreter {
    /// Creates a new `Interpreter` with the given options.
    pub fn new(options: EvaluationOptions) -> Self {
        Self { options }
    }

    /// Parses and evaluates `expression` against `context`, returning the unwrapped result.
    ///
    /// # Errors
    ///
    /// If the expression cannot be parsed, or evaluation fails, an error is returned.
    pub fn evaluate(&self, expression: &str, context: &Context) -> Result<Value, Error> {
        let expr = parser::parse(expression)?;
        trace!(expression, "Parsed expression for interpretation.");
        Ok(self.evaluate_expr(&expr, context)?)
    }

    /// Evaluates an already parsed expression against `context`.
    ///
    /// # Errors
    ///
    /// If evaluation fails, an error is returned.
    pub fn evaluate_expr(&self, expr: &Expr, context: &Context) -> Result<Value, EvalError> {
        match expr {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Path(path) => self.resolve_path(path, context).map(Context::into_inner),
            Expr::Array(items) => {
                let mut collection = Context::new(Value::from(Vec::with_capacity(items.len())));
                for item in items {
                    collection.push(self.evaluate_expr(item, context)?, None)?;
                }
                Ok(collection.into_inner())
            }
            Expr::Object(entries) => {
                let mut collection = Context::new(Value::from(Map::with_capacity(entries.len())));
                for (key, value) in entries {
                    let value = self.evaluate_expr(value, context)?;
                    let key = match key {
                        ObjectKey::Name(name) => Value::from(name.as_str()),
                        ObjectKey::Literal(key) => key.clone(),
                        ObjectKey::Computed(key) => self.evaluate_expr(key, context)?,
                    };
                    collection.push(value, Some(&key))?;
                }
                Ok(collection.into_inner())
            }
            Expr::Not(operand) => Ok(Value::Bool(!self.evaluate_expr(operand, context)?.is_truthy())),
            Expr::Binary { op, left, right } => {
                let left = self.evaluate_expr(left, context)?;
                let right = self.evaluate_expr(right, context)?;
                ops::binary(*op, &left, &right)
            }
            Expr::Logical { op, left, right } => {
                let left = self.evaluate_expr(left, context)?;
                match (op, left.is_truthy()) {
                    (LogicalOp::And, false) | (LogicalOp::Or, true) => {
                        trace!(operator = op.symbol(), "Short-circuited logical operator.");
                        Ok(left)
                    }
                    _ => self.evaluate_expr(right, context),
                }
            }
            Expr::Conditional {
                condition,
                then,
                otherwise,
            } => {
                let condition = self.evaluate_expr(condition, context)?;
                let then = self.evaluate_expr(then, context)?;
                let otherwise = self.evaluate_expr(otherwise, context)?;
                Ok(if condition.is_truthy() { then } else { otherwise })
            }
        }
    }

    fn resolve_path(&self, path: &PathExpr, context: &Context) -> Result<Context, EvalError> {
        let mut current = self.apply_segment(context, &path.root, context)?;
        for segment in &path.segments {
            current = self.apply_segment(&current, segment, context)?;
        }
        Ok(current)
    }

    fn apply_segment(&self, target: &Context, segment: &Segment, context: &Context) -> Result<Context, EvalError> {
        match segment {
            Segment::Property(name) => Ok(target.get_and_wrap(&Value::from(name.as_str()))),
            Segment::Offset(key) => {
                let key = self.evaluate_expr(key, context)?;
                Ok(target.get_and_wrap(&key))
            }
            Segment::Method { name, arguments } => {
                let arguments = arguments
                    .iter()
                    .map(|argument| self.evaluate_expr(argument, context))
                    .collect::<Result<Vec<_>, _>>()?;
                target.call_and_wrap_with(name, &arguments, self.options.denied_calls)
            }
        }
    }
}
