use std::{fmt, sync::Arc};

use eel::{BoxError, EelObject, Value};
use snafu::{ResultExt as _, Snafu};
use tracing::trace;

use crate::{OperationResolver, ResolveError};

/// Error returned when a query fails to evaluate.
#[derive(Debug, Snafu)]
#[snafu(context(suffix(false)))]
pub enum QueryError {
    /// An operation could not be resolved.
    #[snafu(transparent)]
    Resolve {
        /// Underlying resolution error.
        source: ResolveError,
    },

    /// An operation failed while evaluating.
    #[snafu(display("operation '{}' failed: {}", name, source))]
    OperationFailed {
        /// Name of the failing operation.
        name: String,

        /// Error raised by the operation.
        source: BoxError,
    },
}

#[derive(Clone, Debug)]
struct PendingOperation {
    name: String,
    arguments: Vec<Value>,
}

/// A lazily evaluated query over a list of values.
///
/// Appending an operation returns a new query and leaves the original untouched, so partially built queries can be
/// shared and extended independently.
#[derive(Clone)]
pub struct FlowQuery {
    context: Vec<Value>,
    operations: Vec<PendingOperation>,
    resolver: Arc<OperationResolver>,
}

impl FlowQuery {
    /// Creates a new query over `context` with no pending operations.
    pub fn new(context: Vec<Value>, resolver: Arc<OperationResolver>) -> Self {
        Self {
            context,
            operations: Vec::new(),
            resolver,
        }
    }

    /// Returns the current query context.
    pub fn context(&self) -> &[Value] {
        &self.context
    }

    /// Replaces the query context.
    ///
    /// Operations call this while the query is being evaluated.
    pub fn set_context(&mut self, context: Vec<Value>) {
        self.context = context;
    }

    /// Returns a copy of this query with `name(arguments)` appended.
    pub fn push_operation(&self, name: &str, arguments: &[Value]) -> Self {
        let mut next = self.clone();
        next.operations.push(PendingOperation {
            name: name.to_string(),
            arguments: arguments.to_vec(),
        });
        next
    }

    /// Evaluates every pending operation in order.
    ///
    /// Each operation is resolved against the context as left by its predecessor. The first operation that produces a
    /// result ends evaluation; if none does, the final context is returned as a list.
    ///
    /// # Errors
    ///
    /// If an operation cannot be resolved, or fails, an error is returned.
    pub fn evaluate(&self) -> Result<Value, QueryError> {
        let mut working = FlowQuery::new(self.context.clone(), Arc::clone(&self.resolver));

        for pending in &self.operations {
            let operation = self.resolver.resolve_operation(&pending.name, &working.context)?;
            trace!(operation = %pending.name, priority = operation.priority(), "Evaluating query operation.");

            let result = operation
                .evaluate(&mut working, &pending.arguments)
                .context(OperationFailed { name: pending.name.as_str() })?;
            if let Some(value) = result {
                return Ok(value);
            }
        }

        Ok(Value::list(working.context))
    }
}

impl fmt::Debug for FlowQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let operations = self.operations.iter().map(|op| op.name.as_str()).collect::<Vec<_>>();
        f.debug_struct("FlowQuery")
            .field("context", &self.context)
            .field("operations", &operations)
            .finish()
    }
}

impl EelObject for FlowQuery {
    fn type_name(&self) -> &str {
        "FlowQuery"
    }

    fn has_method(&self, method: &str) -> bool {
        self.resolver.has_operation(method)
    }

    fn call_method(&self, method: &str, arguments: &[Value]) -> Result<Value, BoxError> {
        let next = self.push_operation(method, arguments);
        if self.resolver.is_final_operation(method) {
            Ok(next.evaluate()?)
        } else {
            Ok(Value::object(next))
        }
    }

    // Query methods only ever read the context they were built from.
    fn allows_call(&self, _method: &str) -> bool {
        true
    }
}
