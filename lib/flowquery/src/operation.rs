use std::fmt;

use eel::{BoxError, Value};

use crate::FlowQuery;

/// A named step of a query.
///
/// Several implementations may share a short name; the resolver picks the highest-priority one whose
/// [`can_evaluate`][Operation::can_evaluate] accepts the current query context.
pub trait Operation: fmt::Debug + Send + Sync {
    /// Name the operation is called by, e.g. `count`.
    fn short_name(&self) -> &str;

    /// Priority among operations sharing the same short name. Higher wins.
    fn priority(&self) -> u32 {
        1
    }

    /// Whether this operation ends the chain and produces a result.
    fn is_final(&self) -> bool {
        false
    }

    /// Whether this operation can run against `context`.
    fn can_evaluate(&self, _context: &[Value]) -> bool {
        true
    }

    /// Applies the operation.
    ///
    /// Non-final operations update the query context and return `None`. Final operations return the query result.
    ///
    /// # Errors
    ///
    /// If the arguments are invalid for this operation, an error is returned.
    fn evaluate(&self, query: &mut FlowQuery, arguments: &[Value]) -> Result<Option<Value>, BoxError>;
}
