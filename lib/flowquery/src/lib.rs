//! FlowQuery: chained, lazily evaluated queries over lists of values.
//!
//! A query starts from a list of context values and accumulates operations, e.g. `q(items).slice(1, 3).count()`.
//! Nothing runs until a *final* operation (such as `count`) is appended, at which point every pending operation is
//! resolved through the [`OperationResolver`] and applied in order.
//!
//! Queries plug into Eel as objects: bind [`function`] under the name `q` in the evaluation context and every
//! registered operation becomes callable as a method.
#![deny(missing_docs)]

use std::sync::Arc;

use eel::{Function, Value};

mod operation;
pub use self::operation::Operation;

pub mod operations;

mod query;
pub use self::query::{FlowQuery, QueryError};

mod resolver;
pub use self::resolver::{OperationResolver, OperationResolverBuilder, RegistrationError, ResolveError};

/// Returns the `q(...)` function that starts a new query.
///
/// The first argument becomes the query context: a list is used as is, `null` (or no argument) starts an empty
/// query, and any other value starts a query over that single value.
pub fn function(resolver: Arc<OperationResolver>) -> Function {
    Function::new("q", move |arguments| {
        let context = match arguments.first() {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::List(items)) => items.as_ref().clone(),
            Some(other) => vec![other.clone()],
        };
        Ok(Value::object(FlowQuery::new(context, Arc::clone(&resolver))))
    })
}
