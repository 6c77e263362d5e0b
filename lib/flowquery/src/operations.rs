//! Core query operations.
//!
//! Registered together through
//! [`OperationResolverBuilder::with_core_operations`][crate::OperationResolverBuilder::with_core_operations].

use eel::{BoxError, Context, Value};
use snafu::Snafu;

use crate::{FlowQuery, Operation};

#[derive(Debug, Snafu)]
#[snafu(context(suffix(false)))]
enum ArgumentError {
    #[snafu(display("{} expects an integer as argument {}, got {}", operation, position, type_name))]
    NotAnInteger {
        operation: &'static str,
        position: usize,
        type_name: String,
    },

    #[snafu(display("{} expects a string as argument {}, got {}", operation, position, type_name))]
    NotAString {
        operation: &'static str,
        position: usize,
        type_name: String,
    },

    #[snafu(display("{} requires argument {}", operation, position))]
    MissingArgument { operation: &'static str, position: usize },
}

fn optional_integer(
    operation: &'static str, arguments: &[Value], position: usize,
) -> Result<Option<i64>, ArgumentError> {
    match arguments.get(position) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Int(i)) => Ok(Some(*i)),
        Some(other) => NotAnInteger {
            operation,
            position,
            type_name: other.type_name(),
        }
        .fail(),
    }
}

/// Turns a possibly negative index into an offset into a list of `len` items, clamped to `0..=len`.
fn clamp_index(index: i64, len: usize) -> usize {
    let len_i = i64::try_from(len).unwrap_or(i64::MAX);
    let index = if index < 0 { len_i.saturating_add(index) } else { index };
    usize::try_from(index.clamp(0, len_i)).unwrap_or(len)
}

/// `count()`: the number of items in the context.
#[derive(Debug)]
pub struct Count;

impl Operation for Count {
    fn short_name(&self) -> &str {
        "count"
    }

    fn is_final(&self) -> bool {
        true
    }

    fn evaluate(&self, query: &mut FlowQuery, _arguments: &[Value]) -> Result<Option<Value>, BoxError> {
        let count = i64::try_from(query.context().len()).unwrap_or(i64::MAX);
        Ok(Some(Value::Int(count)))
    }
}

/// `first()`: narrows the context to its first item.
#[derive(Debug)]
pub struct First;

impl Operation for First {
    fn short_name(&self) -> &str {
        "first"
    }

    fn evaluate(&self, query: &mut FlowQuery, _arguments: &[Value]) -> Result<Option<Value>, BoxError> {
        let first = query.context().first().cloned();
        query.set_context(first.into_iter().collect());
        Ok(None)
    }
}

/// `last()`: narrows the context to its last item.
#[derive(Debug)]
pub struct Last;

impl Operation for Last {
    fn short_name(&self) -> &str {
        "last"
    }

    fn evaluate(&self, query: &mut FlowQuery, _arguments: &[Value]) -> Result<Option<Value>, BoxError> {
        let last = query.context().last().cloned();
        query.set_context(last.into_iter().collect());
        Ok(None)
    }
}

/// `slice(start, end?)`: narrows the context to a range of items.
///
/// Negative positions count from the end. Both positions are clamped to the context, and an omitted end means the end
/// of the context.
#[derive(Debug)]
pub struct Slice;

impl Operation for Slice {
    fn short_name(&self) -> &str {
        "slice"
    }

    fn evaluate(&self, query: &mut FlowQuery, arguments: &[Value]) -> Result<Option<Value>, BoxError> {
        let len = query.context().len();
        let start = optional_integer("slice", arguments, 0)?.map_or(0, |start| clamp_index(start, len));
        let end = optional_integer("slice", arguments, 1)?.map_or(len, |end| clamp_index(end, len));

        let sliced = if start < end {
            query.context()[start..end].to_vec()
        } else {
            Vec::new()
        };
        query.set_context(sliced);
        Ok(None)
    }
}

/// `get(index?)`: the item at `index`, or the whole context as a list.
///
/// Negative indexes count from the end; out of range indexes give `null`.
#[derive(Debug)]
pub struct Get;

impl Operation for Get {
    fn short_name(&self) -> &str {
        "get"
    }

    fn is_final(&self) -> bool {
        true
    }

    fn evaluate(&self, query: &mut FlowQuery, arguments: &[Value]) -> Result<Option<Value>, BoxError> {
        let context = query.context();
        let value = match optional_integer("get", arguments, 0)? {
            None => Value::list(context.iter().cloned()),
            Some(index) => {
                let len = i64::try_from(context.len()).unwrap_or(i64::MAX);
                let index = if index < 0 { len + index } else { index };
                usize::try_from(index)
                    .ok()
                    .and_then(|i| context.get(i))
                    .cloned()
                    .unwrap_or_default()
            }
        };
        Ok(Some(value))
    }
}

/// `is_empty()`: whether the context holds no items.
#[derive(Debug)]
pub struct IsEmpty;

impl Operation for IsEmpty {
    fn short_name(&self) -> &str {
        "is_empty"
    }

    fn is_final(&self) -> bool {
        true
    }

    fn evaluate(&self, query: &mut FlowQuery, _arguments: &[Value]) -> Result<Option<Value>, BoxError> {
        Ok(Some(Value::Bool(query.context().is_empty())))
    }
}

/// `add(items)`: appends items to the context.
///
/// Lists are appended item by item, `null` adds nothing, and any other value is appended as a single item.
#[derive(Debug)]
pub struct Add;

impl Operation for Add {
    fn short_name(&self) -> &str {
        "add"
    }

    fn evaluate(&self, query: &mut FlowQuery, arguments: &[Value]) -> Result<Option<Value>, BoxError> {
        let mut context = query.context().to_vec();
        match arguments.first() {
            None => return Err(MissingArgument { operation: "add", position: 0usize }.build().into()),
            Some(Value::Null) => {}
            Some(Value::List(items)) => context.extend(items.iter().cloned()),
            Some(other) => context.push(other.clone()),
        }
        query.set_context(context);
        Ok(None)
    }
}

/// `property(name)`: the named property of the first item, or `null` for an empty context.
#[derive(Debug)]
pub struct Property;

impl Operation for Property {
    fn short_name(&self) -> &str {
        "property"
    }

    fn is_final(&self) -> bool {
        true
    }

    fn evaluate(&self, query: &mut FlowQuery, arguments: &[Value]) -> Result<Option<Value>, BoxError> {
        let name = match arguments.first() {
            Some(Value::String(name)) => name.as_str(),
            Some(other) => {
                return Err(NotAString {
                    operation: "property",
                    position: 0usize,
                    type_name: other.type_name(),
                }
                .build()
                .into())
            }
            None => return Err(MissingArgument { operation: "property", position: 0usize }.build().into()),
        };

        let value = match query.context().first() {
            Some(item) => Context::new(item.clone()).get_and_wrap(&Value::from(name)).into_inner(),
            None => Value::Null,
        };
        Ok(Some(value))
    }
}
