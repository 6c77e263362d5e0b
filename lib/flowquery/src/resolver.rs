use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use eel::Value;
use snafu::Snafu;
use tracing::debug;

use crate::{operations, Operation};

/// Error returned when an operation registry cannot be built.
#[derive(Debug, Snafu)]
#[snafu(context(suffix(false)))]
pub enum RegistrationError {
    /// Two operations claim the same short name and priority.
    #[snafu(display("operations '{}' and '{}' both register '{}' with priority {}", first, second, name, priority))]
    RegistrationConflict {
        /// Short name of the conflicting operations.
        name: String,

        /// The shared priority.
        priority: u32,

        /// Debug representation of the operation registered first.
        first: String,

        /// Debug representation of the operation registered second.
        second: String,
    },
}

/// Error returned when an operation cannot be resolved.
#[derive(Debug, Snafu)]
#[snafu(context(suffix(false)), visibility(pub(crate)))]
pub enum ResolveError {
    /// No operation is registered under the name.
    #[snafu(display("unknown operation '{}'", name))]
    UnknownOperation {
        /// Requested operation name.
        name: String,
    },

    /// Operations are registered under the name, but none accepts the current context.
    #[snafu(display("no operation '{}' can evaluate the current context", name))]
    NoOperationSatisfies {
        /// Requested operation name.
        name: String,
    },
}

/// Builder for creating an [`OperationResolver`].
#[derive(Debug, Default)]
pub struct OperationResolverBuilder {
    operations: Vec<Arc<dyn Operation>>,
}

impl OperationResolverBuilder {
    /// Creates a new, empty `OperationResolverBuilder`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an operation.
    pub fn register<O: Operation + 'static>(mut self, operation: O) -> Self {
        self.operations.push(Arc::new(operation));
        self
    }

    /// Registers the core operations: `count`, `first`, `last`, `slice`, `get`, `is_empty`, `add` and `property`.
    pub fn with_core_operations(self) -> Self {
        self.register(operations::Count)
            .register(operations::First)
            .register(operations::Last)
            .register(operations::Slice)
            .register(operations::Get)
            .register(operations::IsEmpty)
            .register(operations::Add)
            .register(operations::Property)
    }

    /// Builds the resolver.
    ///
    /// # Errors
    ///
    /// If two operations share both short name and priority, an error is returned.
    pub fn build(self) -> Result<OperationResolver, RegistrationError> {
        let mut operations: HashMap<String, Vec<Arc<dyn Operation>>> = HashMap::new();
        for operation in self.operations {
            operations
                .entry(operation.short_name().to_string())
                .or_default()
                .push(operation);
        }

        let mut final_operations = HashSet::new();
        for (name, candidates) in operations.iter_mut() {
            // Stable sort: descending priority, registration order otherwise.
            candidates.sort_by(|a, b| b.priority().cmp(&a.priority()));

            if let Some(pair) = candidates.windows(2).find(|pair| pair[0].priority() == pair[1].priority()) {
                return RegistrationConflict {
                    name: name.as_str(),
                    priority: pair[0].priority(),
                    first: format!("{:?}", pair[0]),
                    second: format!("{:?}", pair[1]),
                }
                .fail();
            }

            if candidates.iter().any(|candidate| candidate.is_final()) {
                final_operations.insert(name.clone());
            }
        }

        debug!(
            operations = operations.len(),
            final_operations = final_operations.len(),
            "Built operation resolver."
        );

        Ok(OperationResolver {
            operations,
            final_operations,
        })
    }
}

/// Immutable registry of query operations.
#[derive(Debug)]
pub struct OperationResolver {
    operations: HashMap<String, Vec<Arc<dyn Operation>>>,
    final_operations: HashSet<String>,
}

impl OperationResolver {
    /// Returns the highest-priority operation named `name` that can evaluate `context`.
    ///
    /// # Errors
    ///
    /// If nothing is registered under `name`, [`ResolveError::UnknownOperation`] is returned. If no candidate accepts
    /// `context`, [`ResolveError::NoOperationSatisfies`] is returned.
    pub fn resolve_operation(&self, name: &str, context: &[Value]) -> Result<&Arc<dyn Operation>, ResolveError> {
        let Some(candidates) = self.operations.get(name) else {
            return UnknownOperation { name }.fail();
        };

        match candidates.iter().find(|candidate| candidate.can_evaluate(context)) {
            Some(operation) => Ok(operation),
            None => NoOperationSatisfies { name }.fail(),
        }
    }

    /// Returns `true` if `name` ends a query chain.
    pub fn is_final_operation(&self, name: &str) -> bool {
        self.final_operations.contains(name)
    }

    /// Returns `true` if any operation is registered under `name`.
    pub fn has_operation(&self, name: &str) -> bool {
        self.operations.contains_key(name)
    }
}
