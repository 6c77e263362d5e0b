use std::sync::{
    atomic::{AtomicU64, Ordering::Relaxed},
    Arc,
};

use metrics::{counter, Counter};
use quick_cache::{sync::Cache, UnitWeighter};
use tracing::debug;

use crate::{compile_expression, error::Error, fragment::CompiledExpression};

const DEFAULT_CACHE_CAPACITY: usize = 1024;

type ExpressionMap = Cache<String, Arc<CompiledExpression>, UnitWeighter, ahash::RandomState>;

struct Telemetry {
    hits_total: Counter,
    misses_total: Counter,
    compilations_total: Counter,
}

impl Telemetry {
    fn new() -> Self {
        Self {
            hits_total: counter!("eel_expression_cache_hits_total"),
            misses_total: counter!("eel_expression_cache_misses_total"),
            compilations_total: counter!("eel_expression_cache_compilations_total"),
        }
    }
}

/// A concurrent, bounded cache of compiled expressions keyed by expression text.
///
/// Concurrent requests for the same expression converge on a single compilation: while one caller compiles, the
/// others wait for its result instead of compiling again. Failed compilations are not cached.
pub struct ExpressionCache {
    expressions: ExpressionMap,
    compilations: AtomicU64,
    telemetry: Telemetry,
}

impl ExpressionCache {
    /// Creates a new `ExpressionCache` holding at most `capacity` compiled expressions.
    pub fn new(capacity: usize) -> Self {
        Self {
            expressions: Cache::with(
                capacity.max(1),
                capacity.max(1) as u64,
                UnitWeighter,
                ahash::RandomState::new(),
                Default::default(),
            ),
            compilations: AtomicU64::new(0),
            telemetry: Telemetry::new(),
        }
    }

    /// Returns the compiled form of `expression`, compiling it on first use.
    ///
    /// # Errors
    ///
    /// If the expression cannot be parsed or compiled, an error is returned.
    pub fn get_or_compile(&self, expression: &str) -> Result<Arc<CompiledExpression>, Error> {
        if let Some(compiled) = self.expressions.get(expression) {
            self.telemetry.hits_total.increment(1);
            return Ok(compiled);
        }

        self.telemetry.misses_total.increment(1);
        self.expressions.get_or_insert_with(expression, || {
            let compiled = compile_expression(expression)?;
            self.compilations.fetch_add(1, Relaxed);
            self.telemetry.compilations_total.increment(1);
            debug!(expression, fragment = compiled.fragment(), "Cached newly compiled expression.");
            Ok(Arc::new(compiled))
        })
    }

    /// Returns the number of compilations performed by this cache.
    pub fn compilations(&self) -> u64 {
        self.compilations.load(Relaxed)
    }

    /// Returns the number of cached expressions.
    pub fn len(&self) -> usize {
        self.expressions.len()
    }

    /// Returns `true` if the cache holds no expressions.
    pub fn is_empty(&self) -> bool {
        self.expressions.is_empty()
    }
}

impl Default for ExpressionCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}
