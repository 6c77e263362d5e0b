//! Value wrapper used for path resolution.
//!
//! A [`Context`] wraps a single [`Value`] and resolves properties, offsets and method calls against it. Resolution is
//! lenient: anything that cannot be found degrades to a `null`-wrapped context so that chained paths such as
//! `a.missing.deeper` evaluate to `null` instead of failing.
//!
//! Protected contexts additionally carry an [`AllowList`] that restricts which methods may be called.

use std::{collections::HashMap, sync::Arc};

use serde::Deserialize;
use snafu::ResultExt as _;

use crate::{
    error::{CapabilityDenied, EvalError, MethodFailed, NotACollection},
    ops::collection_key,
    value::{Map, Value},
};

/// What happens when a protected context rejects a method call.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum DeniedCallPolicy {
    /// Fail evaluation with [`EvalError::CapabilityDenied`].
    #[default]
    Error,

    /// Treat the call like a missing method and continue with `null`.
    Null,
}

/// Outcome of resolving a method call against a context.
#[derive(Debug, PartialEq)]
pub enum Resolution {
    /// The call succeeded.
    Resolved(Value),

    /// There was nothing to call.
    Missing,

    /// The call was rejected by the allow list.
    Denied,
}

/// Tree of method names that may be called from a protected context.
///
/// Built from dotted patterns: `String.*` allows every method on whatever `String` resolves to, `q` allows calling
/// `q(...)` on the root, and `Array.join` allows only `join` on `Array`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AllowList {
    entries: HashMap<String, Arc<AllowList>>,
}

impl AllowList {
    /// Creates an allow list that permits nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an allow list from dotted patterns.
    pub fn from_patterns<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut allow_list = Self::new();
        for pattern in patterns {
            allow_list.allow(pattern.as_ref());
        }
        allow_list
    }

    /// Adds a dotted pattern.
    pub fn allow(&mut self, pattern: &str) {
        let mut node = self;
        for part in pattern.split('.').filter(|part| !part.is_empty()) {
            node = Arc::make_mut(node.entries.entry(part.to_string()).or_default());
        }
    }

    /// Returns `true` if `method` may be called at this level.
    pub fn allows(&self, method: &str) -> bool {
        self.entries.contains_key(method) || self.entries.contains_key("*")
    }

    fn narrow(&self, segment: &str) -> Arc<AllowList> {
        self.entries.get(segment).cloned().unwrap_or_default()
    }
}

/// A wrapped value that expressions are evaluated against.
#[derive(Clone, Debug, Default)]
pub struct Context {
    value: Value,
    allowed: Option<Arc<AllowList>>,
}

impl Context {
    /// Creates an unrestricted context.
    pub fn new<V: Into<Value>>(value: V) -> Self {
        Self {
            value: value.into(),
            allowed: None,
        }
    }

    /// Creates a protected context whose method calls are restricted by `allow_list`.
    pub fn protected<V: Into<Value>>(value: V, allow_list: AllowList) -> Self {
        Self {
            value: value.into(),
            allowed: Some(Arc::new(allow_list)),
        }
    }

    /// Returns `true` if method calls are restricted.
    pub fn is_protected(&self) -> bool {
        self.allowed.is_some()
    }

    /// Returns the wrapped value.
    pub fn unwrap(&self) -> &Value {
        &self.value
    }

    /// Consumes the context and returns the wrapped value.
    pub fn into_inner(self) -> Value {
        self.value
    }

    /// Wraps `value` in a context carrying the same protection as `self`, but with nothing allowed.
    fn wrap_result(&self, value: Value) -> Context {
        Context {
            value,
            allowed: self.allowed.as_ref().map(|_| Arc::default()),
        }
    }

    /// Resolves `key` against the wrapped value.
    ///
    /// Lookups are tried in a fixed order depending on the shape of the wrapped value: string-keyed map lookup, then
    /// sequential index lookup, then object accessor followed by object field. Returns `None` when nothing matched,
    /// which is distinct from `Some(Value::Null)` for an entry that exists and holds `null`.
    pub fn resolve(&self, key: &Value) -> Option<Value> {
        match (&self.value, key) {
            (Value::Map(entries), Value::String(name)) => entries.get(name.as_str()).cloned(),
            (Value::Map(entries), Value::Int(index)) => entries.get(index.to_string().as_str()).cloned(),
            (Value::List(items), Value::Int(index)) => usize::try_from(*index).ok().and_then(|i| items.get(i)).cloned(),
            (Value::List(items), Value::String(index)) => {
                index.parse::<usize>().ok().and_then(|i| items.get(i)).cloned()
            }
            (Value::Object(object), Value::String(name)) => {
                object.get_property(name).or_else(|| object.get_field(name))
            }
            (Value::Object(object), Value::Int(index)) => {
                let name = index.to_string();
                object.get_property(&name).or_else(|| object.get_field(&name))
            }
            _ => None,
        }
    }

    /// Resolves `key` and wraps the result, or `null` if it could not be resolved.
    pub fn get_and_wrap(&self, key: &Value) -> Context {
        let value = self.resolve(key).unwrap_or_default();
        let allowed = self.allowed.as_ref().map(|allowed| match key {
            Value::String(segment) => allowed.narrow(segment),
            Value::Int(index) => allowed.narrow(&index.to_string()),
            _ => Arc::default(),
        });
        Context { value, allowed }
    }

    fn permits(&self, method: &str) -> bool {
        match &self.allowed {
            None => true,
            Some(allowed) => {
                allowed.allows(method) || matches!(&self.value, Value::Object(object) if object.allows_call(method))
            }
        }
    }

    /// Calls `method` on the wrapped value.
    ///
    /// Objects dispatch to [`EelObject::call_method`][crate::EelObject::call_method]; maps invoke a
    /// [`Function`][crate::Function] stored under `method`. Calls on `null` or on values without such a method are
    /// [`Resolution::Missing`], and calls rejected by the allow list are [`Resolution::Denied`].
    ///
    /// # Errors
    ///
    /// If the method itself fails, [`EvalError::MethodFailed`] is returned.
    pub fn call(&self, method: &str, arguments: &[Value]) -> Result<Resolution, EvalError> {
        if self.value.is_null() {
            return Ok(Resolution::Missing);
        }

        if !self.permits(method) {
            return Ok(Resolution::Denied);
        }

        match &self.value {
            Value::Object(object) if object.has_method(method) => object
                .call_method(method, arguments)
                .map(Resolution::Resolved)
                .context(MethodFailed { method }),
            Value::Map(entries) => match entries.get(method) {
                Some(Value::Function(function)) => function
                    .call(arguments)
                    .map(Resolution::Resolved)
                    .context(MethodFailed { method }),
                _ => Ok(Resolution::Missing),
            },
            _ => Ok(Resolution::Missing),
        }
    }

    /// Calls `method` and wraps the result, failing if the call is denied.
    ///
    /// # Errors
    ///
    /// See [`call_and_wrap_with`][Self::call_and_wrap_with].
    pub fn call_and_wrap(&self, method: &str, arguments: &[Value]) -> Result<Context, EvalError> {
        self.call_and_wrap_with(method, arguments, DeniedCallPolicy::Error)
    }

    /// Calls `method` and wraps the result, handling denied calls according to `policy`.
    ///
    /// Missing methods wrap `null`.
    ///
    /// # Errors
    ///
    /// If the method fails, [`EvalError::MethodFailed`] is returned. If the call is denied and `policy` is
    /// [`DeniedCallPolicy::Error`], [`EvalError::CapabilityDenied`] is returned.
    pub fn call_and_wrap_with(
        &self, method: &str, arguments: &[Value], policy: DeniedCallPolicy,
    ) -> Result<Context, EvalError> {
        match self.call(method, arguments)? {
            Resolution::Resolved(value) => Ok(self.wrap_result(value)),
            Resolution::Missing => Ok(self.wrap_result(Value::Null)),
            Resolution::Denied => match policy {
                DeniedCallPolicy::Error => CapabilityDenied { method }.fail(),
                DeniedCallPolicy::Null => Ok(self.wrap_result(Value::Null)),
            },
        }
    }

    /// Pushes `value` onto the wrapped list or map.
    ///
    /// Without a key, lists append and maps use the next free integer key. With a key, maps insert (replacing an
    /// existing entry in place) and lists append when the key is the next index, or turn into a map otherwise.
    ///
    /// # Errors
    ///
    /// If the wrapped value is not a collection, [`EvalError::NotACollection`] is returned. If the key is not a
    /// scalar, [`EvalError::InvalidKey`] is returned.
    pub fn push(&mut self, value: Value, key: Option<&Value>) -> Result<(), EvalError> {
        let key = key.map(collection_key).transpose()?;

        let promoted = match (&mut self.value, key) {
            (Value::List(items), None) => {
                Arc::make_mut(items).push(value);
                None
            }
            (Value::List(items), Some(key)) if key == items.len().to_string() => {
                Arc::make_mut(items).push(value);
                None
            }
            (Value::List(items), Some(key)) => {
                let mut entries: Map = items.iter().enumerate().map(|(i, v)| (i.to_string(), v.clone())).collect();
                entries.insert(key, value);
                Some(entries)
            }
            (Value::Map(entries), key) => {
                let entries = Arc::make_mut(entries);
                let key = key.unwrap_or_else(|| next_index(entries).to_string());
                entries.insert(key, value);
                None
            }
            (other, _) => {
                return NotACollection {
                    type_name: other.type_name(),
                }
                .fail()
            }
        };

        if let Some(entries) = promoted {
            self.value = Value::from(entries);
        }
        Ok(())
    }
}

fn next_index(entries: &Map) -> i64 {
    entries
        .keys()
        .filter_map(|key| key.parse::<i64>().ok())
        .max()
        .map_or(0, |max| max.saturating_add(1))
}

impl From<Value> for Context {
    fn from(value: Value) -> Self {
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BoxError, EelObject};

    #[derive(Debug)]
    struct Node {
        title: &'static str,
    }

    impl EelObject for Node {
        fn type_name(&self) -> &str {
            "Node"
        }

        fn get_property(&self, name: &str) -> Option<Value> {
            match name {
                "label" => Some(Value::from(format!("Node: {}", self.title))),
                "title" => Some(Value::from("accessor wins")),
                _ => None,
            }
        }

        fn get_field(&self, name: &str) -> Option<Value> {
            match name {
                "title" => Some(Value::from(self.title)),
                "raw" => Some(Value::from(self.title)),
                _ => None,
            }
        }

        fn has_method(&self, method: &str) -> bool {
            matches!(method, "shout" | "explode")
        }

        fn call_method(&self, method: &str, arguments: &[Value]) -> Result<Value, BoxError> {
            match method {
                "shout" => {
                    let suffix = arguments.first().and_then(Value::as_str).unwrap_or("");
                    Ok(Value::from(format!("{}{}", self.title.to_uppercase(), suffix)))
                }
                _ => Err("boom".into()),
            }
        }

        fn allows_call(&self, method: &str) -> bool {
            method == "shout"
        }
    }

    fn sample() -> Value {
        Value::map([
            ("a", Value::map([("b", 5)])),
            ("items", Value::list(["x", "y"])),
            ("nothing", Value::Null),
            ("node", Value::object(Node { title: "home" })),
        ])
    }

    #[test]
    fn resolves_map_list_and_object_entries() {
        let context = Context::new(sample());

        assert_eq!(
            context.get_and_wrap(&"a".into()).get_and_wrap(&"b".into()).unwrap(),
            &Value::Int(5)
        );
        assert_eq!(context.get_and_wrap(&"items".into()).get_and_wrap(&1.into()).unwrap(), &Value::from("y"));
        assert_eq!(context.get_and_wrap(&"items".into()).get_and_wrap(&"0".into()).unwrap(), &Value::from("x"));

        let node = context.get_and_wrap(&"node".into());
        assert_eq!(node.get_and_wrap(&"title".into()).unwrap(), &Value::from("accessor wins"));
        assert_eq!(node.get_and_wrap(&"raw".into()).unwrap(), &Value::from("home"));
        assert_eq!(node.get_and_wrap(&"label".into()).unwrap(), &Value::from("Node: home"));
    }

    #[test]
    fn misses_degrade_to_null() {
        let context = Context::new(sample());

        let missing = context.get_and_wrap(&"a".into()).get_and_wrap(&"missing".into());
        assert_eq!(missing.unwrap(), &Value::Null);
        assert_eq!(missing.get_and_wrap(&"deeper".into()).unwrap(), &Value::Null);
        assert_eq!(context.get_and_wrap(&"items".into()).get_and_wrap(&(-1).into()).unwrap(), &Value::Null);
        assert_eq!(context.get_and_wrap(&Value::list([1])).unwrap(), &Value::Null);
        assert_eq!(Context::new(42).get_and_wrap(&"x".into()).unwrap(), &Value::Null);
    }

    #[test]
    fn resolve_distinguishes_null_entries_from_misses() {
        let context = Context::new(sample());
        assert_eq!(context.resolve(&"nothing".into()), Some(Value::Null));
        assert_eq!(context.resolve(&"missing".into()), None);
    }

    #[test]
    fn resolution_does_not_mutate_wrapped_value() {
        let original = sample();
        let context = Context::new(original.clone());
        let _ = context.get_and_wrap(&"a".into());
        let _ = context.call("node", &[]);
        assert_eq!(context.unwrap(), &original);
    }

    #[test]
    fn calls_objects_and_functions() {
        let double = crate::Function::new("double", |args| match args.first() {
            Some(Value::Int(i)) => Ok(Value::Int(i * 2)),
            _ => Err("expected an integer".into()),
        });
        let context = Context::new(Value::map([
            ("double", Value::from(double)),
            ("node", Value::object(Node { title: "a" })),
        ]));

        assert_eq!(
            context.call_and_wrap("double", &[Value::Int(21)]).unwrap().into_inner(),
            Value::Int(42)
        );
        assert_eq!(
            context
                .get_and_wrap(&"node".into())
                .call_and_wrap("shout", &["!".into()])
                .unwrap()
                .into_inner(),
            Value::from("A!")
        );
        assert_eq!(context.call("missing", &[]).unwrap(), Resolution::Missing);
        assert_eq!(Context::new(Value::Null).call("anything", &[]).unwrap(), Resolution::Missing);
        assert_eq!(Context::new(3).call("anything", &[]).unwrap(), Resolution::Missing);

        let err = context.get_and_wrap(&"node".into()).call("explode", &[]).unwrap_err();
        assert!(matches!(err, EvalError::MethodFailed { ref method, .. } if method == "explode"));
    }

    #[test]
    fn protected_context_restricts_calls() {
        let helpers = Value::map([(
            "String",
            Value::map([("upper", Value::from(crate::Function::new("upper", |_| Ok(Value::from("UP")))))]),
        )]);
        let value = Value::map([
            ("String", Value::Null),
            ("node", Value::object(Node { title: "a" })),
            ("helpers", helpers),
        ]);
        let context = Context::protected(value, AllowList::from_patterns(["helpers.String.*"]));

        let string_helper = context.get_and_wrap(&"helpers".into()).get_and_wrap(&"String".into());
        assert!(matches!(string_helper.call("upper", &[]).unwrap(), Resolution::Resolved(_)));

        let node = context.get_and_wrap(&"node".into());
        assert!(matches!(node.call("shout", &[]).unwrap(), Resolution::Resolved(_)));
        assert_eq!(node.call("explode", &[]).unwrap(), Resolution::Denied);
        assert_eq!(context.call("node", &[]).unwrap(), Resolution::Denied);

        // Null targets never get as far as the allow list.
        assert_eq!(context.get_and_wrap(&"String".into()).call("x", &[]).unwrap(), Resolution::Missing);

        let err = node.call_and_wrap("explode", &[]).unwrap_err();
        assert!(matches!(err, EvalError::CapabilityDenied { ref method } if method == "explode"));
        let lenient = node
            .call_and_wrap_with("explode", &[], DeniedCallPolicy::Null)
            .unwrap();
        assert_eq!(lenient.unwrap(), &Value::Null);
        assert!(lenient.is_protected());
    }

    #[test]
    fn push_builds_lists_and_maps() {
        let mut list = Context::new(Value::list(Vec::<Value>::new()));
        list.push(1.into(), None).unwrap();
        list.push(2.into(), Some(&1.into())).unwrap();
        assert_eq!(list.unwrap(), &Value::list([1, 2]));

        list.push(3.into(), Some(&"x".into())).unwrap();
        assert_eq!(list.unwrap(), &Value::map([("0", 1), ("1", 2), ("x", 3)]));

        let mut map = Context::new(Value::from(Map::new()));
        map.push(1.into(), Some(&"x".into())).unwrap();
        map.push(2.into(), Some(&"y".into())).unwrap();
        map.push(3.into(), Some(&"x".into())).unwrap();
        map.push(4.into(), None).unwrap();
        assert_eq!(map.unwrap(), &Value::map([("x", 3), ("y", 2), ("0", 4)]));

        let err = Context::new("text").push(1.into(), None).unwrap_err();
        assert!(matches!(err, EvalError::NotACollection { .. }));
    }
}
