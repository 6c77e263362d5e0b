//! Runtime values.
//!
//! Every Eel expression evaluates to a [`Value`]. Collections are reference counted so that wrapping, path resolution
//! and scratch variables can clone values cheaply; mutation goes through [`Arc::make_mut`], so a shared collection is
//! copied only when it is actually written to.

use std::{fmt, sync::Arc};

use indexmap::IndexMap;
use serde::{
    de::{self, MapAccess, SeqAccess, Visitor},
    ser::{SerializeMap as _, SerializeSeq as _},
    Deserialize, Deserializer, Serialize, Serializer,
};

use crate::BoxError;

/// Ordered map of string keys to values.
pub type Map = IndexMap<String, Value>;

/// A dynamically-typed Eel value.
#[derive(Clone, Default)]
pub enum Value {
    /// The null value.
    #[default]
    Null,

    /// Boolean value.
    Bool(bool),

    /// 64-bit signed integer.
    Int(i64),

    /// 64-bit floating point number.
    Float(f64),

    /// String value.
    String(String),

    /// Ordered sequence of values.
    List(Arc<Vec<Value>>),

    /// String-keyed map, preserving insertion order.
    Map(Arc<Map>),

    /// Host object exposing properties and methods.
    Object(Arc<dyn EelObject>),

    /// Host function, callable from a map that holds it.
    Function(Function),
}

impl Value {
    /// Creates a list value.
    pub fn list<I>(items: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        Self::List(Arc::new(items.into_iter().map(Into::into).collect()))
    }

    /// Creates a map value from key/value pairs, in iteration order.
    pub fn map<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Self::Map(Arc::new(
            entries.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        ))
    }

    /// Creates an object value.
    pub fn object<O: EelObject + 'static>(object: O) -> Self {
        Self::Object(Arc::new(object))
    }

    /// Returns the name of this value's type, as used in error messages.
    pub fn type_name(&self) -> &str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Int(_) => "integer",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::List(_) => "list",
            Self::Map(_) => "map",
            Self::Object(object) => object.type_name(),
            Self::Function(_) => "function",
        }
    }

    /// Returns `true` if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns whether this value counts as `true` in a boolean position.
    ///
    /// `null`, `false`, `0`, `0.0`, `""`, `"0"`, and empty collections are falsy. Everything else, including every
    /// object and function, is truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Null => false,
            Self::Bool(b) => *b,
            Self::Int(i) => *i != 0,
            Self::Float(f) => *f != 0.0,
            Self::String(s) => !(s.is_empty() || s == "0"),
            Self::List(items) => !items.is_empty(),
            Self::Map(entries) => !entries.is_empty(),
            Self::Object(_) | Self::Function(_) => true,
        }
    }

    /// Returns the string slice if this is a string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the integer if this is an integer value.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }
}

// Strict equality: values of different types are never equal, and objects/functions compare by identity.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(l), Self::Bool(r)) => l == r,
            (Self::Int(l), Self::Int(r)) => l == r,
            (Self::Float(l), Self::Float(r)) => l == r,
            (Self::String(l), Self::String(r)) => l == r,
            (Self::List(l), Self::List(r)) => l == r,
            (Self::Map(l), Self::Map(r)) => l.len() == r.len() && l.iter().zip(r.iter()).all(|(a, b)| a == b),
            (Self::Object(l), Self::Object(r)) => std::ptr::addr_eq(Arc::as_ptr(l), Arc::as_ptr(r)),
            (Self::Function(l), Self::Function(r)) => l.same_as(r),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("Null"),
            Self::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            Self::Int(i) => f.debug_tuple("Int").field(i).finish(),
            Self::Float(v) => f.debug_tuple("Float").field(v).finish(),
            Self::String(s) => f.debug_tuple("String").field(s).finish(),
            Self::List(items) => f.debug_list().entries(items.iter()).finish(),
            Self::Map(entries) => f.debug_map().entries(entries.iter()).finish(),
            Self::Object(object) => fmt::Debug::fmt(object, f),
            Self::Function(function) => write!(f, "Function({})", function.name()),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Int(value.into())
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Self::List(Arc::new(value))
    }
}

impl From<Map> for Value {
    fn from(value: Map) -> Self {
        Self::Map(Arc::new(value))
    }
}

impl From<Function> for Value {
    fn from(value: Function) -> Self {
        Self::Function(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Int(i) => serializer.serialize_i64(*i),
            Self::Float(f) => serializer.serialize_f64(*f),
            Self::String(s) => serializer.serialize_str(s),
            Self::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items.iter() {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Self::Map(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries.iter() {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
            Self::Object(object) => serializer.serialize_str(&format!("<{}>", object.type_name())),
            Self::Function(function) => serializer.serialize_str(&format!("<function {}>", function.name())),
        }
    }
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a scalar, sequence or string-keyed map")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Value, E> {
        Ok(Value::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Value, E> {
        Ok(Value::Int(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Value, E> {
        Ok(i64::try_from(v).map_or(Value::Float(v as f64), Value::Int))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Value, E> {
        Ok(Value::Float(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Value, E> {
        Ok(Value::String(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Value, E> {
        Ok(Value::String(v))
    }

    fn visit_unit<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_none<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Value, D::Error> {
        Value::deserialize(deserializer)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Value, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(Value::from(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Value, A::Error> {
        let mut entries = Map::with_capacity(access.size_hint().unwrap_or(0));
        while let Some((key, value)) = access.next_entry::<String, Value>()? {
            entries.insert(key, value);
        }
        Ok(Value::from(entries))
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ValueVisitor)
    }
}

/// Capability interface for host objects reachable from expressions.
///
/// Property lookups go through [`get_property`][Self::get_property] first and fall back to
/// [`get_field`][Self::get_field]. Every method has a default so implementors only provide what they expose.
pub trait EelObject: fmt::Debug + Send + Sync {
    /// Name of the object's type, used in error messages and when serializing.
    fn type_name(&self) -> &str;

    /// Accessor-style property lookup.
    fn get_property(&self, _name: &str) -> Option<Value> {
        None
    }

    /// Plain field lookup, consulted after [`get_property`][Self::get_property].
    fn get_field(&self, _name: &str) -> Option<Value> {
        None
    }

    /// Returns `true` if `method` can be called on this object.
    fn has_method(&self, _method: &str) -> bool {
        false
    }

    /// Calls `method` with already-unwrapped arguments.
    ///
    /// Only invoked when [`has_method`][Self::has_method] returned `true`.
    ///
    /// # Errors
    ///
    /// Any error is surfaced to the caller of the expression as a failed method call.
    fn call_method(&self, method: &str, _arguments: &[Value]) -> Result<Value, BoxError> {
        Err(format!("method '{}' is not implemented", method).into())
    }

    /// Returns `true` if this object permits `method` to be called from a protected context, even when the context's
    /// allow list does not name it.
    fn allows_call(&self, _method: &str) -> bool {
        false
    }

    /// String form used when the object is concatenated with `+`. `None` makes concatenation fail.
    fn to_eel_string(&self) -> Option<String> {
        None
    }
}

type Callback = dyn Fn(&[Value]) -> Result<Value, BoxError> + Send + Sync;

/// A named host function.
///
/// Functions are stored in maps bound into the evaluation context; calling `name(...)` on such a map invokes the
/// function with the unwrapped arguments.
#[derive(Clone)]
pub struct Function {
    name: Arc<str>,
    callback: Arc<Callback>,
}

impl Function {
    /// Creates a new function.
    pub fn new<F>(name: &str, callback: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, BoxError> + Send + Sync + 'static,
    {
        Self {
            name: Arc::from(name),
            callback: Arc::new(callback),
        }
    }

    /// Returns the function's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Invokes the function.
    ///
    /// # Errors
    ///
    /// Returns whatever error the callback produced.
    pub fn call(&self, arguments: &[Value]) -> Result<Value, BoxError> {
        (self.callback)(arguments)
    }

    fn same_as(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.name, &other.name)
            && std::ptr::addr_eq(Arc::as_ptr(&self.callback), Arc::as_ptr(&other.callback))
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function").field("name", &self.name).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Opaque;

    impl EelObject for Opaque {
        fn type_name(&self) -> &str {
            "Opaque"
        }
    }

    #[test]
    fn truthiness() {
        for falsy in [
            Value::Null,
            Value::Bool(false),
            Value::Int(0),
            Value::Float(0.0),
            Value::from(""),
            Value::from("0"),
            Value::list(Vec::<Value>::new()),
            Value::from(Map::new()),
        ] {
            assert!(!falsy.is_truthy(), "{:?} should be falsy", falsy);
        }

        for truthy in [
            Value::Bool(true),
            Value::Int(-1),
            Value::Float(0.5),
            Value::from("false"),
            Value::from("00"),
            Value::list([1]),
            Value::object(Opaque),
        ] {
            assert!(truthy.is_truthy(), "{:?} should be truthy", truthy);
        }
    }

    #[test]
    fn strict_equality() {
        assert_eq!(Value::Int(1), Value::Int(1));
        assert_ne!(Value::Int(1), Value::Float(1.0));
        assert_ne!(Value::from("1"), Value::Int(1));
        assert_eq!(Value::list([1, 2]), Value::list([1, 2]));
        assert_ne!(Value::map([("a", 1), ("b", 2)]), Value::map([("b", 2), ("a", 1)]));

        let object = Value::object(Opaque);
        assert_eq!(object, object.clone());
        assert_ne!(object, Value::object(Opaque));
    }

    #[test]
    fn deserialize_preserves_key_order() {
        let value: Value = serde_json::from_str(r#"{"z": 1, "a": [true, null, 1.5, "x"]}"#).unwrap();
        let Value::Map(entries) = &value else {
            panic!("expected map, got {:?}", value);
        };
        assert_eq!(entries.keys().collect::<Vec<_>>(), vec!["z", "a"]);
        assert_eq!(
            entries["a"],
            Value::list([Value::Bool(true), Value::Null, Value::Float(1.5), Value::from("x")])
        );

        let json = serde_json::to_string(&value).unwrap();
        assert_eq!(json, r#"{"z":1,"a":[true,null,1.5,"x"]}"#);
    }

    #[test]
    fn functions_compare_by_identity() {
        let f = Function::new("f", |_| Ok(Value::Null));
        let g = Function::new("f", |_| Ok(Value::Null));
        assert_eq!(Value::from(f.clone()), Value::from(f));
        assert_ne!(Value::from(g.clone()), Value::from(Function::new("f", |_| Ok(Value::Null))));
        assert_eq!(g.call(&[]).unwrap(), Value::Null);
    }
}
