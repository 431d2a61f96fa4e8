use std::fmt;
use std::str::FromStr;

use num_bigint::BigInt;
use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use serde::ser::{Error as _, SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

use crate::error::Error;
use crate::parse::{Parser, parse_document};
use crate::storage::{HashMapFactory, MapFactory, ObjectMap};
use crate::token::Token;
use crate::tokenizer::{TextTokenizer, Tokenizer};

/// A JSON value.
///
/// `Null` is the JSON null sentinel. Rust absence (`Option::None`) is never
/// stored in a value; it is resolved before insertion.
///
/// Serializers without arbitrary-precision numbers receive `BigInt` as
/// `i128` and `Decimal` as `f64` only when that is exact; otherwise the
/// number is written as its decimal text in a string.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    BigInt(BigInt),
    Decimal(Decimal),
    String(String),
    Object(Object),
    Array(Vec<Value>),
    /// Opaque JSON text supplied by the value itself.
    Raw(RawJson),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_object_mut(&mut self) -> Option<&mut Object> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Text of a scalar when used as an object key. Compound values have none.
    pub fn key_text(&self) -> Option<String> {
        match self {
            Value::Null => Some("null".to_string()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Int(i) => Some(i.to_string()),
            // Debug keeps the fraction: 1.0 stays "1.0"
            Value::Float(f) => Some(format!("{f:?}")),
            Value::BigInt(i) => Some(i.to_string()),
            Value::Decimal(d) => Some(d.to_string()),
            Value::String(s) => Some(s.clone()),
            Value::Object(_) | Value::Array(_) | Value::Raw(_) => None,
        }
    }

    /// Fails if any float in this value, at any depth, is NaN or infinite.
    pub(crate) fn check_finite(&self) -> Result<(), Error> {
        match self {
            Value::Float(f) if !f.is_finite() => Err(Error::NonFinite),
            Value::Array(items) => items.iter().try_for_each(Value::check_finite),
            Value::Object(object) => object.iter().try_for_each(|(_, value)| value.check_finite()),
            _ => Ok(()),
        }
    }
}

/// Pre-rendered JSON text, inserted without interpretation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawJson(String);

impl RawJson {
    pub fn new(text: impl Into<String>) -> Self {
        RawJson(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parses the text as one complete JSON document.
    pub fn parse(&self) -> Result<Value, Error> {
        parse_document(&mut TextTokenizer::new(&self.0), &HashMapFactory)
    }
}

macro_rules! impl_from_int {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(v: $t) -> Self {
                Value::Int(i64::from(v))
            }
        })*
    };
}

impl_from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<BigInt> for Value {
    fn from(v: BigInt) -> Self {
        Value::BigInt(v)
    }
}

impl From<Decimal> for Value {
    fn from(v: Decimal) -> Self {
        Value::Decimal(v)
    }
}

impl From<Object> for Value {
    fn from(v: Object) -> Self {
        Value::Object(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::Array(v)
    }
}

/// A JSON object: unique string keys mapped to [`Value`]s.
///
/// Iteration order is whatever the backing [`ObjectMap`] provides.
pub struct Object {
    map: Box<dyn ObjectMap>,
}

impl Object {
    /// Creates an empty object with the default hash storage.
    pub fn new() -> Self {
        Self::with_factory(&HashMapFactory, None)
    }

    pub fn with_factory(factory: &dyn MapFactory, capacity: Option<usize>) -> Self {
        Object {
            map: factory.new_map(capacity),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.map.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.map.get_mut(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.map.get(key).is_some()
    }

    /// Stores `value` under `key`, returning the value it replaced.
    pub fn put(
        &mut self,
        key: impl Into<String>,
        value: impl Into<Value>,
    ) -> Result<Option<Value>, Error> {
        let value = value.into();
        value.check_finite()?;
        Ok(self.map.insert(key.into(), value))
    }

    /// Stores `value` if present; `None` leaves the object untouched.
    pub fn put_opt(&mut self, key: impl Into<String>, value: Option<Value>) -> Result<(), Error> {
        if let Some(value) = value {
            self.put(key, value)?;
        }
        Ok(())
    }

    /// Stores `value` only if `key` is not already present.
    pub fn put_once(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Result<(), Error> {
        let key = key.into();
        if self.contains_key(&key) {
            return Err(Error::DuplicateKey { key });
        }
        self.put(key, value)?;
        Ok(())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.map.remove(key)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.map.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> + '_ {
        self.map.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl Default for Object {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for Object {
    fn clone(&self) -> Self {
        Object {
            map: self.map.clone_box(),
        }
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.map.iter()).finish()
    }
}

/// Objects are equal when they hold the same keys with equal values,
/// whatever their storage.
impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|(k, v)| other.get(k) == Some(v))
    }
}

impl FromStr for Object {
    type Err = Error;

    /// Parses a complete JSON object document with default storage.
    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let mut tokens = TextTokenizer::new(text);
        let object = Parser::new(&HashMapFactory).parse_object(&mut tokens)?;
        match tokens.next_token()? {
            Token::End => Ok(object),
            _ => Err(tokens.syntax_error("Unexpected content after the object")),
        }
    }
}

impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::BigInt(i) => match i128::try_from(i) {
                Ok(narrow) => serializer.serialize_i128(narrow),
                Err(_) => serializer.serialize_str(&i.to_string()),
            },
            Value::Decimal(d) => match d.to_f64().filter(|f| Decimal::from_f64(*f) == Some(*d)) {
                Some(f) => serializer.serialize_f64(f),
                None => serializer.serialize_str(&d.to_string()),
            },
            Value::String(s) => serializer.serialize_str(s),
            Value::Object(o) => o.serialize(serializer),
            Value::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Raw(raw) => raw
                .parse()
                .map_err(|err| S::Error::custom(format!("invalid raw JSON: {err}")))?
                .serialize(serializer),
        }
    }
}

impl Serialize for Object {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (key, value) in self.iter() {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::IndexMapFactory;

    #[test]
    fn put_replaces_and_returns_previous() {
        let mut object = Object::new();
        assert_eq!(object.put("a", 1).unwrap(), None);
        assert_eq!(object.put("a", "two").unwrap(), Some(Value::Int(1)));
        assert_eq!(object.get("a"), Some(&Value::String("two".into())));
    }

    #[test]
    fn put_rejects_non_finite_floats() {
        let mut object = Object::new();
        assert!(matches!(object.put("nan", f64::NAN), Err(Error::NonFinite)));
        assert!(matches!(object.put("inf", f64::INFINITY), Err(Error::NonFinite)));
        assert!(object.is_empty());
    }

    #[test]
    fn put_rejects_nested_non_finite_floats() {
        let mut object = Object::new();
        let err = object.put("k", Value::Array(vec![Value::Int(1), Value::Float(f64::NAN)]));
        assert!(matches!(err, Err(Error::NonFinite)));

        let mut inner = Object::new();
        inner.put("ok", 1.5).unwrap();
        if let Some(slot) = inner.get_mut("ok") {
            *slot = Value::Float(f64::INFINITY);
        }
        let err = object.put("nested", vec![Value::Object(inner)]);
        assert!(matches!(err, Err(Error::NonFinite)));
        assert!(object.is_empty());
    }

    #[test]
    fn put_once_rejects_existing_key() {
        let mut object = Object::new();
        object.put_once("k", true).unwrap();
        let err = object.put_once("k", false).unwrap_err();
        assert!(matches!(err, Error::DuplicateKey { key } if key == "k"));
        assert_eq!(object.get("k"), Some(&Value::Bool(true)));
    }

    #[test]
    fn put_opt_ignores_absence() {
        let mut object = Object::new();
        object.put_opt("gone", None).unwrap();
        object.put_opt("null", Some(Value::Null)).unwrap();
        assert!(!object.contains_key("gone"));
        assert_eq!(object.get("null"), Some(&Value::Null));
    }

    #[test]
    fn remove_drops_mapping() {
        let mut object = Object::new();
        object.put("a", Value::Null).unwrap();
        assert_eq!(object.remove("a"), Some(Value::Null));
        assert!(!object.contains_key("a"));
    }

    #[test]
    fn equality_ignores_storage() {
        let mut hashed = Object::new();
        let mut ordered = Object::with_factory(&IndexMapFactory, None);
        for (k, v) in [("x", 1), ("y", 2)] {
            hashed.put(k, v).unwrap();
        }
        for (k, v) in [("y", 2), ("x", 1)] {
            ordered.put(k, v).unwrap();
        }
        assert_eq!(hashed, ordered);

        ordered.put("z", 3).unwrap();
        assert_ne!(hashed, ordered);
    }

    #[test]
    fn key_text_of_scalars() {
        assert_eq!(Value::Int(5).key_text().as_deref(), Some("5"));
        assert_eq!(Value::Bool(false).key_text().as_deref(), Some("false"));
        assert_eq!(Value::Null.key_text().as_deref(), Some("null"));
        assert_eq!(Value::Float(1.0).key_text().as_deref(), Some("1.0"));
        assert_eq!(Value::Float(0.5).key_text().as_deref(), Some("0.5"));
        assert_eq!(Value::Array(vec![]).key_text(), None);
    }

    #[test]
    fn serializes_through_serde() {
        let mut object = Object::with_factory(&IndexMapFactory, None);
        object.put("name", "carbonyl").unwrap();
        object
            .put("tags", vec![Value::Int(1), Value::Null])
            .unwrap();
        let text = serde_json::to_string(&object).unwrap();
        assert_eq!(text, r#"{"name":"carbonyl","tags":[1,null]}"#);
    }

    #[test]
    fn raw_json_is_written_unquoted() {
        let mut object = Object::new();
        object.put("r", Value::Raw(RawJson::new("[1, 2]"))).unwrap();
        assert_eq!(serde_json::to_string(&object).unwrap(), r#"{"r":[1,2]}"#);

        let reparsed: Object = serde_json::to_string(&object).unwrap().parse().unwrap();
        assert_eq!(
            reparsed.get("r"),
            Some(&Value::Array(vec![Value::Int(1), Value::Int(2)]))
        );
    }

    #[test]
    fn malformed_raw_json_fails_serialization() {
        let value = Value::Raw(RawJson::new("[1,"));
        assert!(serde_json::to_string(&value).is_err());
    }

    #[test]
    fn wide_numbers_keep_their_digits() {
        let exact = Decimal::new(25, 2);
        assert_eq!(serde_json::to_string(&Value::Decimal(exact)).unwrap(), "0.25");

        let precise: Decimal = "1.2345678901234567890123456789".parse().unwrap();
        assert_eq!(
            serde_json::to_string(&Value::Decimal(precise)).unwrap(),
            r#""1.2345678901234567890123456789""#
        );

        let huge: BigInt = "1".repeat(50).parse().unwrap();
        assert_eq!(
            serde_json::to_string(&Value::BigInt(huge)).unwrap(),
            format!("\"{}\"", "1".repeat(50))
        );
    }

    #[test]
    fn from_str_rejects_trailing_content() {
        assert!("{\"a\":1}".parse::<Object>().is_ok());
        assert!("{\"a\":1} x".parse::<Object>().is_err());
    }
}
