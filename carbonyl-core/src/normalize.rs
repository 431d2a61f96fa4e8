//! Converting arbitrary Rust values into the JSON value model.
//!
//! Every value the builder touches is seen through [`Wrap::host`], which
//! says what kind of thing the value is. [`Normalizer`] turns that view into
//! a [`Value`], recursing into sequences, mappings and introspectable objects
//! while tracking the ancestry for cycle detection.

use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use log::debug;
use num_bigint::BigInt;
use rust_decimal::Decimal;

use crate::ancestry::Ancestry;
use crate::error::Error;
use crate::introspect::{Introspect, Resource, populate_members};
use crate::storage::{HashMapFactory, MapFactory};
use crate::value::{Object, RawJson, Value};

/// How a value presents itself to the normalizer.
pub enum Host<'a> {
    /// Rust absence. Omitted wherever it appears as a member value.
    Absent,
    /// Already in the JSON model.
    Json(Cow<'a, Value>),
    /// Ordered elements, each wrapped in turn.
    Sequence(Box<dyn Iterator<Item = &'a dyn Wrap> + 'a>),
    /// Key/value pairs, wrapped into a nested object.
    Mapping(&'a dyn Mapping),
    /// A value outside the JSON model, represented by its text.
    Text(String),
    /// A value whose members are discovered through [`Introspect`].
    Object(&'a dyn Introspect),
}

/// A value that can be placed into a JSON object.
pub trait Wrap {
    fn host(&self) -> Host<'_>;

    /// The resource to release once this value has been read, if any.
    fn as_resource(&self) -> Option<&dyn Resource> {
        None
    }
}

/// A key/value collection whose keys may be missing.
pub trait Mapping {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterates the entries. A `None` key stands for a null key.
    fn entries(&self) -> Box<dyn Iterator<Item = (Option<String>, &dyn Wrap)> + '_>;
}

/// A mapping key that can be rendered as object key text.
pub trait MapKey {
    /// The key's text, or `None` for a null key.
    fn key_string(&self) -> Option<String>;
}

impl MapKey for String {
    fn key_string(&self) -> Option<String> {
        Some(self.clone())
    }
}

impl MapKey for str {
    fn key_string(&self) -> Option<String> {
        Some(self.to_string())
    }
}

impl MapKey for Cow<'_, str> {
    fn key_string(&self) -> Option<String> {
        Some(self.to_string())
    }
}

impl<K: MapKey + ?Sized> MapKey for &K {
    fn key_string(&self) -> Option<String> {
        (**self).key_string()
    }
}

impl<K: MapKey> MapKey for Option<K> {
    fn key_string(&self) -> Option<String> {
        self.as_ref().and_then(MapKey::key_string)
    }
}

macro_rules! impl_display_key {
    ($($t:ty),*) => {
        $(impl MapKey for $t {
            fn key_string(&self) -> Option<String> {
                Some(self.to_string())
            }
        })*
    };
}

impl_display_key!(char, bool, i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize);

impl Wrap for Value {
    fn host(&self) -> Host<'_> {
        Host::Json(Cow::Borrowed(self))
    }
}

impl Wrap for Object {
    fn host(&self) -> Host<'_> {
        Host::Json(Cow::Owned(Value::Object(self.clone())))
    }
}

impl Wrap for RawJson {
    fn host(&self) -> Host<'_> {
        Host::Json(Cow::Owned(Value::Raw(self.clone())))
    }
}

macro_rules! impl_wrap_json {
    ($($t:ty),*) => {
        $(impl Wrap for $t {
            fn host(&self) -> Host<'_> {
                Host::Json(Cow::Owned(Value::from(self.clone())))
            }
        })*
    };
}

impl_wrap_json!(bool, i8, i16, i32, i64, u8, u16, u32, f64, String, BigInt, Decimal);

macro_rules! impl_wrap_wide_int {
    ($($t:ty),*) => {
        $(impl Wrap for $t {
            fn host(&self) -> Host<'_> {
                let value = match i64::try_from(*self) {
                    Ok(narrow) => Value::Int(narrow),
                    Err(_) => Value::BigInt(BigInt::from(*self)),
                };
                Host::Json(Cow::Owned(value))
            }
        })*
    };
}

impl_wrap_wide_int!(u64, usize, isize, i128, u128);

impl Wrap for f32 {
    fn host(&self) -> Host<'_> {
        Host::Json(Cow::Owned(Value::Float(f64::from(*self))))
    }
}

impl Wrap for str {
    fn host(&self) -> Host<'_> {
        Host::Json(Cow::Owned(Value::String(self.to_string())))
    }
}

impl Wrap for Cow<'_, str> {
    fn host(&self) -> Host<'_> {
        Host::Json(Cow::Owned(Value::String(self.to_string())))
    }
}

impl Wrap for char {
    fn host(&self) -> Host<'_> {
        Host::Json(Cow::Owned(Value::String(self.to_string())))
    }
}

impl<T: Wrap> Wrap for Option<T> {
    fn host(&self) -> Host<'_> {
        match self {
            Some(value) => value.host(),
            None => Host::Absent,
        }
    }

    fn as_resource(&self) -> Option<&dyn Resource> {
        self.as_ref().and_then(Wrap::as_resource)
    }
}

macro_rules! impl_wrap_pointer {
    ($($p:ident),*) => {
        $(impl<T: Wrap + ?Sized> Wrap for $p<T> {
            fn host(&self) -> Host<'_> {
                (**self).host()
            }

            fn as_resource(&self) -> Option<&dyn Resource> {
                (**self).as_resource()
            }
        })*
    };
}

impl_wrap_pointer!(Box, Rc, Arc);

impl<T: Wrap + ?Sized> Wrap for &T {
    fn host(&self) -> Host<'_> {
        (**self).host()
    }

    fn as_resource(&self) -> Option<&dyn Resource> {
        (**self).as_resource()
    }
}

impl<T: Wrap> Wrap for [T] {
    fn host(&self) -> Host<'_> {
        Host::Sequence(Box::new(self.iter().map(|item| item as &dyn Wrap)))
    }
}

impl<T: Wrap, const N: usize> Wrap for [T; N] {
    fn host(&self) -> Host<'_> {
        self.as_slice().host()
    }
}

macro_rules! impl_wrap_sequence {
    ($($c:ident),*) => {
        $(impl<T: Wrap> Wrap for $c<T> {
            fn host(&self) -> Host<'_> {
                Host::Sequence(Box::new(self.iter().map(|item| item as &dyn Wrap)))
            }
        })*
    };
}

impl_wrap_sequence!(Vec, VecDeque, BTreeSet);

impl<T: Wrap, S> Wrap for HashSet<T, S> {
    fn host(&self) -> Host<'_> {
        Host::Sequence(Box::new(self.iter().map(|item| item as &dyn Wrap)))
    }
}

impl<T: Wrap, S> Wrap for IndexSet<T, S> {
    fn host(&self) -> Host<'_> {
        Host::Sequence(Box::new(self.iter().map(|item| item as &dyn Wrap)))
    }
}

impl<K: MapKey, V: Wrap, S> Mapping for HashMap<K, V, S> {
    fn len(&self) -> usize {
        HashMap::len(self)
    }

    fn entries(&self) -> Box<dyn Iterator<Item = (Option<String>, &dyn Wrap)> + '_> {
        Box::new(self.iter().map(|(k, v)| (k.key_string(), v as &dyn Wrap)))
    }
}

impl<K: MapKey, V: Wrap> Mapping for BTreeMap<K, V> {
    fn len(&self) -> usize {
        BTreeMap::len(self)
    }

    fn entries(&self) -> Box<dyn Iterator<Item = (Option<String>, &dyn Wrap)> + '_> {
        Box::new(self.iter().map(|(k, v)| (k.key_string(), v as &dyn Wrap)))
    }
}

impl<K: MapKey, V: Wrap, S> Mapping for IndexMap<K, V, S> {
    fn len(&self) -> usize {
        IndexMap::len(self)
    }

    fn entries(&self) -> Box<dyn Iterator<Item = (Option<String>, &dyn Wrap)> + '_> {
        Box::new(self.iter().map(|(k, v)| (k.key_string(), v as &dyn Wrap)))
    }
}

macro_rules! impl_wrap_mapping {
    ($($m:ident<$($p:ident),*>),*) => {
        $(impl<K: MapKey, V: Wrap $(, $p)*> Wrap for $m<K, V $(, $p)*> {
            fn host(&self) -> Host<'_> {
                Host::Mapping(self)
            }
        })*
    };
}

impl_wrap_mapping!(HashMap<S>, BTreeMap<>, IndexMap<S>);

macro_rules! impl_wrap_display {
    ($($t:ty),*) => {
        $(impl Wrap for $t {
            fn host(&self) -> Host<'_> {
                Host::Text(self.to_string())
            }
        })*
    };
}

impl_wrap_display!(IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6);

impl Wrap for Path {
    fn host(&self) -> Host<'_> {
        Host::Text(self.to_string_lossy().into_owned())
    }
}

impl Wrap for PathBuf {
    fn host(&self) -> Host<'_> {
        self.as_path().host()
    }
}

/// Places any [`Display`](fmt::Display) value into an object as its text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayText<T>(pub T);

impl<T: fmt::Display> Wrap for DisplayText<T> {
    fn host(&self) -> Host<'_> {
        Host::Text(self.0.to_string())
    }
}

/// Converts wrapped values into JSON values.
///
/// Nested objects are allocated through the normalizer's factory.
pub struct Normalizer<'f> {
    factory: &'f dyn MapFactory,
    max_depth: Option<usize>,
    depth: usize,
}

impl<'f> Normalizer<'f> {
    pub fn new(factory: &'f dyn MapFactory) -> Self {
        Normalizer {
            factory,
            max_depth: None,
            depth: 0,
        }
    }

    /// Bounds nesting of sequences, mappings and objects. `None` means unbounded.
    pub fn with_max_depth(mut self, limit: Option<usize>) -> Self {
        self.max_depth = limit;
        self
    }

    /// Converts `value`. `Ok(None)` means the value is to be omitted.
    ///
    /// Member access failures and null keys inside the value make it
    /// omitted rather than failing. Cycles, depth overruns and non-finite
    /// numbers are returned as errors.
    pub fn wrap(&mut self, value: &dyn Wrap, ancestry: &mut Ancestry) -> Result<Option<Value>, Error> {
        self.wrap_keyed("", value, ancestry)
    }

    /// Like [`wrap`](Self::wrap), with `key` naming where the value is being
    /// placed, for error reporting.
    pub(crate) fn wrap_keyed(
        &mut self,
        key: &str,
        value: &dyn Wrap,
        ancestry: &mut Ancestry,
    ) -> Result<Option<Value>, Error> {
        match self.convert(key, value, ancestry) {
            Err(err) if err.is_recoverable() => {
                debug!("omitting value of {key:?}: {err}");
                Ok(None)
            }
            other => other,
        }
    }

    /// Inserts every entry of `map` into `object`.
    ///
    /// A null key fails the whole population. Absent values are omitted;
    /// explicit nulls are kept.
    pub fn populate_mapping(
        &mut self,
        object: &mut Object,
        map: &dyn Mapping,
        ancestry: &mut Ancestry,
    ) -> Result<(), Error> {
        for (key, value) in map.entries() {
            let key = key.ok_or(Error::NullKey)?;
            if let Some(value) = self.wrap_keyed(&key, value, ancestry)? {
                object.put(key, value)?;
            }
        }
        Ok(())
    }

    /// Inserts the members of `source` into `object`, with `source` on the
    /// ancestry for the duration of the walk.
    pub fn populate_introspected(
        &mut self,
        object: &mut Object,
        source: &dyn Introspect,
        ancestry: &mut Ancestry,
    ) -> Result<(), Error> {
        ancestry.scoped(source.identity(), |ancestry| {
            populate_members(self, object, source, ancestry)
        })
    }

    fn convert(
        &mut self,
        key: &str,
        value: &dyn Wrap,
        ancestry: &mut Ancestry,
    ) -> Result<Option<Value>, Error> {
        match value.host() {
            Host::Absent => Ok(None),
            Host::Json(json) => {
                json.check_finite()?;
                Ok(Some(json.into_owned()))
            }
            Host::Text(text) => Ok(Some(Value::String(text))),
            Host::Sequence(items) => self.nested(|n| {
                let mut array = Vec::new();
                for item in items {
                    array.push(n.wrap_keyed(key, item, ancestry)?.unwrap_or(Value::Null));
                }
                Ok(Some(Value::Array(array)))
            }),
            Host::Mapping(map) => self.nested(|n| {
                let mut object = Object::with_factory(n.factory, Some(map.len()));
                n.populate_mapping(&mut object, map, ancestry)?;
                Ok(Some(Value::Object(object)))
            }),
            Host::Object(source) => {
                let identity = source.identity();
                if ancestry.contains(&identity) {
                    return Err(Error::Cycle {
                        key: key.to_string(),
                    });
                }
                self.nested(|n| {
                    let mut object = Object::with_factory(n.factory, None);
                    n.populate_introspected(&mut object, source, ancestry)?;
                    Ok(Some(Value::Object(object)))
                })
            }
        }
    }

    fn nested<T>(&mut self, convert: impl FnOnce(&mut Self) -> Result<T, Error>) -> Result<T, Error> {
        if let Some(limit) = self.max_depth {
            if self.depth >= limit {
                return Err(Error::DepthExceeded { limit });
            }
        }
        self.depth += 1;
        let result = convert(self);
        self.depth -= 1;
        result
    }
}

/// Converts `value` with default storage and a fresh ancestry.
pub fn wrap(value: &dyn Wrap) -> Result<Option<Value>, Error> {
    Normalizer::new(&HashMapFactory).wrap(value, &mut Ancestry::new())
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::introspect::{AccessError, Member, MemberVisitor};
    use crate::storage::BTreeMapFactory;

    struct Gauge {
        value: i32,
        active: bool,
    }

    impl Introspect for Gauge {
        fn visit_members(&self, visitor: &mut dyn MemberVisitor) -> Result<(), Error> {
            visitor.visit(&Member::accessor("getValue"), Ok(&self.value))?;
            visitor.visit(&Member::accessor("isActive"), Ok(&self.active))?;
            visitor.visit(&Member::accessor("get"), Ok(&self.value))?;
            visitor.visit(&Member::accessor("getBroken"), Err(AccessError::new("boom")))
        }
    }

    impl Wrap for Gauge {
        fn host(&self) -> Host<'_> {
            Host::Object(self)
        }
    }

    #[test]
    fn scalars_pass_through() {
        assert_eq!(wrap(&5u8).unwrap(), Some(Value::Int(5)));
        assert_eq!(wrap(&true).unwrap(), Some(Value::Bool(true)));
        assert_eq!(wrap(&"text").unwrap(), Some(Value::String("text".into())));
        assert_eq!(wrap(&'x').unwrap(), Some(Value::String("x".into())));
        assert_eq!(wrap(&Value::Null).unwrap(), Some(Value::Null));
    }

    #[test]
    fn wide_integers_widen_only_when_needed() {
        assert_eq!(wrap(&7u64).unwrap(), Some(Value::Int(7)));
        assert_eq!(
            wrap(&u64::MAX).unwrap(),
            Some(Value::BigInt(BigInt::from(u64::MAX)))
        );
    }

    #[test]
    fn absence_is_omitted() {
        assert_eq!(wrap(&None::<i32>).unwrap(), None);
        assert_eq!(wrap(&Some(3)).unwrap(), Some(Value::Int(3)));
    }

    #[test]
    fn non_finite_float_is_fatal() {
        assert!(matches!(wrap(&f64::NAN), Err(Error::NonFinite)));
    }

    #[test]
    fn nested_non_finite_json_is_fatal() {
        let json = Value::Array(vec![Value::Int(1), Value::Float(f64::INFINITY)]);
        assert!(matches!(wrap(&json), Err(Error::NonFinite)));
        assert!(matches!(wrap(&vec![f64::NAN]), Err(Error::NonFinite)));
    }

    #[test]
    fn sequences_keep_holes_as_null() {
        let items = vec![Some(1), None, Some(3)];
        assert_eq!(
            wrap(&items).unwrap(),
            Some(Value::Array(vec![Value::Int(1), Value::Null, Value::Int(3)]))
        );
    }

    #[test]
    fn mappings_omit_absent_values() {
        let mut map = BTreeMap::new();
        map.insert("x", Some(1));
        map.insert("y", None);
        let value = wrap(&map).unwrap().unwrap();
        let object = value.as_object().unwrap();
        assert_eq!(object.len(), 1);
        assert_eq!(object.get("x"), Some(&Value::Int(1)));
    }

    #[test]
    fn nested_null_key_omits_the_mapping() {
        let mut map = HashMap::new();
        map.insert(None::<String>, 1);
        assert_eq!(wrap(&map).unwrap(), None);
    }

    #[test]
    fn populate_mapping_rejects_null_key() {
        let mut map = HashMap::new();
        map.insert(None::<String>, 1);
        let mut object = Object::new();
        let err = Normalizer::new(&HashMapFactory)
            .populate_mapping(&mut object, &map, &mut Ancestry::new())
            .unwrap_err();
        assert!(matches!(err, Error::NullKey));
    }

    #[test]
    fn text_fallbacks() {
        let addr: IpAddr = "127.0.0.1".parse().unwrap();
        assert_eq!(wrap(&addr).unwrap(), Some(Value::String("127.0.0.1".into())));
        assert_eq!(
            wrap(&PathBuf::from("a/b")).unwrap(),
            Some(Value::String("a/b".into()))
        );
        assert_eq!(
            wrap(&DisplayText(1.5f32)).unwrap(),
            Some(Value::String("1.5".into()))
        );
    }

    #[test]
    fn introspected_members_follow_accessor_naming() {
        let gauge = Gauge {
            value: 42,
            active: true,
        };
        let value = wrap(&gauge).unwrap().unwrap();
        let object = value.as_object().unwrap();
        assert_eq!(object.len(), 2);
        assert_eq!(object.get("value"), Some(&Value::Int(42)));
        assert_eq!(object.get("active"), Some(&Value::Bool(true)));
    }

    #[test]
    fn nested_objects_use_normalizer_factory() {
        let mut inner = HashMap::new();
        for key in ["c", "a", "b"] {
            inner.insert(key.to_string(), 0);
        }
        let outer = vec![inner];
        let value = Normalizer::new(&BTreeMapFactory)
            .wrap(&outer, &mut Ancestry::new())
            .unwrap()
            .unwrap();
        let object = value.as_array().unwrap()[0].as_object().unwrap();
        assert_eq!(object.keys().collect::<Vec<_>>(), ["a", "b", "c"]);
    }

    #[test]
    fn depth_limit_applies_to_nesting() {
        let nested = vec![vec![vec![1]]];
        let err = Normalizer::new(&HashMapFactory)
            .with_max_depth(Some(2))
            .wrap(&nested, &mut Ancestry::new())
            .unwrap_err();
        assert!(matches!(err, Error::DepthExceeded { limit: 2 }));
    }

    struct Handle {
        closed: Cell<bool>,
    }

    impl Resource for Handle {
        fn close(&self) -> std::io::Result<()> {
            self.closed.set(true);
            Ok(())
        }
    }

    impl Wrap for Handle {
        fn host(&self) -> Host<'_> {
            Host::Text("handle".into())
        }

        fn as_resource(&self) -> Option<&dyn Resource> {
            Some(self)
        }
    }

    struct Owner {
        handle: Handle,
    }

    impl Introspect for Owner {
        fn visit_members(&self, visitor: &mut dyn MemberVisitor) -> Result<(), Error> {
            visitor.visit(&Member::field("handle"), Ok(&self.handle))
        }
    }

    impl Wrap for Owner {
        fn host(&self) -> Host<'_> {
            Host::Object(self)
        }
    }

    #[test]
    fn resources_are_closed_after_reading() {
        let owner = Owner {
            handle: Handle {
                closed: Cell::new(false),
            },
        };
        let value = wrap(&owner).unwrap().unwrap();
        assert_eq!(
            value.as_object().and_then(|o| o.get("handle")),
            Some(&Value::String("handle".into()))
        );
        assert!(owner.handle.closed.get());
    }
}
