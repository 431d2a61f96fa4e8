//! Assembling one object from several sources.

use log::{debug, trace};

use crate::ancestry::Ancestry;
use crate::bundle::ResourceBundle;
use crate::config::BuilderConfig;
use crate::error::{ConfigError, Error, SourceKind};
use crate::introspect::{Fields, Introspect};
use crate::normalize::{Host, Mapping, Normalizer};
use crate::parse::Parser;
use crate::storage::{HashMapFactory, MapFactory};
use crate::tokenizer::Tokenizer;
use crate::value::{Object, Value};

enum BeanSource<'a> {
    Introspect {
        object: &'a dyn Introspect,
        ancestry: Option<&'a mut Ancestry>,
    },
    Named {
        object: &'a dyn Fields,
        names: Vec<String>,
    },
}

/// Collects sources, then populates a fresh object from them in [`build`](Self::build).
///
/// Each source category can be configured once. Sources are applied in a
/// fixed order: prior object, token stream, mapping, introspected value,
/// resource bundle. A later source overwrites keys set by an earlier one.
///
/// ```
/// use carbonyl_core::{ObjectBuilder, TextTokenizer};
///
/// let mut tokens = TextTokenizer::new(r#"{"id": 7}"#);
/// let object = ObjectBuilder::new()
///     .with_tokenizer(&mut tokens)?
///     .build()?;
/// assert_eq!(object.get("id").and_then(|v| v.as_i64()), Some(7));
/// # Ok::<(), carbonyl_core::Error>(())
/// ```
pub struct ObjectBuilder<'a> {
    factory: Box<dyn MapFactory>,
    capacity: Option<usize>,
    max_depth: Option<usize>,
    prior: Option<(&'a Object, Vec<String>)>,
    tokens: Option<&'a mut dyn Tokenizer>,
    mapping: Option<&'a dyn Mapping>,
    bean: Option<BeanSource<'a>>,
    bundle: Option<&'a dyn ResourceBundle>,
}

impl Default for ObjectBuilder<'_> {
    fn default() -> Self {
        Self::new()
    }
}

fn occupy<T>(slot: &mut Option<T>, source: T, kind: SourceKind) -> Result<(), ConfigError> {
    if slot.is_some() {
        return Err(ConfigError::DuplicateSource(kind));
    }
    *slot = Some(source);
    Ok(())
}

impl<'a> ObjectBuilder<'a> {
    pub fn new() -> Self {
        ObjectBuilder {
            factory: Box::new(HashMapFactory),
            capacity: None,
            max_depth: None,
            prior: None,
            tokens: None,
            mapping: None,
            bean: None,
            bundle: None,
        }
    }

    pub fn with_factory(mut self, factory: impl MapFactory + 'static) -> Self {
        self.factory = Box::new(factory);
        self
    }

    /// Fixes the initial capacity instead of estimating it from the sources.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }

    pub fn with_max_depth(mut self, limit: Option<usize>) -> Self {
        self.max_depth = limit;
        self
    }

    /// Applies every setting in `config`, replacing earlier settings.
    pub fn with_config(mut self, config: &BuilderConfig) -> Self {
        self.factory = config.storage.factory();
        self.capacity = config.initial_capacity;
        self.max_depth = config.limits.max_depth;
        self
    }

    /// Copies the listed members of an existing object. Names it lacks are skipped.
    pub fn with_json_object<I>(mut self, object: &'a Object, names: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let names = names.into_iter().map(Into::into).collect();
        occupy(&mut self.prior, (object, names), SourceKind::PriorObject)?;
        Ok(self)
    }

    /// Reads one object literal from `tokens`.
    pub fn with_tokenizer(mut self, tokens: &'a mut dyn Tokenizer) -> Result<Self, ConfigError> {
        occupy(&mut self.tokens, tokens, SourceKind::Tokens)?;
        Ok(self)
    }

    pub fn with_map(mut self, map: &'a dyn Mapping) -> Result<Self, ConfigError> {
        occupy(&mut self.mapping, map, SourceKind::Mapping)?;
        Ok(self)
    }

    /// Publishes every member `object` exposes.
    pub fn with_object(mut self, object: &'a dyn Introspect) -> Result<Self, ConfigError> {
        let source = BeanSource::Introspect {
            object,
            ancestry: None,
        };
        occupy(&mut self.bean, source, SourceKind::Bean)?;
        Ok(self)
    }

    /// Like [`with_object`](Self::with_object), continuing a walk whose
    /// ancestors are recorded in `ancestry`. The ancestry is left as it was
    /// once the build completes.
    pub fn with_object_in(
        mut self,
        object: &'a dyn Introspect,
        ancestry: &'a mut Ancestry,
    ) -> Result<Self, ConfigError> {
        let source = BeanSource::Introspect {
            object,
            ancestry: Some(ancestry),
        };
        occupy(&mut self.bean, source, SourceKind::Bean)?;
        Ok(self)
    }

    /// Publishes only the named fields of `object`.
    pub fn with_fields<I>(mut self, object: &'a dyn Fields, names: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let source = BeanSource::Named {
            object,
            names: names.into_iter().map(Into::into).collect(),
        };
        occupy(&mut self.bean, source, SourceKind::Bean)?;
        Ok(self)
    }

    /// Adds every bundle entry, nesting on `.` in keys.
    pub fn with_bundle(mut self, bundle: &'a dyn ResourceBundle) -> Result<Self, ConfigError> {
        occupy(&mut self.bundle, bundle, SourceKind::Bundle)?;
        Ok(self)
    }

    fn estimated_capacity(&self) -> Option<usize> {
        if self.capacity.is_some() {
            return self.capacity;
        }
        let mut hint = self.prior.as_ref().map_or(0, |(_, names)| names.len());
        hint += self.mapping.map_or(0, |map| map.len());
        hint += match &self.bean {
            Some(BeanSource::Named { names, .. }) => names.len(),
            Some(BeanSource::Introspect {
                ancestry: Some(ancestry),
                ..
            }) => ancestry.len(),
            _ => 0,
        };
        (hint > 0).then_some(hint)
    }

    pub fn build(self) -> Result<Object, Error> {
        let capacity = self.estimated_capacity();
        let ObjectBuilder {
            factory,
            max_depth,
            prior,
            tokens,
            mapping,
            bean,
            bundle,
            ..
        } = self;
        let factory = factory.as_ref();
        debug!("building object with {factory:?}, capacity hint {capacity:?}");

        let mut object = Object::with_factory(factory, capacity);

        if let Some((source, names)) = prior {
            copy_members(&mut object, source, &names);
        }

        if let Some(tokens) = tokens {
            Parser::new(factory)
                .with_max_depth(max_depth)
                .populate_object(tokens, &mut object)?;
        }

        let mut normalizer = Normalizer::new(factory).with_max_depth(max_depth);

        if let Some(map) = mapping {
            normalizer.populate_mapping(&mut object, map, &mut Ancestry::new())?;
        }

        match bean {
            Some(BeanSource::Introspect {
                object: source,
                ancestry,
            }) => {
                let mut fresh = Ancestry::new();
                let ancestry = ancestry.unwrap_or(&mut fresh);
                normalizer.populate_introspected(&mut object, source, ancestry)?;
            }
            Some(BeanSource::Named {
                object: source,
                names,
            }) => populate_fields(&mut normalizer, &mut object, source, &names),
            None => {}
        }

        if let Some(bundle) = bundle {
            populate_bundle(&mut object, bundle, factory)?;
        }

        Ok(object)
    }
}

fn copy_members(object: &mut Object, source: &Object, names: &[String]) {
    for name in names {
        let Some(value) = source.get(name) else {
            continue;
        };
        if let Err(err) = object.put_once(name.as_str(), value.clone()) {
            trace!("not copying {name:?}: {err}");
        }
    }
}

fn populate_fields(
    normalizer: &mut Normalizer<'_>,
    object: &mut Object,
    source: &dyn Fields,
    names: &[String],
) {
    let mut ancestry = Ancestry::new();
    for name in names {
        let Some(value) = source.field(name) else {
            trace!("no field {name:?}");
            continue;
        };
        let wrapped = if matches!(value.host(), Host::Absent) {
            Ok(Some(Value::Null))
        } else {
            normalizer.wrap_keyed(name, value, &mut ancestry)
        };
        let result = match wrapped {
            Ok(Some(value)) => object.put(name.as_str(), value).map(drop),
            Ok(None) => Ok(()),
            Err(err) => Err(err),
        };
        if let Err(err) = result {
            debug!("skipping field {name:?}: {err}");
        }
    }
}

fn populate_bundle(
    object: &mut Object,
    bundle: &dyn ResourceBundle,
    factory: &dyn MapFactory,
) -> Result<(), Error> {
    for key in bundle.keys() {
        let Some(text) = bundle.get_string(key) else {
            continue;
        };
        let mut segments: Vec<&str> = key.split('.').collect();
        let last = segments.pop().unwrap_or(key);

        let mut target = &mut *object;
        for segment in segments {
            target = child_object(target, segment, factory)?;
        }
        target.put(last, text)?;
    }
    Ok(())
}

/// The object under `key`, replacing whatever non-object value was there.
fn child_object<'o>(
    parent: &'o mut Object,
    key: &str,
    factory: &dyn MapFactory,
) -> Result<&'o mut Object, Error> {
    if !matches!(parent.get(key), Some(Value::Object(_))) {
        parent.put(key, Object::with_factory(factory, None))?;
    }
    match parent.get_mut(key) {
        Some(Value::Object(child)) => Ok(child),
        _ => unreachable!("an object was just stored under {key:?}"),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::bundle::MemoryBundle;
    use crate::storage::IndexMapFactory;
    use crate::tokenizer::TextTokenizer;

    #[test]
    fn duplicate_categories_are_rejected() {
        let mut first = TextTokenizer::new("{}");
        let mut second = TextTokenizer::new("{}");
        let err = ObjectBuilder::new()
            .with_tokenizer(&mut first)
            .unwrap()
            .with_tokenizer(&mut second)
            .err()
            .unwrap();
        assert_eq!(err, ConfigError::DuplicateSource(SourceKind::Tokens));

        let bundle = MemoryBundle::new();
        let err = ObjectBuilder::new()
            .with_bundle(&bundle)
            .unwrap()
            .with_bundle(&bundle)
            .err()
            .unwrap();
        assert_eq!(err, ConfigError::DuplicateSource(SourceKind::Bundle));
    }

    #[test]
    fn prior_object_copies_listed_names() {
        let prior: Object = r#"{"a": 1, "b": 2, "c": 3}"#.parse().unwrap();
        let object = ObjectBuilder::new()
            .with_json_object(&prior, ["a", "c", "missing", "a"])
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(object.len(), 2);
        assert_eq!(object.get("a"), Some(&Value::Int(1)));
        assert_eq!(object.get("c"), Some(&Value::Int(3)));
    }

    #[test]
    fn later_sources_overwrite_earlier_ones() {
        let prior: Object = r#"{"k": "prior"}"#.parse().unwrap();
        let mut map = BTreeMap::new();
        map.insert("k", "map");
        let object = ObjectBuilder::new()
            .with_json_object(&prior, ["k"])
            .unwrap()
            .with_map(&map)
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(object.get("k"), Some(&Value::String("map".into())));
    }

    #[test]
    fn tokens_conflicting_with_prior_object_fail() {
        let prior: Object = r#"{"k": 1}"#.parse().unwrap();
        let mut tokens = TextTokenizer::new(r#"{"k": 2}"#);
        let err = ObjectBuilder::new()
            .with_json_object(&prior, ["k"])
            .unwrap()
            .with_tokenizer(&mut tokens)
            .unwrap()
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Syntax { .. }));
    }

    #[test]
    fn bundle_replaces_scalar_on_the_path() {
        let bundle: MemoryBundle = [("a", "flat"), ("a.b", "nested")].into_iter().collect();
        let object = ObjectBuilder::new()
            .with_bundle(&bundle)
            .unwrap()
            .build()
            .unwrap();
        let a = object.get("a").and_then(Value::as_object).unwrap();
        assert_eq!(a.get("b"), Some(&Value::String("nested".into())));
    }

    #[test]
    fn config_selects_storage() {
        let config = BuilderConfig::from_toml_str(r#"storage = "ordered""#).unwrap();
        let mut tokens = TextTokenizer::new(r#"{"z": 1, "a": 2, "m": 3}"#);
        let object = ObjectBuilder::new()
            .with_config(&config)
            .with_tokenizer(&mut tokens)
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(object.keys().collect::<Vec<_>>(), ["z", "a", "m"]);
    }

    #[test]
    fn settings_are_last_write_wins() {
        let config = BuilderConfig::default();
        let mut tokens = TextTokenizer::new(r#"{"z": 1, "a": 2}"#);
        let object = ObjectBuilder::new()
            .with_config(&config)
            .with_factory(IndexMapFactory)
            .with_capacity(2)
            .with_tokenizer(&mut tokens)
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(object.keys().collect::<Vec<_>>(), ["z", "a"]);
    }

    #[test]
    fn capacity_estimate_counts_sources() {
        let prior = Object::new();
        let mut map = BTreeMap::new();
        map.insert("x", 1);
        map.insert("y", 2);
        let builder = ObjectBuilder::new()
            .with_json_object(&prior, ["a", "b", "c"])
            .unwrap()
            .with_map(&map)
            .unwrap();
        assert_eq!(builder.estimated_capacity(), Some(5));
        assert_eq!(ObjectBuilder::new().estimated_capacity(), None);
        assert_eq!(ObjectBuilder::new().with_capacity(9).estimated_capacity(), Some(9));
    }

    #[test]
    fn empty_builder_yields_empty_object() {
        assert!(ObjectBuilder::new().build().unwrap().is_empty());
    }
}
