//! Pluggable key/value containers backing [`Object`](crate::Object).
//!
//! An object never picks its own container: a [`MapFactory`] allocates one,
//! optionally with a capacity hint. This keeps ordering and hashing decisions
//! out of the construction logic.

use std::collections::{BTreeMap, HashMap};
use std::fmt::Debug;

use indexmap::IndexMap;
use serde::Deserialize;

use crate::value::Value;

/// A string-keyed container of JSON values.
pub trait ObjectMap: Debug + Send + Sync {
    fn get(&self, key: &str) -> Option<&Value>;

    fn get_mut(&mut self, key: &str) -> Option<&mut Value>;

    /// Inserts a value, returning the one previously stored under `key`.
    fn insert(&mut self, key: String, value: Value) -> Option<Value>;

    fn remove(&mut self, key: &str) -> Option<Value>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterates entries in the container's own order.
    fn iter(&self) -> Box<dyn Iterator<Item = (&String, &Value)> + '_>;

    fn clone_box(&self) -> Box<dyn ObjectMap>;
}

/// Allocates containers for new objects.
pub trait MapFactory: Debug {
    /// Returns an empty container. `capacity` is a sizing hint only.
    fn new_map(&self, capacity: Option<usize>) -> Box<dyn ObjectMap>;
}

impl ObjectMap for HashMap<String, Value> {
    fn get(&self, key: &str) -> Option<&Value> {
        HashMap::get(self, key)
    }

    fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        HashMap::get_mut(self, key)
    }

    fn insert(&mut self, key: String, value: Value) -> Option<Value> {
        HashMap::insert(self, key, value)
    }

    fn remove(&mut self, key: &str) -> Option<Value> {
        HashMap::remove(self, key)
    }

    fn len(&self) -> usize {
        HashMap::len(self)
    }

    fn iter(&self) -> Box<dyn Iterator<Item = (&String, &Value)> + '_> {
        Box::new(HashMap::iter(self))
    }

    fn clone_box(&self) -> Box<dyn ObjectMap> {
        Box::new(self.clone())
    }
}

impl ObjectMap for IndexMap<String, Value> {
    fn get(&self, key: &str) -> Option<&Value> {
        IndexMap::get(self, key)
    }

    fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        IndexMap::get_mut(self, key)
    }

    fn insert(&mut self, key: String, value: Value) -> Option<Value> {
        IndexMap::insert(self, key, value)
    }

    fn remove(&mut self, key: &str) -> Option<Value> {
        // shift_remove keeps the remaining entries in insertion order
        IndexMap::shift_remove(self, key)
    }

    fn len(&self) -> usize {
        IndexMap::len(self)
    }

    fn iter(&self) -> Box<dyn Iterator<Item = (&String, &Value)> + '_> {
        Box::new(IndexMap::iter(self))
    }

    fn clone_box(&self) -> Box<dyn ObjectMap> {
        Box::new(self.clone())
    }
}

impl ObjectMap for BTreeMap<String, Value> {
    fn get(&self, key: &str) -> Option<&Value> {
        BTreeMap::get(self, key)
    }

    fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        BTreeMap::get_mut(self, key)
    }

    fn insert(&mut self, key: String, value: Value) -> Option<Value> {
        BTreeMap::insert(self, key, value)
    }

    fn remove(&mut self, key: &str) -> Option<Value> {
        BTreeMap::remove(self, key)
    }

    fn len(&self) -> usize {
        BTreeMap::len(self)
    }

    fn iter(&self) -> Box<dyn Iterator<Item = (&String, &Value)> + '_> {
        Box::new(BTreeMap::iter(self))
    }

    fn clone_box(&self) -> Box<dyn ObjectMap> {
        Box::new(self.clone())
    }
}

/// Unordered hash storage. The default, since JSON objects are unordered.
#[derive(Debug, Clone, Copy, Default)]
pub struct HashMapFactory;

impl MapFactory for HashMapFactory {
    fn new_map(&self, capacity: Option<usize>) -> Box<dyn ObjectMap> {
        match capacity {
            Some(capacity) => Box::new(HashMap::with_capacity(capacity)),
            None => Box::new(HashMap::new()),
        }
    }
}

/// Insertion-ordered storage.
#[derive(Debug, Clone, Copy, Default)]
pub struct IndexMapFactory;

impl MapFactory for IndexMapFactory {
    fn new_map(&self, capacity: Option<usize>) -> Box<dyn ObjectMap> {
        match capacity {
            Some(capacity) => Box::new(IndexMap::with_capacity(capacity)),
            None => Box::new(IndexMap::new()),
        }
    }
}

/// Key-sorted storage. Ignores the capacity hint.
#[derive(Debug, Clone, Copy, Default)]
pub struct BTreeMapFactory;

impl MapFactory for BTreeMapFactory {
    fn new_map(&self, _capacity: Option<usize>) -> Box<dyn ObjectMap> {
        Box::new(BTreeMap::new())
    }
}

/// Named storage strategies, as selected from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    #[default]
    Hash,
    Ordered,
    Sorted,
}

impl StorageKind {
    pub fn factory(self) -> Box<dyn MapFactory> {
        match self {
            StorageKind::Hash => Box::new(HashMapFactory),
            StorageKind::Ordered => Box::new(IndexMapFactory),
            StorageKind::Sorted => Box::new(BTreeMapFactory),
        }
    }
}
