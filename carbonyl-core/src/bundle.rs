//! Keyed string tables whose dotted keys become nested objects.

use std::collections::BTreeMap;
use std::io;
use std::path::Path;

use log::debug;

use crate::error::Error;

/// A read-only table of localized strings.
pub trait ResourceBundle {
    fn keys(&self) -> Box<dyn Iterator<Item = &str> + '_>;

    fn get_string(&self, key: &str) -> Option<&str>;
}

/// A bundle held in memory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryBundle {
    entries: BTreeMap<String, String>,
}

impl MemoryBundle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.entries.insert(key.into(), value.into())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MemoryBundle {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        MemoryBundle {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl ResourceBundle for MemoryBundle {
    fn keys(&self) -> Box<dyn Iterator<Item = &str> + '_> {
        Box::new(self.entries.keys().map(String::as_str))
    }

    fn get_string(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }
}

/// A bundle read from TOML.
///
/// Nested tables are flattened into dotted keys, so `[menu] open = "Open"`
/// is the entry `menu.open`. Numbers, booleans and dates are kept as their
/// text; arrays are skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TomlBundle {
    entries: MemoryBundle,
}

impl TomlBundle {
    pub fn from_toml_str(text: &str) -> Result<Self, Error> {
        let table: toml::Table = toml::from_str(text)?;
        let mut bundle = TomlBundle::default();
        bundle.merge(&table, "");
        Ok(bundle)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Loads `<base>.toml` from `dir`, overlaid with the files for each
    /// more specific part of `locale`.
    ///
    /// For locale `en_US` the files `<base>.toml`, `<base>_en.toml` and
    /// `<base>_en_US.toml` are read in that order when present, later files
    /// overriding earlier ones. At least one of them must exist.
    pub fn load_localized(dir: impl AsRef<Path>, base: &str, locale: &str) -> Result<Self, Error> {
        let dir = dir.as_ref();
        let mut candidates = vec![base.to_string()];
        let mut name = base.to_string();
        for part in locale.split(['_', '-']).filter(|part| !part.is_empty()) {
            name.push('_');
            name.push_str(part);
            candidates.push(name.clone());
        }

        let mut bundle = TomlBundle::default();
        let mut found = false;
        for candidate in candidates {
            let path = dir.join(format!("{candidate}.toml"));
            let content = match std::fs::read_to_string(&path) {
                Ok(content) => content,
                Err(err) if err.kind() == io::ErrorKind::NotFound => continue,
                Err(err) => return Err(err.into()),
            };
            debug!("loading bundle {}", path.display());
            let table: toml::Table = toml::from_str(&content)?;
            bundle.merge(&table, "");
            found = true;
        }

        if !found {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no bundle {base} for locale {locale:?} in {}", dir.display()),
            )));
        }
        Ok(bundle)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn merge(&mut self, table: &toml::Table, prefix: &str) {
        for (key, value) in table {
            let key = if prefix.is_empty() {
                key.clone()
            } else {
                format!("{prefix}.{key}")
            };
            let text = match value {
                toml::Value::Table(nested) => {
                    self.merge(nested, &key);
                    continue;
                }
                toml::Value::Array(_) => continue,
                toml::Value::String(s) => s.clone(),
                toml::Value::Integer(i) => i.to_string(),
                toml::Value::Float(f) => f.to_string(),
                toml::Value::Boolean(b) => b.to_string(),
                toml::Value::Datetime(d) => d.to_string(),
            };
            self.entries.insert(key, text);
        }
    }
}

impl ResourceBundle for TomlBundle {
    fn keys(&self) -> Box<dyn Iterator<Item = &str> + '_> {
        self.entries.keys()
    }

    fn get_string(&self, key: &str) -> Option<&str> {
        self.entries.get_string(key)
    }
}
