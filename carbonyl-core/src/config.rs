use std::path::Path;

use serde::Deserialize;

use crate::error::Error;
use crate::storage::StorageKind;

/// Builder settings, usually read from a TOML file.
///
/// ```toml
/// storage = "ordered"
/// initial_capacity = 16
///
/// [limits]
/// max_depth = 64
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BuilderConfig {
    pub storage: StorageKind,
    pub initial_capacity: Option<usize>,
    pub limits: LimitsConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LimitsConfig {
    /// Deepest nesting of objects and arrays accepted. Unbounded when unset.
    pub max_depth: Option<usize>,
}

impl BuilderConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, Error> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config = BuilderConfig::from_toml_str("").unwrap();
        assert_eq!(config, BuilderConfig::default());
        assert_eq!(config.storage, StorageKind::Hash);
        assert_eq!(config.limits.max_depth, None);
    }

    #[test]
    fn reads_all_settings() {
        let config = BuilderConfig::from_toml_str(
            r#"
            storage = "sorted"
            initial_capacity = 4

            [limits]
            max_depth = 8
            "#,
        )
        .unwrap();
        assert_eq!(config.storage, StorageKind::Sorted);
        assert_eq!(config.initial_capacity, Some(4));
        assert_eq!(config.limits.max_depth, Some(8));
    }

    #[test]
    fn rejects_unknown_storage() {
        let err = BuilderConfig::from_toml_str(r#"storage = "linked""#).unwrap_err();
        assert!(matches!(err, Error::Toml(_)));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "storage = \"ordered\"").unwrap();
        let config = BuilderConfig::load(file.path()).unwrap();
        assert_eq!(config.storage, StorageKind::Ordered);
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = BuilderConfig::load(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
