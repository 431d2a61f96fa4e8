//! Carbonyl builds JSON objects from heterogeneous sources.
//!
//! Core concepts:
//! - **Value / Object**: the JSON value model, with pluggable map storage
//! - **Tokenizer**: a stream of JSON tokens, consumed by the [`Parser`]
//! - **Wrap**: how an arbitrary Rust value presents itself for conversion
//! - **Introspect**: how a value exposes named members (fields or getters)
//! - **ObjectBuilder**: combines a prior object, a token stream, a mapping,
//!   an introspected value and a resource bundle into one object
//!
//! # Example
//!
//! ```
//! use std::collections::BTreeMap;
//! use carbonyl_core::{Introspect, ObjectBuilder, Value};
//!
//! #[derive(Introspect)]
//! struct Account {
//!     name: String,
//!     #[json(rename = "isActive")]
//!     active: bool,
//!     #[json(ignore)]
//!     password: String,
//! }
//!
//! let account = Account {
//!     name: "ada".into(),
//!     active: true,
//!     password: "secret".into(),
//! };
//! let object = ObjectBuilder::new().with_object(&account)?.build()?;
//! assert_eq!(object.get("name"), Some(&Value::String("ada".into())));
//! assert_eq!(object.get("isActive"), Some(&Value::Bool(true)));
//! assert!(!object.contains_key("password"));
//!
//! let mut map = BTreeMap::new();
//! map.insert("x", Some(1));
//! map.insert("y", None);
//! let object = ObjectBuilder::new().with_map(&map)?.build()?;
//! assert_eq!(object.len(), 1);
//! # Ok::<(), carbonyl_core::Error>(())
//! ```

extern crate self as carbonyl_core;

mod ancestry;
mod builder;
mod bundle;
mod config;
mod error;
mod introspect;
mod normalize;
mod parse;
mod storage;
mod token;
mod tokenizer;
mod value;

pub use ancestry::{Ancestry, Identity};
pub use builder::ObjectBuilder;
pub use bundle::{MemoryBundle, ResourceBundle, TomlBundle};
pub use config::{BuilderConfig, LimitsConfig};
pub use error::{ConfigError, Error, SourceKind};
pub use introspect::{
    AccessError, Annotation, Fields, Introspect, Member, MemberKind, MemberVisitor, Resource,
    key_from_accessor,
};
pub use normalize::{DisplayText, Host, MapKey, Mapping, Normalizer, Wrap, wrap};
pub use parse::{Parser, parse_document};
pub use storage::{
    BTreeMapFactory, HashMapFactory, IndexMapFactory, MapFactory, ObjectMap, StorageKind,
};
pub use token::{Position, Token};
pub use tokenizer::{TextTokenizer, Tokenizer, parse_number};
pub use value::{Object, RawJson, Value};

#[cfg(feature = "derive")]
pub use carbonyl_derive::{Fields, Introspect, Wrap, accessors};
