use std::fmt;

use crate::introspect::AccessError;
use crate::token::Position;

/// Error type for object construction.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed token stream: missing delimiters, duplicate keys, premature end.
    #[error("{message} at {position}")]
    Syntax { message: String, position: Position },

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A value graph refers back to one of its own ancestors.
    #[error("object contains recursively defined member of key {key:?}")]
    Cycle { key: String },

    #[error("nesting exceeds the limit of {limit} levels")]
    DepthExceeded { limit: usize },

    #[error("null key")]
    NullKey,

    #[error("duplicate key {key:?}")]
    DuplicateKey { key: String },

    #[error("JSON does not allow non-finite numbers")]
    NonFinite,

    #[error(transparent)]
    Access(#[from] AccessError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Returns true for failures that wrapping recovers from by omitting the
    /// affected value instead of aborting the enclosing build.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::NullKey | Error::Access(_))
    }
}

/// Rejected builder configuration. Raised by the `with_*` methods, never by `build`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("only one {0} source can be specified")]
    DuplicateSource(SourceKind),
}

/// Source categories accepted by [`ObjectBuilder`](crate::ObjectBuilder).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    PriorObject,
    Tokens,
    Mapping,
    /// Introspected value, with or without an explicit field-name list.
    Bean,
    Bundle,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SourceKind::PriorObject => "JSON object",
            SourceKind::Tokens => "token stream",
            SourceKind::Mapping => "map",
            SourceKind::Bean => "bean",
            SourceKind::Bundle => "resource bundle",
        };
        f.write_str(name)
    }
}
