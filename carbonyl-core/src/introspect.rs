//! Property discovery: how a value exposes named members to the normalizer.
//!
//! A type describes itself by implementing [`Introspect`], usually through
//! `#[derive(Introspect)]` (one member per field) or `#[accessors]` on an
//! `impl` block (one member per getter-style method). Each member carries the
//! name it was declared with plus any rename/ignore annotations; the key it
//! ends up under is decided by [`Member::resolve_key`].

use std::borrow::Cow;

use log::{debug, trace};

use crate::ancestry::{Ancestry, Identity};
use crate::error::Error;
use crate::normalize::{Normalizer, Wrap};
use crate::value::Object;

/// A value that can enumerate its members.
pub trait Introspect {
    /// Reports every candidate member to `visitor`, in declaration order.
    fn visit_members(&self, visitor: &mut dyn MemberVisitor) -> Result<(), Error>;

    /// Identity used for cycle detection.
    fn identity(&self) -> Identity {
        Identity::of(self)
    }
}

/// Receives members from [`Introspect::visit_members`].
pub trait MemberVisitor {
    /// `value` is the member's value, or the failure obtaining it.
    fn visit(&mut self, member: &Member, value: Result<&dyn Wrap, AccessError>) -> Result<(), Error>;
}

/// Lookup of fields by their declared name.
pub trait Fields {
    fn field_names(&self) -> &'static [&'static str];

    fn field(&self, name: &str) -> Option<&dyn Wrap>;
}

/// A value holding a resource that must be released once it has been read.
pub trait Resource {
    fn close(&self) -> std::io::Result<()>;
}

/// Failure to obtain a member's value. Never aborts a build.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("member access failed: {message}")]
pub struct AccessError {
    message: String,
}

impl AccessError {
    pub fn new(message: impl Into<String>) -> Self {
        AccessError {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    /// Getter-style method; its key is derived from the method name.
    Accessor,
    /// Plain field; its key is the field name.
    Field,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Annotation {
    Ignore,
    Rename(Cow<'static, str>),
}

/// Description of one candidate member.
///
/// Annotations are tagged with the depth at which they were declared: 0 on
/// the concrete type, one more for each trait or wrapped type they were
/// inherited through.
#[derive(Debug, Clone)]
pub struct Member {
    name: Cow<'static, str>,
    kind: MemberKind,
    annotations: Vec<(usize, Annotation)>,
}

impl Member {
    pub fn accessor(name: impl Into<Cow<'static, str>>) -> Self {
        Self::new(name, MemberKind::Accessor)
    }

    pub fn field(name: impl Into<Cow<'static, str>>) -> Self {
        Self::new(name, MemberKind::Field)
    }

    fn new(name: impl Into<Cow<'static, str>>, kind: MemberKind) -> Self {
        Member {
            name: name.into(),
            kind,
            annotations: Vec::new(),
        }
    }

    pub fn ignored(self) -> Self {
        self.ignored_at(0)
    }

    pub fn ignored_at(mut self, depth: usize) -> Self {
        self.annotations.push((depth, Annotation::Ignore));
        self
    }

    pub fn renamed(self, key: impl Into<Cow<'static, str>>) -> Self {
        self.renamed_at(0, key)
    }

    pub fn renamed_at(mut self, depth: usize, key: impl Into<Cow<'static, str>>) -> Self {
        self.annotations.push((depth, Annotation::Rename(key.into())));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> MemberKind {
        self.kind
    }

    /// The key this member is published under, or `None` if it is skipped.
    ///
    /// An ignore marker wins unless a rename sits strictly closer to the
    /// concrete type. The closest non-empty rename is used verbatim. Failing
    /// that, fields keep their name and accessors go through
    /// [`key_from_accessor`].
    pub fn resolve_key(&self) -> Option<Cow<'_, str>> {
        let ignored = self
            .annotations
            .iter()
            .filter(|(_, a)| matches!(a, Annotation::Ignore))
            .map(|(depth, _)| *depth)
            .min();
        let renamed = self
            .annotations
            .iter()
            .filter_map(|(depth, a)| match a {
                Annotation::Rename(key) => Some((*depth, key)),
                Annotation::Ignore => None,
            })
            .min_by_key(|(depth, _)| *depth);

        if let Some(ignored) = ignored {
            match renamed {
                Some((depth, _)) if depth < ignored => {}
                _ => return None,
            }
        }

        if let Some((_, key)) = renamed {
            if !key.is_empty() {
                return Some(Cow::Borrowed(key));
            }
        }

        match self.kind {
            MemberKind::Field if !self.name.is_empty() => Some(Cow::Borrowed(&self.name)),
            MemberKind::Field => None,
            MemberKind::Accessor => key_from_accessor(&self.name).map(Cow::Owned),
        }
    }
}

/// Derives a key from a getter-style method name.
///
/// `get_value`/`is_active` lose their prefix. For `getValue`/`isActive` the
/// remainder must start with an upper-case letter; its first letter is then
/// lower-cased unless the second is upper-case too, so `getURL` stays `URL`.
/// Bare `get`/`is` and names without a prefix produce no key.
pub fn key_from_accessor(name: &str) -> Option<String> {
    for prefix in ["get_", "is_"] {
        if let Some(rest) = name.strip_prefix(prefix) {
            return (!rest.is_empty()).then(|| rest.to_string());
        }
    }

    let rest = name
        .strip_prefix("get")
        .or_else(|| name.strip_prefix("is"))
        .filter(|rest| !rest.is_empty())?;

    let mut chars = rest.chars();
    let first = chars.next()?;
    if !first.is_uppercase() {
        return None;
    }
    match chars.next() {
        Some(second) if second.is_uppercase() => Some(rest.to_string()),
        _ => Some(
            first
                .to_lowercase()
                .chain(rest[first.len_utf8()..].chars())
                .collect(),
        ),
    }
}

/// Visitor that normalizes each resolved member into an object.
struct PropertyCollector<'n, 'f, 'o> {
    normalizer: &'n mut Normalizer<'f>,
    object: &'o mut Object,
    ancestry: &'o mut Ancestry,
}

impl MemberVisitor for PropertyCollector<'_, '_, '_> {
    fn visit(&mut self, member: &Member, value: Result<&dyn Wrap, AccessError>) -> Result<(), Error> {
        let Some(key) = member.resolve_key() else {
            trace!("skipping member {}", member.name());
            return Ok(());
        };
        let value = match value {
            Ok(value) => value,
            Err(err) => {
                trace!("skipping member {}: {err}", member.name());
                return Ok(());
            }
        };

        let wrapped = self.normalizer.wrap_keyed(&key, value, self.ancestry);
        if let Some(resource) = value.as_resource() {
            if let Err(err) = resource.close() {
                debug!("closing value of {key:?} failed: {err}");
            }
        }

        if let Some(wrapped) = wrapped? {
            self.object.put(key.into_owned(), wrapped)?;
        }
        Ok(())
    }
}

/// Walks `source`'s members into `object`. The caller owns the ancestry
/// bookkeeping for `source` itself.
pub(crate) fn populate_members(
    normalizer: &mut Normalizer<'_>,
    object: &mut Object,
    source: &dyn Introspect,
    ancestry: &mut Ancestry,
) -> Result<(), Error> {
    let mut collector = PropertyCollector {
        normalizer,
        object,
        ancestry,
    };
    source.visit_members(&mut collector)
}
