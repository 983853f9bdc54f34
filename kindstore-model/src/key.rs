//! Hierarchical store keys.
//!
//! A key is a non-empty path of `(kind, identifier)` elements, optionally
//! scoped by a namespace. The last element names the record itself; every
//! element before it is an ancestor.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The identifier part of a single path element.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Identifier {
    /// Numeric identifier, usually allocated by the store.
    Id(i64),
    /// Caller-chosen string identifier.
    Name(String),
}

impl Identifier {
    /// Returns the numeric form, if this is an `Id`.
    #[must_use]
    pub const fn as_id(&self) -> Option<i64> {
        match self {
            Self::Id(id) => Some(*id),
            Self::Name(_) => None,
        }
    }

    /// Returns the string form, if this is a `Name`.
    #[must_use]
    pub fn as_name(&self) -> Option<&str> {
        match self {
            Self::Id(_) => None,
            Self::Name(name) => Some(name),
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{id}"),
            Self::Name(name) => write!(f, "{name}"),
        }
    }
}

impl From<i64> for Identifier {
    fn from(id: i64) -> Self {
        Self::Id(id)
    }
}

impl From<i32> for Identifier {
    fn from(id: i32) -> Self {
        Self::Id(i64::from(id))
    }
}

impl From<&str> for Identifier {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<String> for Identifier {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

/// One `(kind, identifier)` segment of a key path.
///
/// An element without an identifier is incomplete: the store assigns a
/// numeric id when the entity is first written.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PathElement {
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Identifier>,
}

impl PathElement {
    /// Creates a complete path element.
    pub fn new(kind: impl Into<String>, id: impl Into<Identifier>) -> Self {
        Self {
            kind: kind.into(),
            id: Some(id.into()),
        }
    }

    /// Creates a path element whose id is left for the store to allocate.
    pub fn incomplete(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: None,
        }
    }
}

/// A full store key: namespace plus ancestor path.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Key {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub path: Vec<PathElement>,
}

impl Key {
    /// Creates a single-element key.
    pub fn new(kind: impl Into<String>, id: impl Into<Identifier>) -> Self {
        Self {
            namespace: None,
            path: vec![PathElement::new(kind, id)],
        }
    }

    /// Creates a single-element key with no identifier.
    pub fn incomplete(kind: impl Into<String>) -> Self {
        Self {
            namespace: None,
            path: vec![PathElement::incomplete(kind)],
        }
    }

    /// Creates a key from an explicit path.
    #[must_use]
    pub const fn from_path(path: Vec<PathElement>) -> Self {
        Self {
            namespace: None,
            path,
        }
    }

    /// Returns this key scoped to `namespace`.
    #[must_use]
    pub fn with_namespace(mut self, namespace: Option<String>) -> Self {
        self.namespace = namespace;
        self
    }

    /// Returns a key for a child element nested under this key.
    #[must_use]
    pub fn child(&self, element: PathElement) -> Self {
        let mut path = self.path.clone();
        path.push(element);
        Self {
            namespace: self.namespace.clone(),
            path,
        }
    }

    /// The record's own path element.
    #[must_use]
    pub fn last(&self) -> Option<&PathElement> {
        self.path.last()
    }

    /// The kind of the record this key names.
    #[must_use]
    pub fn kind(&self) -> Option<&str> {
        self.last().map(|element| element.kind.as_str())
    }

    /// The record's own identifier, `None` while the key is incomplete.
    #[must_use]
    pub fn id(&self) -> Option<&Identifier> {
        self.last().and_then(|element| element.id.as_ref())
    }

    /// Whether every path element carries an identifier.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.path.is_empty() && self.path.iter().all(|element| element.id.is_some())
    }

    /// Returns the parent key, or `None` for a root key.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.path.len() < 2 {
            return None;
        }
        Some(Self {
            namespace: self.namespace.clone(),
            path: self.path[..self.path.len() - 1].to_vec(),
        })
    }

    /// Whether `ancestor` is a prefix of this key's path in the same
    /// namespace. A key counts as its own ancestor, matching how
    /// hierarchical stores evaluate ancestor queries.
    #[must_use]
    pub fn has_ancestor(&self, ancestor: &Self) -> bool {
        self.namespace == ancestor.namespace
            && !ancestor.path.is_empty()
            && self.path.len() >= ancestor.path.len()
            && self.path[..ancestor.path.len()] == ancestor.path[..]
    }

    /// Fills in the record's own identifier on an incomplete key.
    pub fn complete_with(&mut self, id: Identifier) {
        if let Some(last) = self.path.last_mut() {
            last.id.get_or_insert(id);
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(namespace) = &self.namespace {
            write!(f, "{namespace}|")?;
        }
        for (i, element) in self.path.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            match &element.id {
                Some(id) => write!(f, "{}:{id}", element.kind)?,
                None => write!(f, "{}:?", element.kind)?,
            }
        }
        Ok(())
    }
}
