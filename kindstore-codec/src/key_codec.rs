//! Key construction from caller-supplied identifiers.

use kindstore_model::{Identifier, Key, PathElement, Value};

/// Builds store keys for one kind, with an optional default namespace.
#[derive(Debug, Clone)]
pub struct KeyCodec {
    kind: String,
    namespace: Option<String>,
}

impl KeyCodec {
    /// Creates a codec for the given default kind and namespace.
    pub fn new(kind: impl Into<String>, namespace: Option<String>) -> Self {
        Self {
            kind: kind.into(),
            namespace,
        }
    }

    /// The default kind used when a call does not override it.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// The default namespace used when a call does not override it.
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Resolves the key for `id`.
    ///
    /// - `Value::Key` is taken as a fully specified key.
    /// - Path arrays (`[kind, id, kind, id, ...]`) and `{namespace, path}`
    ///   maps become multi-element keys under the resolved namespace.
    /// - Scalars become `[kind, id]`; canonical decimal strings are coerced
    ///   to numeric ids, so `"42"` and `42` name the same record.
    /// - `None` or `Null` yields an incomplete key the store completes on write.
    ///
    /// `kind` and `namespace` fall back to the codec defaults.
    pub fn make_key(&self, id: Option<&Value>, kind: Option<&str>, namespace: Option<&str>) -> Key {
        let kind = kind.unwrap_or(&self.kind);
        let namespace = namespace
            .or(self.namespace.as_deref())
            .map(str::to_string);

        match id {
            Some(Value::Key(key)) => key.clone(),
            Some(Value::Array(items)) => {
                let path = path_from_array(items);
                if path.is_empty() {
                    return Key::incomplete(kind).with_namespace(namespace);
                }
                Key::from_path(path).with_namespace(namespace)
            }
            Some(Value::Map(map)) => {
                let path = map
                    .get("path")
                    .and_then(Value::as_array)
                    .map(path_from_array)
                    .unwrap_or_default();
                if path.is_empty() {
                    return Key::incomplete(kind).with_namespace(namespace);
                }
                let namespace = map
                    .get("namespace")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .or(namespace);
                Key::from_path(path).with_namespace(namespace)
            }
            Some(other) => match identifier_from_value(other) {
                Some(identifier) => Key::new(kind, identifier).with_namespace(namespace),
                None => Key::incomplete(kind).with_namespace(namespace),
            },
            None => Key::incomplete(kind).with_namespace(namespace),
        }
    }

    /// Resolves the key for `id` nested under `parent`.
    ///
    /// Scalar and missing ids become a child element of `parent`; composite
    /// ids already carry their own path and resolve as in [`Self::make_key`].
    pub fn make_nested_key(
        &self,
        parent: Option<&Key>,
        id: Option<&Value>,
        kind: Option<&str>,
        namespace: Option<&str>,
    ) -> Key {
        let Some(parent) = parent else {
            return self.make_key(id, kind, namespace);
        };
        match id {
            Some(Value::Key(_) | Value::Array(_) | Value::Map(_)) => self.make_key(id, kind, namespace),
            _ => parent.child(PathElement {
                kind: kind.unwrap_or(&self.kind).to_string(),
                id: id.and_then(identifier_from_value),
            }),
        }
    }
}

/// Parses a textual id, coercing canonical decimal integers to `Id`.
///
/// Only strings that print back identically are coerced: `"42"` becomes
/// `Id(42)` while `"042"` and `"+42"` stay names.
pub fn parse_identifier(text: &str) -> Identifier {
    match text.parse::<i64>() {
        Ok(id) if id.to_string() == text => Identifier::Id(id),
        _ => Identifier::Name(text.to_string()),
    }
}

/// Converts a scalar value into an identifier. `Null` and composite values
/// have no scalar identifier.
pub fn identifier_from_value(value: &Value) -> Option<Identifier> {
    match value {
        Value::Integer(id) => Some(Identifier::Id(*id)),
        Value::String(text) => Some(parse_identifier(text)),
        Value::Double(d) if d.fract() == 0.0 && d.abs() < i64::MAX as f64 => {
            Some(Identifier::Id(*d as i64))
        }
        Value::Double(d) => Some(Identifier::Name(d.to_string())),
        Value::Boolean(b) => Some(Identifier::Name(b.to_string())),
        Value::Blob(bytes) => Some(parse_identifier(&String::from_utf8_lossy(bytes))),
        Value::Key(key) => key.id().cloned(),
        Value::Null | Value::Array(_) | Value::Map(_) => None,
    }
}

/// The value a record exposes for an identifier.
pub fn identifier_value(id: &Identifier) -> Value {
    match id {
        Identifier::Id(id) => Value::Integer(*id),
        Identifier::Name(name) => Value::String(name.clone()),
    }
}

/// Reads a path array. Accepts flat `[kind, id, ...]` pairs, where an odd
/// trailing kind is an incomplete element, or a list of `{kind, id}` maps.
///
/// A map element without a string `kind` makes the whole path malformed and
/// yields an empty path, which callers resolve to an incomplete key.
fn path_from_array(items: &[Value]) -> Vec<PathElement> {
    if items.iter().all(|item| matches!(item, Value::Map(_))) {
        return items
            .iter()
            .map(|item| {
                let map = match item {
                    Value::Map(map) => map,
                    _ => return None,
                };
                let kind = map.get("kind").and_then(Value::as_str)?;
                Some(PathElement {
                    kind: kind.to_string(),
                    id: map.get("id").and_then(identifier_from_value),
                })
            })
            .collect::<Option<Vec<_>>>()
            .unwrap_or_default();
    }

    items
        .chunks(2)
        .map(|pair| {
            let kind = match &pair[0] {
                Value::String(kind) => kind.clone(),
                other => identifier_from_value(other)
                    .map(|id| id.to_string())
                    .unwrap_or_default(),
            };
            PathElement {
                kind,
                id: pair.get(1).and_then(identifier_from_value),
            }
        })
        .collect()
}
