//! Service configuration.

use serde::{Deserialize, Serialize};

/// Configuration fixed at service construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Default kind (collection name) for keys and queries.
    pub kind: String,
    /// Record property that carries the key's identifier.
    pub id_field: String,
    /// Default namespace applied to every key.
    pub namespace: Option<String>,
    /// Exclude oversized properties from indexing unless a call says otherwise.
    pub auto_index: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            kind: "Record".to_string(),
            id_field: "id".to_string(),
            namespace: None,
            auto_index: false,
        }
    }
}

impl ServiceConfig {
    /// Creates a config for `kind` with every other setting at its default.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            ..Default::default()
        }
    }

    /// Parses a config from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    #[must_use]
    pub fn with_id_field(mut self, id_field: impl Into<String>) -> Self {
        self.id_field = id_field.into();
        self
    }

    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    #[must_use]
    pub fn with_auto_index(mut self, auto_index: bool) -> Self {
        self.auto_index = auto_index;
        self
    }
}
