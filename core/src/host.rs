//! Host content context.
//!
//! Dynamic and host-entity URL prop sources read from the content item the
//! component tree is rendered for. The engine only sees it through
//! [`HostEntity`]; storage is somebody else's problem.

use core::fmt::Debug;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The content item a component tree is rendered for.
pub trait HostEntity: Debug {
    /// Entity type, e.g. `node`.
    fn entity_type_id(&self) -> &str;

    /// Bundle within the entity type, e.g. `article`.
    fn bundle(&self) -> &str;

    /// Stored identifier; `None` for unsaved content.
    fn id(&self) -> Option<&str>;

    /// Raw field value: a list of items, each usually an object of properties.
    fn field(&self, name: &str) -> Option<&Value>;

    /// Site-relative canonical path, e.g. `/node/1`; `None` if it has none yet.
    fn canonical_path(&self) -> Option<&str>;

    /// `entity_type:bundle`.
    fn type_label(&self) -> String {
        format!("{}:{}", self.entity_type_id(), self.bundle())
    }
}

/// A host entity read from JSON.
///
/// ```json
/// {
///   "entity_type": "node",
///   "bundle": "article",
///   "id": "1",
///   "path": "/node/1",
///   "fields": { "title": [{ "value": "Hello" }] }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonEntity {
    entity_type: String,
    bundle: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    path: Option<String>,
    #[serde(default)]
    fields: Map<String, Value>,
}

impl JsonEntity {
    /// Creates an unsaved entity with no fields.
    pub fn new(entity_type: impl Into<String>, bundle: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            bundle: bundle.into(),
            id: None,
            path: None,
            fields: Map::new(),
        }
    }

    /// Sets the stored identifier.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Sets the canonical path.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Sets a raw field value.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: Value) -> Self {
        self.fields.insert(name.into(), value);
        self
    }
}

impl HostEntity for JsonEntity {
    fn entity_type_id(&self) -> &str {
        &self.entity_type
    }

    fn bundle(&self) -> &str {
        &self.bundle
    }

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    fn canonical_path(&self) -> Option<&str> {
        self.path.as_deref()
    }
}
