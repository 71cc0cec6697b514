//! Component definitions and the loader contract.
//!
//! A definition is versioned: every instance pins the version it was authored
//! against, so an evolving schema never silently reinterprets stored inputs.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt::Debug;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::id::ComponentId;
use crate::prop_source::{PropSource, StaticShape};

/// Who ships a component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "name", rename_all = "snake_case")]
pub enum Provider {
    /// A module.
    Module(String),
    /// A theme.
    Theme(String),
}

/// One prop of a component schema.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PropDefinition {
    /// Whether hydration fails without a value.
    #[serde(default)]
    pub required: bool,
    /// Storage shape for collapsed static inputs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shape: Option<StaticShape>,
    /// Used when the instance stores no input for the prop.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<PropSource>,
}

impl PropDefinition {
    /// An optional prop with no shape or default.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A required prop with no shape or default.
    #[must_use]
    pub fn required() -> Self {
        Self {
            required: true,
            ..Self::default()
        }
    }

    /// Sets the static shape.
    #[must_use]
    pub fn with_shape(mut self, shape: StaticShape) -> Self {
        self.shape = Some(shape);
        self
    }

    /// Sets the default source.
    #[must_use]
    pub fn with_default(mut self, source: impl Into<PropSource>) -> Self {
        self.default = Some(source.into());
        self
    }
}

/// The props and slots of one component version.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ComponentSchema {
    /// Props in declaration order.
    #[serde(default)]
    pub props: IndexMap<String, PropDefinition>,
    /// Slot names.
    #[serde(default)]
    pub slots: Vec<String>,
}

impl ComponentSchema {
    /// An empty schema.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a prop.
    #[must_use]
    pub fn with_prop(mut self, name: impl Into<String>, prop: PropDefinition) -> Self {
        self.props.insert(name.into(), prop);
        self
    }

    /// Declares a slot.
    #[must_use]
    pub fn with_slot(mut self, name: impl Into<String>) -> Self {
        self.slots.push(name.into());
        self
    }

    /// Returns true if the slot is declared.
    #[must_use]
    pub fn has_slot(&self, name: &str) -> bool {
        self.slots.iter().any(|slot| slot == name)
    }
}

/// A reusable, parameterized component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentDefinition {
    id: ComponentId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    label: Option<String>,
    provider: Provider,
    /// Directory relative URLs shipped with the component resolve against.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    base_path: Option<String>,
    active_version: String,
    versions: BTreeMap<String, ComponentSchema>,
}

impl ComponentDefinition {
    /// Creates a definition whose only and active version is `version`.
    pub fn new(
        id: impl Into<ComponentId>,
        provider: Provider,
        version: impl Into<String>,
        schema: ComponentSchema,
    ) -> Self {
        let version = version.into();
        Self {
            id: id.into(),
            label: None,
            provider,
            base_path: None,
            versions: BTreeMap::from([(version.clone(), schema)]),
            active_version: version,
        }
    }

    /// Sets the human-readable label.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Sets the component directory.
    #[must_use]
    pub fn with_base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = Some(base_path.into());
        self
    }

    /// Adds a version and makes it active.
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>, schema: ComponentSchema) -> Self {
        let version = version.into();
        self.versions.insert(version.clone(), schema);
        self.active_version = version;
        self
    }

    /// The identifier.
    #[must_use]
    pub const fn id(&self) -> &ComponentId {
        &self.id
    }

    /// The label, if set.
    #[must_use]
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Who ships the component.
    #[must_use]
    pub const fn provider(&self) -> &Provider {
        &self.provider
    }

    /// The component directory, if set.
    #[must_use]
    pub fn base_path(&self) -> Option<&str> {
        self.base_path.as_deref()
    }

    /// The version new instances pin.
    #[must_use]
    pub fn active_version(&self) -> &str {
        &self.active_version
    }

    /// The schema of a pinned version.
    #[must_use]
    pub fn schema(&self, version: &str) -> Option<&ComponentSchema> {
        self.versions.get(version)
    }

    /// Known versions in sorted order.
    pub fn versions(&self) -> impl Iterator<Item = &str> {
        self.versions.keys().map(String::as_str)
    }
}

/// Loads component definitions for a hydration or validation pass.
pub trait DefinitionLoader: Debug {
    /// Loads every id it can; ids it cannot load are absent from the result.
    fn load_many(&self, ids: &BTreeSet<ComponentId>) -> HashMap<ComponentId, Arc<ComponentDefinition>>;
}

/// An in-memory set of definitions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<ComponentDefinition>", into = "Vec<ComponentDefinition>")]
pub struct DefinitionSet {
    definitions: BTreeMap<ComponentId, Arc<ComponentDefinition>>,
}

impl DefinitionSet {
    /// An empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a definition, replacing any with the same id.
    pub fn insert(&mut self, definition: ComponentDefinition) -> &mut Self {
        self.definitions
            .insert(definition.id().clone(), Arc::new(definition));
        self
    }

    /// Looks up a definition.
    #[must_use]
    pub fn get(&self, id: &ComponentId) -> Option<&ComponentDefinition> {
        self.definitions.get(id).map(|definition| &**definition)
    }

    /// Number of definitions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Returns true if there are no definitions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

impl DefinitionLoader for DefinitionSet {
    fn load_many(&self, ids: &BTreeSet<ComponentId>) -> HashMap<ComponentId, Arc<ComponentDefinition>> {
        ids.iter()
            .filter_map(|id| {
                self.definitions
                    .get(id)
                    .map(|definition| (id.clone(), Arc::clone(definition)))
            })
            .collect()
    }
}

impl From<Vec<ComponentDefinition>> for DefinitionSet {
    fn from(definitions: Vec<ComponentDefinition>) -> Self {
        definitions.into_iter().collect()
    }
}

impl From<DefinitionSet> for Vec<ComponentDefinition> {
    fn from(set: DefinitionSet) -> Self {
        set.definitions
            .into_values()
            .map(Arc::unwrap_or_clone)
            .collect()
    }
}

impl FromIterator<ComponentDefinition> for DefinitionSet {
    fn from_iter<T: IntoIterator<Item = ComponentDefinition>>(iter: T) -> Self {
        let mut set = Self::new();
        for definition in iter {
            set.insert(definition);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reads_definitions_from_json() {
        let set: DefinitionSet = serde_json::from_value(json!([{
            "id": "sdc.test.card",
            "provider": {"type": "theme", "name": "olivero"},
            "base_path": "/themes/olivero/components/card/",
            "active_version": "v2",
            "versions": {
                "v1": {"props": {"title": {"required": true}}, "slots": ["content"]},
                "v2": {
                    "props": {
                        "title": {"required": true, "shape": {"field_type": "string"}},
                        "image": {"default": {
                            "sourceType": "default-relative-url",
                            "value": "a.png",
                            "jsonSchema": {"type": "string"},
                            "componentId": "sdc.test.card"
                        }}
                    },
                    "slots": ["content", "footer"]
                }
            }
        }]))
        .unwrap();

        let card = set.get(&"sdc.test.card".into()).unwrap();
        assert_eq!(card.provider(), &Provider::Theme("olivero".into()));
        assert_eq!(card.versions().collect::<Vec<_>>(), ["v1", "v2"]);
        assert!(!card.schema("v1").unwrap().has_slot("footer"));
        let v2 = card.schema("v2").unwrap();
        assert!(v2.has_slot("footer"));
        assert!(v2.props["image"].default.is_some());
        assert!(card.schema("v3").is_none());
    }

    #[test]
    fn load_many_skips_unknown_ids() {
        let mut set = DefinitionSet::new();
        set.insert(ComponentDefinition::new(
            "sdc.test.card",
            Provider::Module("sdc_test".into()),
            "v1",
            ComponentSchema::new(),
        ));
        let ids = BTreeSet::from([ComponentId::from("sdc.test.card"), ComponentId::from("missing")]);
        let loaded = set.load_many(&ids);
        assert_eq!(loaded.len(), 1);
        assert!(loaded.contains_key(&ComponentId::from("sdc.test.card")));
    }
}
