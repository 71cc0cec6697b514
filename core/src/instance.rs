//! The flat component instance record.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::id::{ComponentId, InstanceId};

/// One placement of a component in a tree.
///
/// Instances are stored flat: nesting is expressed only through
/// `parent_uuid` and `slot`. A root-level instance has neither; every other
/// instance has both. Records that break that rule still deserialize so the
/// topology resolver can report them as structural violations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentInstance {
    uuid: InstanceId,
    component_id: ComponentId,
    component_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    parent_uuid: Option<InstanceId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    slot: Option<String>,
    #[serde(default)]
    inputs: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    label: Option<String>,
}

/// Where an instance claims to sit, as read from its record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement<'a> {
    /// Directly under the synthetic root.
    Root,
    /// In the named slot of another instance.
    Child {
        /// The parent instance.
        parent: &'a InstanceId,
        /// The parent's slot.
        slot: &'a str,
    },
    /// A slot without a parent.
    SlotWithoutParent(&'a str),
    /// A parent without a slot.
    ParentWithoutSlot(&'a InstanceId),
}

impl ComponentInstance {
    /// Creates a root-level instance with no inputs.
    pub fn new(
        uuid: impl Into<InstanceId>,
        component_id: impl Into<ComponentId>,
        component_version: impl Into<String>,
    ) -> Self {
        Self {
            uuid: uuid.into(),
            component_id: component_id.into(),
            component_version: component_version.into(),
            parent_uuid: None,
            slot: None,
            inputs: Map::new(),
            label: None,
        }
    }

    /// Places the instance in `slot` of `parent`.
    #[must_use]
    pub fn in_slot(mut self, parent: impl Into<InstanceId>, slot: impl Into<String>) -> Self {
        self.parent_uuid = Some(parent.into());
        self.slot = Some(slot.into());
        self
    }

    /// Replaces the whole input bag.
    #[must_use]
    pub fn with_inputs(mut self, inputs: Map<String, Value>) -> Self {
        self.inputs = inputs;
        self
    }

    /// Sets one stored input.
    #[must_use]
    pub fn with_input(mut self, prop: impl Into<String>, value: Value) -> Self {
        self.inputs.insert(prop.into(), value);
        self
    }

    /// Sets the author-facing label.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// The instance identifier.
    #[must_use]
    pub const fn uuid(&self) -> &InstanceId {
        &self.uuid
    }

    /// The referenced component definition.
    #[must_use]
    pub const fn component_id(&self) -> &ComponentId {
        &self.component_id
    }

    /// The component version pinned when the instance was authored.
    #[must_use]
    pub fn component_version(&self) -> &str {
        &self.component_version
    }

    /// The parent instance, if any.
    #[must_use]
    pub const fn parent_uuid(&self) -> Option<&InstanceId> {
        self.parent_uuid.as_ref()
    }

    /// The parent's slot this instance occupies, if any.
    #[must_use]
    pub fn slot(&self) -> Option<&str> {
        self.slot.as_deref()
    }

    /// Classifies the parent/slot pair.
    #[must_use]
    pub fn placement(&self) -> Placement<'_> {
        match (&self.parent_uuid, &self.slot) {
            (None, None) => Placement::Root,
            (Some(parent), Some(slot)) => Placement::Child { parent, slot },
            (None, Some(slot)) => Placement::SlotWithoutParent(slot),
            (Some(parent), None) => Placement::ParentWithoutSlot(parent),
        }
    }

    /// The stored inputs, keyed by prop name.
    #[must_use]
    pub const fn inputs(&self) -> &Map<String, Value> {
        &self.inputs
    }

    /// Stores an input, returning the previous one.
    pub fn set_input(&mut self, prop: impl Into<String>, value: Value) -> Option<Value> {
        self.inputs.insert(prop.into(), value)
    }

    /// Removes an input, returning it.
    pub fn remove_input(&mut self, prop: &str) -> Option<Value> {
        self.inputs.remove(prop)
    }

    /// The author-facing label.
    #[must_use]
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Sets or clears the author-facing label.
    pub fn set_label(&mut self, label: Option<String>) {
        self.label = label;
    }

    /// Points the instance at another component.
    ///
    /// Stored inputs are kept; they are re-validated against the new schema.
    pub fn reassign(&mut self, component_id: ComponentId, component_version: impl Into<String>) {
        self.component_id = component_id;
        self.component_version = component_version.into();
    }

    pub(crate) fn set_placement(&mut self, placement: Option<(InstanceId, String)>) {
        match placement {
            Some((parent, slot)) => {
                self.parent_uuid = Some(parent);
                self.slot = Some(slot);
            }
            None => {
                self.parent_uuid = None;
                self.slot = None;
            }
        }
    }
}
