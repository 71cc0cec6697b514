//! Flattening caller-authored nested structures.
//!
//! Editors and generators often hand over a component tree already nested:
//! components with their children inside named slots. Before such a structure
//! can be validated it is flattened into a [`ComponentTree`]. Every instance
//! remembers where it came from as a [`NestedPath`], so validation errors can
//! be reported against what the caller actually wrote.

use core::fmt;
use std::collections::HashMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::TreeError;
use crate::id::{ComponentId, InstanceId};
use crate::instance::ComponentInstance;
use crate::tree::ComponentTree;
use crate::validate::ValidationError;

/// A component with its children nested in slots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NestedComponent {
    /// Kept if given; generated otherwise.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<InstanceId>,
    /// The component definition.
    pub component_id: ComponentId,
    /// The pinned version.
    pub component_version: String,
    /// Stored inputs.
    #[serde(default)]
    pub inputs: Map<String, Value>,
    /// Author-facing label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Children by slot, in order.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub slots: IndexMap<String, Vec<NestedComponent>>,
}

/// Position of a component in the caller's nested structure.
///
/// Displays as a JSON pointer, e.g. `/0/slots/content/1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NestedPath {
    root: usize,
    steps: Vec<(String, usize)>,
}

impl NestedPath {
    const fn root(position: usize) -> Self {
        Self {
            root: position,
            steps: Vec::new(),
        }
    }

    fn child(&self, slot: &str, position: usize) -> Self {
        let mut steps = self.steps.clone();
        steps.push((slot.to_owned(), position));
        Self {
            root: self.root,
            steps,
        }
    }

    /// Position among the top-level components.
    #[must_use]
    pub const fn root_position(&self) -> usize {
        self.root
    }

    /// `(slot, position)` steps from the top-level component down.
    #[must_use]
    pub fn steps(&self) -> &[(String, usize)] {
        &self.steps
    }
}

impl fmt::Display for NestedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.root)?;
        for (slot, position) in &self.steps {
            let escaped = slot.replace('~', "~0").replace('/', "~1");
            write!(f, "/slots/{escaped}/{position}")?;
        }
        Ok(())
    }
}

impl Serialize for NestedPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A flattened nested structure plus the way back.
#[derive(Debug, Clone, PartialEq)]
pub struct FlattenedTree {
    tree: ComponentTree,
    paths: HashMap<InstanceId, NestedPath>,
}

impl FlattenedTree {
    /// The flat tree.
    #[must_use]
    pub const fn tree(&self) -> &ComponentTree {
        &self.tree
    }

    /// Consumes self, returning the flat tree.
    #[must_use]
    pub fn into_tree(self) -> ComponentTree {
        self.tree
    }

    /// Where an instance came from.
    #[must_use]
    pub fn path_of(&self, uuid: &InstanceId) -> Option<&NestedPath> {
        self.paths.get(uuid)
    }

    /// Where the instance a validation error is about came from.
    #[must_use]
    pub fn locate(&self, error: &ValidationError) -> Option<&NestedPath> {
        self.path_of(&error.uuid)
    }
}

/// Flattens `components` depth-first, parents before children.
///
/// # Errors
///
/// Returns [`TreeError::DuplicateUuid`] if two components carry the same uuid.
pub fn flatten_nested(
    components: impl IntoIterator<Item = NestedComponent>,
) -> Result<FlattenedTree, TreeError> {
    let mut flattened = FlattenedTree {
        tree: ComponentTree::new(),
        paths: HashMap::new(),
    };
    for (position, component) in components.into_iter().enumerate() {
        push(&mut flattened, component, None, NestedPath::root(position))?;
    }
    Ok(flattened)
}

fn push(
    flattened: &mut FlattenedTree,
    component: NestedComponent,
    parent: Option<(&InstanceId, &str)>,
    path: NestedPath,
) -> Result<(), TreeError> {
    let NestedComponent {
        uuid,
        component_id,
        component_version,
        inputs,
        label,
        slots,
    } = component;
    let uuid = uuid.unwrap_or_else(InstanceId::generate);

    let mut instance =
        ComponentInstance::new(uuid.clone(), component_id, component_version).with_inputs(inputs);
    if let Some(label) = label {
        instance = instance.with_label(label);
    }
    if let Some((parent, slot)) = parent {
        instance = instance.in_slot(parent.clone(), slot);
    }
    flattened.tree.append(instance)?;

    for (slot, children) in slots {
        for (position, child) in children.into_iter().enumerate() {
            push(flattened, child, Some((&uuid, &slot)), path.child(&slot, position))?;
        }
    }
    flattened.paths.insert(uuid, path);
    Ok(())
}
