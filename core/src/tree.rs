//! The flat component tree store.
//!
//! A [`ComponentTree`] is the only persisted form of a component tree: an
//! ordered list of [`ComponentInstance`] records. Nesting is implied by each
//! record's `parent_uuid`/`slot` pair; the nested view is always recomputed by
//! [`Topology`](crate::topology::Topology) and the
//! [`Hydrator`](crate::hydrate::Hydrator), never stored.
//!
//! Storage order only matters among siblings sharing the same
//! `(parent_uuid, slot)`: their relative order is the order inside the slot.
//! Everything else about the order records were appended in is irrelevant.
//!
//! The store keeps no derived topology, so mutations have nothing to
//! invalidate.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{TopologyError, TreeError};
use crate::id::{ComponentId, InstanceId};
use crate::instance::ComponentInstance;
use crate::topology::Topology;

/// An ordered, flat collection of component instances with unique uuids.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<ComponentInstance>", into = "Vec<ComponentInstance>")]
pub struct ComponentTree {
    instances: Vec<ComponentInstance>,
    index: HashMap<InstanceId, usize>,
}

impl ComponentTree {
    /// Creates an empty tree.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a tree from records in storage order.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::DuplicateUuid`] for the first uuid that appears twice.
    pub fn from_instances(
        instances: impl IntoIterator<Item = ComponentInstance>,
    ) -> Result<Self, TreeError> {
        let mut tree = Self::new();
        for instance in instances {
            tree.append(instance)?;
        }
        Ok(tree)
    }

    /// Appends an instance at the end of the storage order.
    ///
    /// Within its slot the instance becomes the last child.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::DuplicateUuid`] if the uuid is already present.
    pub fn append(&mut self, instance: ComponentInstance) -> Result<(), TreeError> {
        if self.index.contains_key(instance.uuid()) {
            return Err(TreeError::DuplicateUuid(instance.uuid().clone()));
        }
        self.index
            .insert(instance.uuid().clone(), self.instances.len());
        self.instances.push(instance);
        Ok(())
    }

    /// Removes an instance and, transitively, every instance placed inside it.
    ///
    /// Returns the uuids of all removed instances.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::UnknownInstance`] if the uuid is not present.
    pub fn remove(&mut self, uuid: &InstanceId) -> Result<BTreeSet<InstanceId>, TreeError> {
        if !self.index.contains_key(uuid) {
            return Err(TreeError::UnknownInstance(uuid.clone()));
        }

        let children = self.children_by_parent();
        let mut removed = BTreeSet::new();
        let mut pending = vec![uuid.clone()];
        while let Some(current) = pending.pop() {
            // the visited check also stops at cycles
            if !removed.insert(current.clone()) {
                continue;
            }
            if let Some(kids) = children.get(&current) {
                pending.extend(kids.iter().map(|&i| self.instances[i].uuid().clone()));
            }
        }

        self.instances.retain(|i| !removed.contains(i.uuid()));
        self.reindex();
        debug!(root = %uuid, count = removed.len(), "removed component instances");
        Ok(removed)
    }

    /// Moves an instance into `slot` of `parent`, or to root level with `None`.
    ///
    /// The instance becomes the last child of its new slot. Its descendants
    /// move with it.
    ///
    /// # Errors
    ///
    /// - [`TreeError::UnknownInstance`] if the instance or the parent is absent.
    /// - [`TreeError::WouldCycle`] if the parent is the instance itself or one
    ///   of its descendants.
    pub fn move_instance(
        &mut self,
        uuid: &InstanceId,
        destination: Option<(InstanceId, String)>,
    ) -> Result<(), TreeError> {
        let position = *self
            .index
            .get(uuid)
            .ok_or_else(|| TreeError::UnknownInstance(uuid.clone()))?;

        if let Some((parent, _)) = &destination {
            if !self.index.contains_key(parent) {
                return Err(TreeError::UnknownInstance(parent.clone()));
            }
            if self.is_ancestor_or_self(uuid, parent) {
                return Err(TreeError::WouldCycle {
                    uuid: uuid.clone(),
                    parent: parent.clone(),
                });
            }
        }

        let mut instance = self.instances.remove(position);
        instance.set_placement(destination);
        self.instances.push(instance);
        self.reindex();
        Ok(())
    }

    /// Looks up an instance.
    #[must_use]
    pub fn get(&self, uuid: &InstanceId) -> Option<&ComponentInstance> {
        self.index.get(uuid).map(|&i| &self.instances[i])
    }

    /// Looks up an instance for editing its inputs or label.
    pub fn get_mut(&mut self, uuid: &InstanceId) -> Option<&mut ComponentInstance> {
        self.index.get(uuid).map(|&i| &mut self.instances[i])
    }

    /// Returns true if the uuid is present.
    #[must_use]
    pub fn contains(&self, uuid: &InstanceId) -> bool {
        self.index.contains_key(uuid)
    }

    /// Direct children of `parent`, optionally limited to one slot.
    ///
    /// Ordered canonically: by slot name, then by position within the slot.
    #[must_use]
    pub fn children_of(&self, parent: &InstanceId, slot: Option<&str>) -> Vec<&ComponentInstance> {
        let mut children: Vec<&ComponentInstance> = self
            .instances
            .iter()
            .filter(|i| i.parent_uuid() == Some(parent))
            .filter(|i| slot.is_none_or(|s| i.slot() == Some(s)))
            .collect();
        // stable: preserves storage order within a slot
        children.sort_by(|a, b| a.slot().cmp(&b.slot()));
        children
    }

    /// Root-level instances in storage order.
    pub fn roots(&self) -> impl Iterator<Item = &ComponentInstance> {
        self.instances
            .iter()
            .filter(|i| i.parent_uuid().is_none() && i.slot().is_none())
    }

    /// The distinct component definitions referenced by the tree.
    #[must_use]
    pub fn component_ids(&self) -> BTreeSet<ComponentId> {
        self.instances
            .iter()
            .map(|i| i.component_id().clone())
            .collect()
    }

    /// Resolves canonical and bottom-up orderings for the current contents.
    ///
    /// # Errors
    ///
    /// Returns [`TopologyError::CycleDetected`] if the tree contains a cycle.
    pub fn topology(&self) -> Result<Topology, TopologyError> {
        Topology::resolve(self)
    }

    /// Number of instances.
    #[must_use]
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    /// Returns true if the tree has no instances.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Iterates instances in storage order.
    pub fn iter(&self) -> core::slice::Iter<'_, ComponentInstance> {
        self.instances.iter()
    }

    /// The instances in storage order.
    #[must_use]
    pub fn instances(&self) -> &[ComponentInstance] {
        &self.instances
    }

    /// Consumes the tree, returning its records in storage order.
    #[must_use]
    pub fn into_instances(self) -> Vec<ComponentInstance> {
        self.instances
    }

    fn reindex(&mut self) {
        self.index = self
            .instances
            .iter()
            .enumerate()
            .map(|(i, instance)| (instance.uuid().clone(), i))
            .collect();
    }

    fn children_by_parent(&self) -> HashMap<InstanceId, Vec<usize>> {
        let mut children: HashMap<InstanceId, Vec<usize>> = HashMap::new();
        for (i, instance) in self.instances.iter().enumerate() {
            if let Some(parent) = instance.parent_uuid() {
                children.entry(parent.clone()).or_default().push(i);
            }
        }
        children
    }

    /// Returns true if `ancestor` is `node` or one of its ancestors.
    fn is_ancestor_or_self(&self, ancestor: &InstanceId, node: &InstanceId) -> bool {
        let mut current = Some(node);
        let mut steps = 0;
        while let Some(uuid) = current {
            if uuid == ancestor {
                return true;
            }
            // an existing cycle would otherwise spin forever
            steps += 1;
            if steps > self.instances.len() {
                return false;
            }
            current = self.get(uuid).and_then(ComponentInstance::parent_uuid);
        }
        false
    }
}

impl TryFrom<Vec<ComponentInstance>> for ComponentTree {
    type Error = TreeError;

    fn try_from(value: Vec<ComponentInstance>) -> Result<Self, Self::Error> {
        Self::from_instances(value)
    }
}

impl From<ComponentTree> for Vec<ComponentInstance> {
    fn from(tree: ComponentTree) -> Self {
        tree.instances
    }
}

impl<'a> IntoIterator for &'a ComponentTree {
    type Item = &'a ComponentInstance;
    type IntoIter = core::slice::Iter<'a, ComponentInstance>;

    fn into_iter(self) -> Self::IntoIter {
        self.instances.iter()
    }
}
