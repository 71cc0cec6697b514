//! # Tree Topology
//!
//! Derives two orderings from the flat, storage-order-independent instance list
//! of a [`ComponentTree`]:
//!
//! - **Canonical order** gives every reachable instance a [`CanonicalKey`]. A
//!   root instance's key is its position among roots; a child's key extends its
//!   parent's key with `(slot, delta)`, where `delta` is the child's position
//!   among siblings sharing the same parent and slot. Sorting by key yields a
//!   depth-first, left-to-right traversal that is the same no matter how
//!   non-sibling records are interleaved in storage, including children stored
//!   before their parents.
//!
//! - **Bottom-up order** lists every `(parent, slot, child)` [`Edge`] in
//!   depth-first post-order: an edge is emitted only after all of the child's
//!   own edges. Attaching children to parents in this order means a child's
//!   subtree is complete before the child moves into its parent's slot.
//!
//! ```text
//!   storage:  C(B.items)  A  B(A.content)
//!
//!   canonical:  0 A  <  0:content:0 B  <  0:content:0:items:0 C
//!   bottom-up:  (B, items, C)  then  (A, content, B)
//! ```
//!
//! Slots of one parent are visited in slot-name order.
//!
//! ## Failure modes
//!
//! A cycle aborts resolution with [`TopologyError::CycleDetected`]. Everything
//! else is local: an instance with a dangling parent or a mismatched
//! parent/slot pair is reported as a [`StructuralViolation`] and left out of
//! both orderings together with its descendants, so the rest of the tree still
//! resolves.

use std::collections::{BTreeMap, HashMap, HashSet};

use core::fmt;

use serde::{Serialize, Serializer};
use thiserror::Error;
use tracing::{debug, warn};

use crate::error::TopologyError;
use crate::id::InstanceId;
use crate::instance::{ComponentInstance, Placement};
use crate::tree::ComponentTree;

/// Sortable position of an instance in canonical order.
///
/// Keys compare root position first, then `(slot, delta)` pairs from the root
/// down; a parent's key is a prefix of its children's keys and sorts first.
/// Deltas compare numerically, so the tenth sibling sorts after the second.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CanonicalKey {
    root: usize,
    path: Vec<(String, usize)>,
}

impl CanonicalKey {
    /// Key of the root instance at `position` among roots.
    #[must_use]
    pub const fn root(position: usize) -> Self {
        Self {
            root: position,
            path: Vec::new(),
        }
    }

    /// Key of the `delta`-th child in `slot` of the instance with this key.
    #[must_use]
    pub fn child(&self, slot: &str, delta: usize) -> Self {
        let mut path = self.path.clone();
        path.push((slot.to_owned(), delta));
        Self {
            root: self.root,
            path,
        }
    }

    /// Number of slots between the instance and the synthetic root.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.path.len()
    }

    /// Position of the instance's root-level ancestor among roots.
    #[must_use]
    pub const fn root_position(&self) -> usize {
        self.root
    }

    /// The slot and position of the instance within its parent.
    #[must_use]
    pub fn slot_position(&self) -> Option<(&str, usize)> {
        self.path.last().map(|(slot, delta)| (slot.as_str(), *delta))
    }
}

impl fmt::Display for CanonicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.root)?;
        for (slot, delta) in &self.path {
            write!(f, ":{slot}:{delta}")?;
        }
        Ok(())
    }
}

impl Serialize for CanonicalKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A parent/slot/child relation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Edge {
    /// The parent instance.
    pub parent: InstanceId,
    /// The parent's slot.
    pub slot: String,
    /// The child instance.
    pub child: InstanceId,
}

/// A structural problem localized to one instance.
///
/// The instance (and anything below it) is excluded from both orderings.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StructuralViolation {
    /// `parent_uuid` names an instance that is not in the tree.
    #[error("instance {uuid} has parent {parent}, which is not in the tree")]
    DanglingParent {
        /// The instance.
        uuid: InstanceId,
        /// The missing parent.
        parent: InstanceId,
    },
    /// A slot is set without a parent.
    #[error("instance {uuid} names slot `{slot}` but has no parent")]
    SlotWithoutParent {
        /// The instance.
        uuid: InstanceId,
        /// The slot it names.
        slot: String,
    },
    /// A parent is set without a slot.
    #[error("instance {uuid} has parent {parent} but no slot")]
    ParentWithoutSlot {
        /// The instance.
        uuid: InstanceId,
        /// The parent it names.
        parent: InstanceId,
    },
    /// The instance is fine but an ancestor was excluded.
    #[error("instance {uuid} is unreachable because its ancestor {ancestor} was excluded")]
    Orphaned {
        /// The instance.
        uuid: InstanceId,
        /// The excluded ancestor.
        ancestor: InstanceId,
    },
}

impl StructuralViolation {
    /// The instance the violation is reported against.
    #[must_use]
    pub const fn uuid(&self) -> &InstanceId {
        match self {
            Self::DanglingParent { uuid, .. }
            | Self::SlotWithoutParent { uuid, .. }
            | Self::ParentWithoutSlot { uuid, .. }
            | Self::Orphaned { uuid, .. } => uuid,
        }
    }
}

/// Canonical and bottom-up orderings of one tree snapshot.
///
/// A pure function of the tree's contents: resolve again after mutating.
#[derive(Debug, Clone)]
pub struct Topology {
    canonical: Vec<(CanonicalKey, InstanceId)>,
    positions: HashMap<InstanceId, usize>,
    bottom_up: Vec<Edge>,
    roots: Vec<InstanceId>,
    violations: Vec<StructuralViolation>,
}

type SlotChildren<'a> = HashMap<usize, BTreeMap<&'a str, Vec<usize>>>;

impl Topology {
    /// Resolves both orderings for `tree`.
    ///
    /// # Errors
    ///
    /// Returns [`TopologyError::CycleDetected`] if any instance is its own
    /// ancestor.
    pub fn resolve(tree: &ComponentTree) -> Result<Self, TopologyError> {
        let instances = tree.instances();
        let lookup: HashMap<&InstanceId, usize> = instances
            .iter()
            .enumerate()
            .map(|(i, instance)| (instance.uuid(), i))
            .collect();

        let mut roots = Vec::new();
        let mut children: SlotChildren<'_> = HashMap::new();
        let mut excluded = vec![false; instances.len()];
        let mut violations = Vec::new();

        for (i, instance) in instances.iter().enumerate() {
            let violation = match instance.placement() {
                Placement::Root => {
                    roots.push(i);
                    continue;
                }
                Placement::Child { parent, slot } => {
                    if let Some(&p) = lookup.get(parent) {
                        children
                            .entry(p)
                            .or_default()
                            .entry(slot)
                            .or_default()
                            .push(i);
                        continue;
                    }
                    StructuralViolation::DanglingParent {
                        uuid: instance.uuid().clone(),
                        parent: parent.clone(),
                    }
                }
                Placement::SlotWithoutParent(slot) => StructuralViolation::SlotWithoutParent {
                    uuid: instance.uuid().clone(),
                    slot: slot.to_owned(),
                },
                Placement::ParentWithoutSlot(parent) => StructuralViolation::ParentWithoutSlot {
                    uuid: instance.uuid().clone(),
                    parent: parent.clone(),
                },
            };
            excluded[i] = true;
            violations.push(violation);
        }

        let mut keys: Vec<Option<CanonicalKey>> = vec![None; instances.len()];
        let mut bottom_up = Vec::new();
        for (position, &root) in roots.iter().enumerate() {
            let key = CanonicalKey::root(position);
            keys[root] = Some(key.clone());
            descend(root, &key, &children, instances, &mut keys, &mut bottom_up);
        }

        // Whatever was not reached hangs below an excluded instance or sits on
        // a cycle; walk up the parent chain to tell which.
        for (i, instance) in instances.iter().enumerate() {
            if keys[i].is_some() || excluded[i] {
                continue;
            }
            let mut chain: Vec<usize> = Vec::new();
            let mut seen = HashSet::new();
            let mut current = i;
            loop {
                if !seen.insert(current) {
                    let start = chain.iter().position(|&c| c == current).unwrap_or(0);
                    let cycle: Vec<InstanceId> = chain[start..]
                        .iter()
                        .map(|&c| instances[c].uuid().clone())
                        .collect();
                    warn!(?cycle, "component tree contains a cycle");
                    return Err(TopologyError::CycleDetected { cycle });
                }
                chain.push(current);
                if excluded[current] {
                    violations.push(StructuralViolation::Orphaned {
                        uuid: instance.uuid().clone(),
                        ancestor: instances[current].uuid().clone(),
                    });
                    break;
                }
                match instances[current]
                    .parent_uuid()
                    .and_then(|parent| lookup.get(parent))
                {
                    Some(&parent) => current = parent,
                    None => break,
                }
            }
        }

        for violation in &violations {
            warn!(%violation, "excluding component instance from topology");
        }

        let mut canonical: Vec<(CanonicalKey, InstanceId)> = keys
            .into_iter()
            .zip(instances)
            .filter_map(|(key, instance)| key.map(|key| (key, instance.uuid().clone())))
            .collect();
        canonical.sort_by(|a, b| a.0.cmp(&b.0));

        let positions = canonical
            .iter()
            .enumerate()
            .map(|(i, (_, uuid))| (uuid.clone(), i))
            .collect();

        debug!(
            instances = instances.len(),
            reachable = canonical.len(),
            edges = bottom_up.len(),
            violations = violations.len(),
            "resolved component tree topology"
        );

        Ok(Self {
            canonical,
            positions,
            bottom_up,
            roots: roots
                .into_iter()
                .map(|i| instances[i].uuid().clone())
                .collect(),
            violations,
        })
    }

    /// Reachable instances in canonical order.
    pub fn canonical_order(&self) -> impl Iterator<Item = &InstanceId> {
        self.canonical.iter().map(|(_, uuid)| uuid)
    }

    /// Reachable instances with their keys, in canonical order.
    #[must_use]
    pub fn canonical(&self) -> &[(CanonicalKey, InstanceId)] {
        &self.canonical
    }

    /// The canonical key of a reachable instance.
    #[must_use]
    pub fn key_of(&self, uuid: &InstanceId) -> Option<&CanonicalKey> {
        self.positions.get(uuid).map(|&i| &self.canonical[i].0)
    }

    /// Returns true if the instance is reachable from the synthetic root.
    #[must_use]
    pub fn contains(&self, uuid: &InstanceId) -> bool {
        self.positions.contains_key(uuid)
    }

    /// Edges in bottom-up resolution order.
    #[must_use]
    pub fn bottom_up(&self) -> &[Edge] {
        &self.bottom_up
    }

    /// Root-level instances in storage order.
    #[must_use]
    pub fn roots(&self) -> &[InstanceId] {
        &self.roots
    }

    /// Instances excluded from both orderings, and why.
    #[must_use]
    pub fn violations(&self) -> &[StructuralViolation] {
        &self.violations
    }

    /// Number of reachable instances.
    #[must_use]
    pub fn len(&self) -> usize {
        self.canonical.len()
    }

    /// Returns true if no instance is reachable.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.canonical.is_empty()
    }
}

/// Assigns keys below `node` and emits its edges in post-order.
fn descend(
    node: usize,
    key: &CanonicalKey,
    children: &SlotChildren<'_>,
    instances: &[ComponentInstance],
    keys: &mut [Option<CanonicalKey>],
    edges: &mut Vec<Edge>,
) {
    let Some(slots) = children.get(&node) else {
        return;
    };
    for (slot, kids) in slots {
        for (delta, &kid) in kids.iter().enumerate() {
            let child_key = key.child(slot, delta);
            keys[kid] = Some(child_key.clone());
            descend(kid, &child_key, children, instances, keys, edges);
            edges.push(Edge {
                parent: instances[node].uuid().clone(),
                slot: (*slot).to_owned(),
                child: instances[kid].uuid().clone(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(uuid: &str) -> ComponentInstance {
        ComponentInstance::new(uuid, "sdc.test.card", "v1")
    }

    fn tree(instances: impl IntoIterator<Item = ComponentInstance>) -> ComponentTree {
        ComponentTree::from_instances(instances).unwrap()
    }

    fn order(topology: &Topology) -> Vec<&str> {
        topology.canonical_order().map(InstanceId::as_str).collect()
    }

    fn edges(topology: &Topology) -> Vec<(&str, &str, &str)> {
        topology
            .bottom_up()
            .iter()
            .map(|e| (e.parent.as_str(), e.slot.as_str(), e.child.as_str()))
            .collect()
    }

    #[test]
    fn children_stored_before_parents() {
        let topology = tree([
            card("c").in_slot("b", "items"),
            card("a"),
            card("b").in_slot("a", "content"),
        ])
        .topology()
        .unwrap();

        assert_eq!(order(&topology), ["a", "b", "c"]);
        assert_eq!(
            edges(&topology),
            [("b", "items", "c"), ("a", "content", "b")]
        );
        assert_eq!(
            topology.key_of(&"c".into()).unwrap().to_string(),
            "0:content:0:items:0"
        );
    }

    #[test]
    fn keys_compare_deltas_numerically() {
        let mut instances = vec![card("root")];
        for i in 0..12 {
            instances.push(card(&format!("child-{i}")).in_slot("root", "items"));
        }
        let topology = tree(instances).topology().unwrap();
        let expected: Vec<String> = core::iter::once("root".to_owned())
            .chain((0..12).map(|i| format!("child-{i}")))
            .collect();
        assert_eq!(order(&topology), expected);
    }

    #[test]
    fn post_order_finishes_each_subtree_first() {
        let topology = tree([
            card("a"),
            card("b").in_slot("a", "content"),
            card("c").in_slot("b", "items"),
            card("d").in_slot("c", "items"),
            card("e").in_slot("a", "content"),
            card("f").in_slot("a", "aside"),
        ])
        .topology()
        .unwrap();

        assert_eq!(order(&topology), ["a", "f", "b", "c", "d", "e"]);
        assert_eq!(
            edges(&topology),
            [
                ("a", "aside", "f"),
                ("c", "items", "d"),
                ("b", "items", "c"),
                ("a", "content", "b"),
                ("a", "content", "e"),
            ]
        );
    }

    #[test]
    fn multiple_roots_keep_storage_order() {
        let topology = tree([card("z"), card("y").in_slot("x", "s"), card("x")])
            .topology()
            .unwrap();
        assert_eq!(topology.roots(), [InstanceId::from("z"), InstanceId::from("x")]);
        assert_eq!(order(&topology), ["z", "x", "y"]);
        assert_eq!(topology.key_of(&"y".into()).unwrap().to_string(), "1:s:0");
    }

    #[test]
    fn dangling_parent_is_localized() {
        let topology = tree([
            card("a"),
            card("b").in_slot("ghost", "content"),
            card("c").in_slot("b", "items"),
            card("d").in_slot("a", "content"),
        ])
        .topology()
        .unwrap();

        assert_eq!(order(&topology), ["a", "d"]);
        assert_eq!(
            topology.violations(),
            [
                StructuralViolation::DanglingParent {
                    uuid: "b".into(),
                    parent: "ghost".into()
                },
                StructuralViolation::Orphaned {
                    uuid: "c".into(),
                    ancestor: "b".into()
                },
            ]
        );
    }

    #[test]
    fn slot_parent_mismatch_is_localized() {
        let records = serde_json::json!([
            {"uuid": "a", "component_id": "x", "component_version": "1"},
            {"uuid": "b", "component_id": "x", "component_version": "1", "slot": "content"},
            {"uuid": "c", "component_id": "x", "component_version": "1", "parent_uuid": "a"}
        ]);
        let tree: ComponentTree = serde_json::from_value(records).unwrap();
        let topology = tree.topology().unwrap();
        assert_eq!(order(&topology), ["a"]);
        assert_eq!(topology.violations().len(), 2);
        assert!(matches!(
            topology.violations()[0],
            StructuralViolation::SlotWithoutParent { .. }
        ));
        assert!(matches!(
            topology.violations()[1],
            StructuralViolation::ParentWithoutSlot { .. }
        ));
    }

    #[test]
    fn self_parent_is_a_cycle() {
        let error = tree([card("a"), card("b").in_slot("b", "content")])
            .topology()
            .unwrap_err();
        assert_eq!(
            error,
            TopologyError::CycleDetected {
                cycle: vec!["b".into()]
            }
        );
    }

    #[test]
    fn transitive_cycle_is_rejected() {
        let error = tree([
            card("root"),
            card("a").in_slot("c", "s"),
            card("b").in_slot("a", "s"),
            card("c").in_slot("b", "s"),
        ])
        .topology()
        .unwrap_err();
        assert_eq!(
            error,
            TopologyError::CycleDetected {
                cycle: vec!["a".into(), "c".into(), "b".into()]
            }
        );
    }
}
