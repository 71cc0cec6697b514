//! # Hydration
//!
//! Turns a flat [`ComponentTree`] into one nested [`HydratedTree`] keyed by
//! [`ROOT_UUID`].
//!
//! 1. Every referenced definition is loaded in one batch.
//! 2. Each reachable instance is resolved on its own: its inputs are bound to
//!    the schema of its pinned version and every prop source is evaluated.
//!    Declared slots start out as [`Slot::Default`].
//! 3. Edges are processed in bottom-up order. The child, whose own subtree is
//!    complete by then, moves out of the working set into its parent's slot.
//! 4. What is left are the root-level instances; they go under the synthetic
//!    root.
//!
//! A broken instance does not break the page: a missing definition, an
//! unknown version or a failing required prop turns that one instance into an
//! error placeholder (see [`HydratedComponent::error`]) while its children are
//! still attached. An optional prop that fails to evaluate is left out.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use indexmap::IndexMap;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::Value;
use tracing::{debug, debug_span, warn};
use trellis_url::Url;

use crate::definition::{ComponentDefinition, ComponentSchema, DefinitionLoader, Provider};
use crate::dependencies::Dependencies;
use crate::error::{ContractViolation, Error, HydrationFailure, PropSourceError};
use crate::host::HostEntity;
use crate::id::{ComponentId, InstanceId, ROOT_UUID};
use crate::inputs::{InputIssue, bind_inputs};
use crate::instance::ComponentInstance;
use crate::prop_source::{AdapterRegistry, EvaluationContext, PropSource};
use crate::topology::StructuralViolation;
use crate::tree::ComponentTree;
use crate::validate::ValidatedTree;

/// The children of one slot.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Slot {
    /// Nothing has been placed; the renderer shows the slot's default content.
    #[default]
    Default,
    /// Child components keyed by uuid, in canonical order. Never empty.
    Filled(IndexMap<InstanceId, HydratedComponent>),
}

impl Slot {
    /// Returns true if nothing has been placed.
    #[must_use]
    pub const fn is_default(&self) -> bool {
        matches!(self, Self::Default)
    }

    /// Number of children.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Default => 0,
            Self::Filled(children) => children.len(),
        }
    }

    /// Returns true if the slot has no children.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Children in order.
    pub fn children(&self) -> impl Iterator<Item = (&InstanceId, &HydratedComponent)> {
        let children = match self {
            Self::Default => None,
            Self::Filled(children) => Some(children),
        };
        children.into_iter().flatten()
    }
}

impl Serialize for Slot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Default => serializer.serialize_map(Some(0))?.end(),
            Self::Filled(children) => children.serialize(serializer),
        }
    }
}

/// One resolved component instance with its children nested in its slots.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HydratedComponent {
    component: ComponentId,
    version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    label: Option<String>,
    props: IndexMap<String, Value>,
    slots: BTreeMap<String, Slot>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_failure"
    )]
    error: Option<HydrationFailure>,
}

fn serialize_failure<S: Serializer>(
    failure: &Option<HydrationFailure>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match failure {
        Some(failure) => serializer.collect_str(failure),
        None => serializer.serialize_none(),
    }
}

impl HydratedComponent {
    fn placeholder(instance: &ComponentInstance) -> Self {
        Self {
            component: instance.component_id().clone(),
            version: instance.component_version().to_owned(),
            label: instance.label().map(ToOwned::to_owned),
            props: IndexMap::new(),
            slots: BTreeMap::new(),
            error: None,
        }
    }

    /// The component definition.
    #[must_use]
    pub const fn component(&self) -> &ComponentId {
        &self.component
    }

    /// The pinned version.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// The author-facing label.
    #[must_use]
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Evaluated props in schema order.
    #[must_use]
    pub const fn props(&self) -> &IndexMap<String, Value> {
        &self.props
    }

    /// Slots by name.
    #[must_use]
    pub const fn slots(&self) -> &BTreeMap<String, Slot> {
        &self.slots
    }

    /// One slot.
    #[must_use]
    pub fn slot(&self, name: &str) -> Option<&Slot> {
        self.slots.get(name)
    }

    /// Why the instance is rendered as an error placeholder.
    #[must_use]
    pub const fn error(&self) -> Option<&HydrationFailure> {
        self.error.as_ref()
    }

    /// Returns true if the instance failed.
    #[must_use]
    pub const fn is_failed(&self) -> bool {
        self.error.is_some()
    }

    fn attach(&mut self, slot: &str, uuid: InstanceId, child: Self) {
        let entry = self.slots.entry(slot.to_owned()).or_default();
        match entry {
            Slot::Filled(children) => {
                children.insert(uuid, child);
            }
            Slot::Default => *entry = Slot::Filled(IndexMap::from([(uuid, child)])),
        }
    }

    fn find(&self, uuid: &InstanceId) -> Option<&Self> {
        self.slots
            .values()
            .flat_map(Slot::children)
            .find_map(|(id, child)| if id == uuid { Some(child) } else { child.find(uuid) })
    }

    fn walk<'a>(
        &'a self,
        uuid: &'a InstanceId,
        parent: Option<(&'a InstanceId, &'a str)>,
        out: &mut Vec<FlatEntry<'a>>,
    ) {
        out.push(FlatEntry {
            uuid,
            parent_uuid: parent.map(|(p, _)| p),
            slot: parent.map(|(_, s)| s),
        });
        for (slot, children) in &self.slots {
            for (child_uuid, child) in children.children() {
                child.walk(child_uuid, Some((uuid, slot.as_str())), out);
            }
        }
    }
}

/// One instance of a re-flattened [`HydratedTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FlatEntry<'a> {
    /// The instance.
    pub uuid: &'a InstanceId,
    /// Its parent, `None` at root level.
    pub parent_uuid: Option<&'a InstanceId>,
    /// The parent's slot, `None` at root level.
    pub slot: Option<&'a str>,
}

/// The nested result of a hydration pass.
///
/// Serializes as `{ ROOT_UUID: { uuid: component, ... } }`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HydratedTree {
    roots: IndexMap<InstanceId, HydratedComponent>,
}

impl HydratedTree {
    /// Root-level components in order.
    #[must_use]
    pub const fn roots(&self) -> &IndexMap<InstanceId, HydratedComponent> {
        &self.roots
    }

    /// Finds a component anywhere in the tree.
    #[must_use]
    pub fn get(&self, uuid: &InstanceId) -> Option<&HydratedComponent> {
        self.roots.get(uuid).or_else(|| {
            self.roots.values().find_map(|root| root.find(uuid))
        })
    }

    /// Re-flattens the tree depth-first, visiting slots by name and children
    /// in slot order.
    #[must_use]
    pub fn flatten(&self) -> Vec<FlatEntry<'_>> {
        let mut out = Vec::new();
        for (uuid, root) in &self.roots {
            root.walk(uuid, None, &mut out);
        }
        out
    }

    /// Every uuid in canonical order.
    #[must_use]
    pub fn uuids(&self) -> Vec<&InstanceId> {
        self.flatten().into_iter().map(|entry| entry.uuid).collect()
    }

    /// Total number of components.
    #[must_use]
    pub fn len(&self) -> usize {
        self.flatten().len()
    }

    /// Returns true if there are no components.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }
}

impl Serialize for HydratedTree {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(ROOT_UUID, &self.roots)?;
        map.end()
    }
}

/// A per-instance failure collected during hydration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceFailure {
    /// The instance.
    pub uuid: InstanceId,
    /// What went wrong.
    pub failure: HydrationFailure,
}

/// The outcome of [`Hydrator::hydrate`].
#[derive(Debug, Clone, PartialEq)]
pub struct Hydration {
    /// The nested tree, including failed instances as placeholders.
    pub tree: HydratedTree,
    /// Instances rendered as error placeholders.
    pub failures: Vec<InstanceFailure>,
    /// Instances left out for structural reasons.
    pub violations: Vec<StructuralViolation>,
}

/// Assembles hydrated trees.
///
/// ```
/// use trellis_core::{ComponentInstance, ComponentTree, DefinitionSet, Hydrator};
///
/// let tree = ComponentTree::from_instances([ComponentInstance::new("a", "sdc.test.card", "v1")])?;
/// let definitions = DefinitionSet::new();
/// let hydration = Hydrator::new(&definitions).hydrate(&tree)?;
/// // the definition is missing, so `a` is a placeholder
/// assert_eq!(hydration.failures.len(), 1);
/// assert!(hydration.tree.get(&"a".into()).is_some());
/// # Ok::<(), trellis_core::Error>(())
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Hydrator<'a> {
    loader: &'a dyn DefinitionLoader,
    host: Option<&'a dyn HostEntity>,
    base_url: Option<&'a Url>,
    adapters: &'a AdapterRegistry,
}

impl<'a> Hydrator<'a> {
    /// Creates a hydrator without host or base URL, using the built-in
    /// adapters.
    #[must_use]
    pub fn new(loader: &'a dyn DefinitionLoader) -> Self {
        Self {
            loader,
            host: None,
            base_url: None,
            adapters: AdapterRegistry::builtin(),
        }
    }

    /// Sets the host content item.
    #[must_use]
    pub const fn with_host(mut self, host: &'a dyn HostEntity) -> Self {
        self.host = Some(host);
        self
    }

    /// Sets the site base URL.
    #[must_use]
    pub const fn with_base_url(mut self, base_url: &'a Url) -> Self {
        self.base_url = Some(base_url);
        self
    }

    /// Replaces the adapter registry.
    #[must_use]
    pub const fn with_adapters(mut self, adapters: &'a AdapterRegistry) -> Self {
        self.adapters = adapters;
        self
    }

    /// Hydrates `tree`, collecting per-instance failures.
    ///
    /// # Errors
    ///
    /// - [`Error::Topology`] if the tree contains a cycle.
    /// - [`Error::Contract`] if an internal invariant breaks.
    pub fn hydrate(&self, tree: &ComponentTree) -> Result<Hydration, Error> {
        let span = debug_span!("hydrate", instances = tree.len());
        let _enter = span.enter();

        let topology = tree.topology()?;
        let definitions = self.loader.load_many(&tree.component_ids());

        let mut resolved = HashMap::with_capacity(topology.len());
        let mut failures = Vec::new();
        for uuid in topology.canonical_order() {
            let instance = tree
                .get(uuid)
                .ok_or_else(|| ContractViolation::MissingResolved(uuid.clone()))?;
            let component = self.resolve(instance, &definitions);
            if let Some(failure) = component.error() {
                warn!(%uuid, %failure, "rendering component instance as error placeholder");
                failures.push(InstanceFailure {
                    uuid: uuid.clone(),
                    failure: failure.clone(),
                });
            }
            resolved.insert(uuid.clone(), component);
        }

        for edge in topology.bottom_up() {
            let child = resolved
                .remove(&edge.child)
                .ok_or_else(|| ContractViolation::MissingResolved(edge.child.clone()))?;
            resolved
                .get_mut(&edge.parent)
                .ok_or_else(|| ContractViolation::MissingResolved(edge.parent.clone()))?
                .attach(&edge.slot, edge.child.clone(), child);
        }

        let mut roots = IndexMap::with_capacity(topology.roots().len());
        for uuid in topology.roots() {
            let component = resolved
                .remove(uuid)
                .ok_or_else(|| ContractViolation::MissingResolved(uuid.clone()))?;
            roots.insert(uuid.clone(), component);
        }
        if !resolved.is_empty() {
            let mut left: Vec<InstanceId> = resolved.into_keys().collect();
            left.sort();
            return Err(ContractViolation::Unattached(left).into());
        }

        debug!(
            roots = roots.len(),
            failures = failures.len(),
            violations = topology.violations().len(),
            "hydrated component tree"
        );
        Ok(Hydration {
            tree: HydratedTree { roots },
            failures,
            violations: topology.violations().to_vec(),
        })
    }

    /// Hydrates a tree that passed validation.
    ///
    /// A structural violation, or a failure validation already checks for,
    /// now means validation and hydration disagree. Failures of sources that
    /// need the host, the base URL or an adapter are still possible and are
    /// reported as [`Error::Hydration`].
    ///
    /// # Errors
    ///
    /// - [`Error::Contract`] if validation and hydration disagree.
    /// - [`Error::Hydration`] for the first context-dependent failure.
    /// - Everything [`Hydrator::hydrate`] returns.
    pub fn hydrate_validated(&self, validated: &ValidatedTree) -> Result<HydratedTree, Error> {
        let hydration = self.hydrate(validated.tree())?;
        if let Some(violation) = hydration.violations.into_iter().next() {
            return Err(ContractViolation::Structural(violation).into());
        }
        let (contract, contextual): (Vec<_>, Vec<_>) = hydration
            .failures
            .into_iter()
            .partition(|f| f.failure.is_ruled_out_by_validation());
        if let Some(InstanceFailure { uuid, failure }) = contract.into_iter().next() {
            return Err(ContractViolation::FailedAfterValidation { uuid, failure }.into());
        }
        if let Some(InstanceFailure { uuid, failure }) = contextual.into_iter().next() {
            return Err(Error::Hydration { uuid, failure });
        }
        Ok(hydration.tree)
    }

    /// Merged cache dependencies of every instance in `tree`.
    ///
    /// Each instance depends on its component's config and provider, plus
    /// whatever its prop sources depend on.
    #[must_use]
    pub fn dependencies(&self, tree: &ComponentTree) -> Dependencies {
        let definitions = self.loader.load_many(&tree.component_ids());
        let mut dependencies = Dependencies::new();

        for instance in tree {
            dependencies.add_config(format!("component.{}", instance.component_id()));
            let definition = definitions
                .get(instance.component_id())
                .map(|definition| &**definition);
            match definition.map(ComponentDefinition::provider) {
                Some(Provider::Module(name)) => {
                    dependencies.add_module(name.clone());
                }
                Some(Provider::Theme(name)) => {
                    dependencies.add_theme(name.clone());
                }
                None => {}
            }

            let ctx = self.context(definition);
            match definition.and_then(|d| d.schema(instance.component_version())) {
                Some(schema) => {
                    for prop in bind_inputs(instance, schema).props() {
                        dependencies.merge(prop.source.calculate_dependencies(&ctx));
                    }
                }
                None => {
                    for source in instance.inputs().values().filter_map(|v| PropSource::parse(v).ok()) {
                        dependencies.merge(source.calculate_dependencies(&ctx));
                    }
                }
            }
        }
        dependencies
    }

    fn context<'b>(&'b self, definition: Option<&'b ComponentDefinition>) -> EvaluationContext<'b> {
        let mut ctx = EvaluationContext::new().with_adapters(self.adapters);
        if let Some(host) = self.host {
            ctx = ctx.with_host(host);
        }
        if let Some(base_url) = self.base_url {
            ctx = ctx.with_base_url(base_url);
        }
        if let Some(base_path) = definition.and_then(ComponentDefinition::base_path) {
            ctx = ctx.with_component_base(base_path);
        }
        ctx
    }

    fn resolve(
        &self,
        instance: &ComponentInstance,
        definitions: &HashMap<ComponentId, Arc<ComponentDefinition>>,
    ) -> HydratedComponent {
        let mut component = HydratedComponent::placeholder(instance);

        let Some(definition) = definitions.get(instance.component_id()) else {
            component.error = Some(HydrationFailure::MissingComponentDefinition(
                instance.component_id().clone(),
            ));
            return component;
        };
        let Some(schema) = definition.schema(instance.component_version()) else {
            component.error = Some(HydrationFailure::UnknownComponentVersion {
                component: instance.component_id().clone(),
                version: instance.component_version().to_owned(),
            });
            return component;
        };

        component.slots = schema
            .slots
            .iter()
            .map(|slot| (slot.clone(), Slot::Default))
            .collect();

        let ctx = self.context(Some(definition));
        match evaluate_props(instance, schema, &ctx) {
            Ok(props) => component.props = props,
            Err(failure) => component.error = Some(failure),
        }
        component
    }
}

fn evaluate_props(
    instance: &ComponentInstance,
    schema: &ComponentSchema,
    ctx: &EvaluationContext<'_>,
) -> Result<IndexMap<String, Value>, HydrationFailure> {
    let uuid = instance.uuid();
    let bound = bind_inputs(instance, schema);

    for issue in bound.issues() {
        match issue {
            InputIssue::MissingRequired(prop) => {
                return Err(HydrationFailure::MissingRequiredInput { prop: prop.clone() });
            }
            InputIssue::Invalid {
                prop,
                required: true,
                source,
            } => {
                return Err(HydrationFailure::InvalidInput {
                    prop: prop.clone(),
                    source: source.clone(),
                });
            }
            InputIssue::Invalid { prop, source, .. } => {
                warn!(%uuid, %prop, error = %source, "dropping invalid optional input");
            }
            InputIssue::Unknown(prop) => {
                debug!(%uuid, %prop, "ignoring input the schema does not declare");
            }
        }
    }

    let mut props = IndexMap::with_capacity(bound.props().len());
    for prop in bound.props() {
        match prop.source.evaluate(ctx, prop.required) {
            Ok(value) => {
                props.insert(prop.name.clone(), value);
            }
            Err(source) if prop.required => {
                return Err(HydrationFailure::Evaluation {
                    prop: prop.name.clone(),
                    kind: prop.source.kind(),
                    source,
                });
            }
            Err(PropSourceError::MissingHostContext) => {
                debug!(%uuid, prop = %prop.name, "no host content item; leaving optional prop out");
            }
            Err(error) => {
                warn!(%uuid, prop = %prop.name, %error, "optional prop failed to evaluate");
            }
        }
    }
    Ok(props)
}
