//! # Trellis Core
//!
//! The component tree engine of a visual page builder.
//!
//! Pages are trees of reusable components placed in each other's named slots.
//! The tree is stored flat, as a [`ComponentTree`] of [`ComponentInstance`]
//! records in no particular order, and rebuilt on every read:
//!
//! ```text
//!  ComponentTree ──► Topology ──► Hydrator ──► HydratedTree
//!   (flat list)     canonical     prop sources   { ROOT_UUID: { a: { slots: … } } }
//!                   bottom-up     evaluated
//! ```
//!
//! - [`topology`] derives a canonical depth-first order and a bottom-up edge
//!   order from the flat list. Neither is stored.
//! - [`prop_source`] evaluates each prop through one of five strategies: a
//!   static value, a host field, an adapter over other sources, or one of two
//!   URL rewrites.
//! - [`hydrate`] resolves every instance independently and nests children
//!   bottom-up, degrading broken instances to error placeholders.
//! - [`validate`] checks a tree before it is persisted; [`nested`] lets callers
//!   who author nested structures map validation errors back to their input.
//!
//! ```
//! use serde_json::json;
//! use trellis_core::{
//!     ComponentDefinition, ComponentInstance, ComponentSchema, ComponentTree, DefinitionSet,
//!     Hydrator, PropDefinition, Provider, ROOT_UUID,
//! };
//!
//! let definitions: DefinitionSet = [ComponentDefinition::new(
//!     "sdc.test.section",
//!     Provider::Theme("olivero".into()),
//!     "v1",
//!     ComponentSchema::new()
//!         .with_prop("title", PropDefinition::new())
//!         .with_slot("content"),
//! )]
//! .into_iter()
//! .collect();
//!
//! // children may be stored before their parents
//! let tree = ComponentTree::from_instances([
//!     ComponentInstance::new("b", "sdc.test.section", "v1").in_slot("a", "content"),
//!     ComponentInstance::new("a", "sdc.test.section", "v1").with_input(
//!         "title",
//!         json!({"sourceType": "static:field_item:string", "value": "Hello"}),
//!     ),
//! ])?;
//!
//! let hydration = Hydrator::new(&definitions).hydrate(&tree)?;
//! let output = serde_json::to_value(&hydration.tree).unwrap();
//! assert_eq!(output[ROOT_UUID]["a"]["props"]["title"], "Hello");
//! assert!(output[ROOT_UUID]["a"]["slots"]["content"]["b"].is_object());
//! # Ok::<(), trellis_core::Error>(())
//! ```

pub mod definition;
pub mod dependencies;
pub mod error;
pub mod host;
pub mod hydrate;
pub mod id;
pub mod inputs;
pub mod instance;
pub mod nested;
pub mod prop_source;
pub mod topology;
pub mod tree;
pub mod validate;

#[cfg(test)]
mod tests;

#[doc(inline)]
pub use definition::{
    ComponentDefinition, ComponentSchema, DefinitionLoader, DefinitionSet, PropDefinition,
    Provider,
};
pub use dependencies::Dependencies;
#[doc(inline)]
pub use error::{
    ContractViolation, Error, HydrationFailure, PropSourceError, TopologyError, TreeError,
};
pub use host::{HostEntity, JsonEntity};
#[doc(inline)]
pub use hydrate::{HydratedComponent, HydratedTree, Hydration, Hydrator, Slot};
pub use id::{ComponentId, InstanceId, ROOT_UUID};
pub use instance::ComponentInstance;
pub use nested::{FlattenedTree, NestedComponent, NestedPath, flatten_nested};
pub use prop_source::{EvaluationContext, PropSource, PropSourceKind};
pub use topology::{CanonicalKey, Edge, StructuralViolation, Topology};
pub use tree::ComponentTree;
pub use validate::{ValidatedTree, ValidationError, ValidationErrors, Validator, validate};
