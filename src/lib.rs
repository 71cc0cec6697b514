#![doc = include_str!("../README.md")]
#![allow(clippy::multiple_crate_versions)]

pub mod logging;

#[doc(inline)]
pub use trellis_core::*;
pub use trellis_url as url;

pub use tracing as log;

pub mod prelude {
    //! The types most callers need, for glob import.
    //!
    //! ```rust
    //! use trellis::prelude::*;
    //!
    //! let tree = ComponentTree::from_instances([
    //!     ComponentInstance::new("hero", "sdc.test.hero", "v1"),
    //! ])?;
    //! let definitions = DefinitionSet::new();
    //! let hydration = Hydrator::new(&definitions).hydrate(&tree)?;
    //! assert_eq!(hydration.tree.len(), 1);
    //! # Ok::<(), trellis::Error>(())
    //! ```
    pub use trellis_core::prop_source::{
        Adapter, AdapterRegistry, Cardinality, StaticPropSource, StaticShape,
    };
    pub use trellis_core::{
        ComponentDefinition, ComponentInstance, ComponentSchema, ComponentTree, DefinitionLoader,
        DefinitionSet, Dependencies, Error, EvaluationContext, HostEntity, HydratedComponent,
        HydratedTree, Hydration, Hydrator, InstanceId, JsonEntity, PropDefinition, PropSource,
        Provider, ROOT_UUID, Slot, Topology, ValidatedTree, validate,
    };
    pub use trellis_url::Url;
}
