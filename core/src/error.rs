//! Error types.
//!
//! Failures are split by how far they reach:
//!
//! - [`TreeError`] rejects a single store mutation.
//! - [`TopologyError`] is fatal for a whole resolution pass (a cycle).
//! - [`StructuralViolation`](crate::topology::StructuralViolation) and
//!   [`HydrationFailure`] are localized to one instance and collected into
//!   results rather than returned as `Err`.
//! - [`PropSourceError`] is raised by a single prop source evaluation.
//! - [`ContractViolation`] means the engine broke its own invariant; it always
//!   aborts and is never shown to authors.

use thiserror::Error;

use crate::id::{ComponentId, InstanceId};
use crate::prop_source::PropSourceKind;
use crate::topology::StructuralViolation;

/// A rejected component tree mutation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    /// An instance with this uuid already exists in the tree.
    #[error("component instance {0} already exists in the tree")]
    DuplicateUuid(InstanceId),
    /// No instance with this uuid exists in the tree.
    #[error("component instance {0} does not exist in the tree")]
    UnknownInstance(InstanceId),
    /// Moving the instance under the parent would make it its own ancestor.
    #[error("moving {uuid} under {parent} would create a cycle")]
    WouldCycle {
        /// The instance being moved.
        uuid: InstanceId,
        /// The requested parent.
        parent: InstanceId,
    },
}

/// A fatal topology resolution failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TopologyError {
    /// Following `parent_uuid` from an instance leads back to it.
    #[error("cycle detected in component tree: {}", format_cycle(.cycle))]
    CycleDetected {
        /// The instances on the cycle, each followed by its parent.
        cycle: Vec<InstanceId>,
    },
}

fn format_cycle(cycle: &[InstanceId]) -> String {
    let mut out: Vec<&str> = cycle.iter().map(InstanceId::as_str).collect();
    if let Some(first) = cycle.first() {
        out.push(first.as_str());
    }
    out.join(" -> ")
}

/// Failure raised by an adapter transform.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct AdapterError {
    message: String,
}

impl AdapterError {
    /// Creates an adapter error with a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Failure to parse or evaluate a prop source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PropSourceError {
    /// A context-dependent source was evaluated without a host content item.
    #[error("a host content item is required to evaluate this prop source")]
    MissingHostContext,
    /// The stored input is not a JSON object.
    #[error("prop source record must be an object")]
    NotARecord,
    /// The record has no string `sourceType`.
    #[error("prop source record has no sourceType")]
    MissingSourceType,
    /// The `sourceType` matches no known variant.
    #[error("unknown prop source type `{0}`")]
    UnknownSourceType(String),
    /// The record has the right tag but the wrong shape.
    #[error("malformed `{source_type}` prop source: {message}")]
    Malformed {
        /// The record's source type.
        source_type: String,
        /// What was wrong.
        message: String,
    },
    /// A dynamic expression could not be parsed.
    #[error("invalid expression `{expression}`: {reason}")]
    InvalidExpression {
        /// The expression as stored.
        expression: String,
        /// Why it was rejected.
        reason: &'static str,
    },
    /// The host content item is not the kind the expression reads from.
    #[error("expression targets {expected} but the host is {actual}")]
    HostMismatch {
        /// `entity_type:bundle` named by the expression.
        expected: String,
        /// `entity_type:bundle` of the host.
        actual: String,
    },
    /// A required prop evaluated to nothing.
    #[error("required value is missing")]
    RequiredValueMissing,
    /// A static value does not match its declared cardinality.
    #[error("value has {actual} items but cardinality allows {expected}")]
    CardinalityMismatch {
        /// Human-readable allowed cardinality.
        expected: String,
        /// Number of items found.
        actual: usize,
    },
    /// A static value is a list where a single value is declared, or the
    /// other way round.
    #[error("expected {expected} but found {found}")]
    ShapeMismatch {
        /// Human-readable allowed cardinality.
        expected: String,
        /// `a list` or `a single value`.
        found: &'static str,
    },
    /// The adapter is not registered.
    #[error("unknown adapter `{0}`")]
    UnknownAdapter(String),
    /// An adapter input the adapter needs is absent.
    #[error("adapter `{adapter}` is missing input `{input}`")]
    MissingAdapterInput {
        /// The adapter.
        adapter: String,
        /// The missing input name.
        input: String,
    },
    /// The adapter transform failed.
    #[error("adapter `{adapter}` failed: {source}")]
    Adapter {
        /// The adapter.
        adapter: String,
        /// The adapter's error.
        source: AdapterError,
    },
    /// A URL value could not be parsed or resolved.
    #[error("invalid URL `{value}`: {source}")]
    InvalidUrl {
        /// The offending value.
        value: String,
        /// The parse failure.
        source: trellis_url::ParseError,
    },
    /// A relative URL needs a site base URL but none was configured.
    #[error("cannot make `{value}` absolute without a base URL")]
    MissingBaseUrl {
        /// The relative value.
        value: String,
    },
}

/// Why one instance could not be hydrated.
///
/// The instance is still emitted as an error placeholder; the rest of the tree
/// is unaffected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HydrationFailure {
    /// The component definition could not be loaded.
    #[error("component `{0}` does not exist")]
    MissingComponentDefinition(ComponentId),
    /// The definition exists but not in the pinned version.
    #[error("component `{component}` has no version `{version}`")]
    UnknownComponentVersion {
        /// The component.
        component: ComponentId,
        /// The pinned version.
        version: String,
    },
    /// A required prop has neither an input nor a default.
    #[error("required prop `{prop}` has no input")]
    MissingRequiredInput {
        /// The prop.
        prop: String,
    },
    /// A required prop's stored input is not a valid prop source.
    #[error("input for prop `{prop}` is invalid: {source}")]
    InvalidInput {
        /// The prop.
        prop: String,
        /// The parse failure.
        source: PropSourceError,
    },
    /// A required prop's source failed to evaluate.
    #[error("prop `{prop}` failed to evaluate: {source}")]
    Evaluation {
        /// The prop.
        prop: String,
        /// Which kind of source failed.
        kind: PropSourceKind,
        /// The evaluation failure.
        source: PropSourceError,
    },
}

impl HydrationFailure {
    /// Returns true if a tree that passed validation can never fail this way.
    ///
    /// Validation checks definitions, versions, input shape and static
    /// values. Sources that read the host, the base URL or an adapter are
    /// only known at hydration time.
    #[must_use]
    pub const fn is_ruled_out_by_validation(&self) -> bool {
        match self {
            Self::Evaluation { kind, .. } => matches!(kind, PropSourceKind::Static),
            _ => true,
        }
    }
}

/// The engine broke one of its own invariants.
///
/// Never caused by authored content; indicates a bug.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContractViolation {
    /// A bottom-up edge names an instance that was never resolved or was
    /// already attached elsewhere.
    #[error("instance {0} was not available when its edge was processed")]
    MissingResolved(InstanceId),
    /// Instances were left over that are neither roots nor attached.
    #[error("instances left unattached after hydration: {0:?}")]
    Unattached(Vec<InstanceId>),
    /// A structural violation surfaced although validation reported the tree
    /// valid.
    #[error("structural violation after validation succeeded: {0}")]
    Structural(StructuralViolation),
    /// An instance failed although validation reported the tree valid.
    #[error("instance {uuid} failed after validation succeeded: {failure}")]
    FailedAfterValidation {
        /// The instance.
        uuid: InstanceId,
        /// What failed.
        failure: HydrationFailure,
    },
}

/// Fatal errors of the engine's entry points.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// A rejected store mutation.
    #[error(transparent)]
    Tree(#[from] TreeError),
    /// A cycle in the tree.
    #[error(transparent)]
    Topology(#[from] TopologyError),
    /// An instance of a validated tree could not be hydrated with the
    /// context it was given.
    #[error("instance {uuid} could not be hydrated: {failure}")]
    Hydration {
        /// The instance.
        uuid: InstanceId,
        /// What failed.
        failure: HydrationFailure,
    },
    /// An internal invariant was broken.
    #[error("contract violation: {0}")]
    Contract(#[from] ContractViolation),
}
