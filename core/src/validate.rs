//! Tree validation.
//!
//! Validation runs before a tree is persisted. It checks everything hydration
//! would otherwise degrade gracefully on and reports all problems at once.
//! A tree that passes becomes a [`ValidatedTree`]. Hydrating that with
//! [`Hydrator::hydrate_validated`](crate::hydrate::Hydrator::hydrate_validated)
//! treats any failure as an engine bug.

use core::fmt;

use thiserror::Error;
use tracing::debug;

use crate::definition::DefinitionLoader;
use crate::error::{PropSourceError, TopologyError};
use crate::id::{ComponentId, InstanceId};
use crate::inputs::{InputIssue, bind_inputs};
use crate::prop_source::{EvaluationContext, PropSource};
use crate::topology::StructuralViolation;
use crate::tree::ComponentTree;

/// What is wrong.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationErrorKind {
    /// The instance cannot be placed in the tree.
    #[error(transparent)]
    Structural(StructuralViolation),
    /// The instance is on a cycle.
    #[error(transparent)]
    Cycle(TopologyError),
    /// The component definition does not exist.
    #[error("component `{0}` does not exist")]
    MissingComponent(ComponentId),
    /// The pinned version does not exist.
    #[error("component `{component}` has no version `{version}`")]
    UnknownVersion {
        /// The component.
        component: ComponentId,
        /// The pinned version.
        version: String,
    },
    /// The input is not a prop of the component.
    #[error("not a prop of the component")]
    UnknownProp,
    /// A required prop has no input.
    #[error("required prop has no input")]
    MissingRequired,
    /// The input is malformed or its value does not fit.
    #[error(transparent)]
    InvalidInput(PropSourceError),
    /// The instance sits in a slot its parent does not declare.
    #[error("slot `{0}` is not declared by the parent component")]
    UndeclaredSlot(String),
}

/// One problem, located by instance and, where it applies, prop.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}: {kind}", location(.uuid, .prop.as_deref()))]
pub struct ValidationError {
    /// The instance.
    pub uuid: InstanceId,
    /// The prop, for input problems.
    pub prop: Option<String>,
    /// What is wrong.
    pub kind: ValidationErrorKind,
}

fn location(uuid: &InstanceId, prop: Option<&str>) -> String {
    match prop {
        Some(prop) => format!("instance {uuid}, prop `{prop}`"),
        None => format!("instance {uuid}"),
    }
}

impl ValidationError {
    fn instance(uuid: &InstanceId, kind: ValidationErrorKind) -> Self {
        Self {
            uuid: uuid.clone(),
            prop: None,
            kind,
        }
    }

    fn prop(uuid: &InstanceId, prop: &str, kind: ValidationErrorKind) -> Self {
        Self {
            uuid: uuid.clone(),
            prop: Some(prop.to_owned()),
            kind,
        }
    }
}

/// Every problem found in one tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationErrors(Vec<ValidationError>);

impl ValidationErrors {
    /// The problems in the order they were found.
    #[must_use]
    pub fn errors(&self) -> &[ValidationError] {
        &self.0
    }

    /// Number of problems.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false for a returned error.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Problems reported against one instance.
    pub fn for_instance<'a>(&'a self, uuid: &'a InstanceId) -> impl Iterator<Item = &'a ValidationError> {
        self.0.iter().filter(move |error| &error.uuid == uuid)
    }

    /// Consumes the collection.
    #[must_use]
    pub fn into_vec(self) -> Vec<ValidationError> {
        self.0
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "component tree has {} validation error(s)", self.0.len())?;
        for error in &self.0 {
            write!(f, "\n  {error}")?;
        }
        Ok(())
    }
}

impl core::error::Error for ValidationErrors {}

impl<'a> IntoIterator for &'a ValidationErrors {
    type Item = &'a ValidationError;
    type IntoIter = core::slice::Iter<'a, ValidationError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// A tree that passed validation against some set of definitions.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedTree {
    tree: ComponentTree,
}

impl ValidatedTree {
    /// The validated tree.
    #[must_use]
    pub const fn tree(&self) -> &ComponentTree {
        &self.tree
    }

    /// Gives the tree back, e.g. for persisting.
    #[must_use]
    pub fn into_inner(self) -> ComponentTree {
        self.tree
    }
}

/// Validates trees against a definition loader.
#[derive(Debug, Clone, Copy)]
pub struct Validator<'a> {
    loader: &'a dyn DefinitionLoader,
}

impl<'a> Validator<'a> {
    /// Creates a validator.
    #[must_use]
    pub const fn new(loader: &'a dyn DefinitionLoader) -> Self {
        Self { loader }
    }

    /// Validates `tree`.
    ///
    /// # Errors
    ///
    /// Returns every problem found.
    pub fn validate(&self, tree: ComponentTree) -> Result<ValidatedTree, ValidationErrors> {
        let mut errors = Vec::new();

        match tree.topology() {
            Ok(topology) => errors.extend(
                topology
                    .violations()
                    .iter()
                    .map(|v| ValidationError::instance(v.uuid(), ValidationErrorKind::Structural(v.clone()))),
            ),
            Err(error) => {
                let TopologyError::CycleDetected { cycle } = &error;
                errors.extend(
                    cycle
                        .iter()
                        .map(|uuid| ValidationError::instance(uuid, ValidationErrorKind::Cycle(error.clone()))),
                );
            }
        }

        let definitions = self.loader.load_many(&tree.component_ids());
        let schema_of = |uuid: &InstanceId| {
            let instance = tree.get(uuid)?;
            definitions
                .get(instance.component_id())?
                .schema(instance.component_version())
        };
        // only static values evaluate without host or base URL
        let ctx = EvaluationContext::new();

        for instance in &tree {
            let uuid = instance.uuid();
            let Some(definition) = definitions.get(instance.component_id()) else {
                errors.push(ValidationError::instance(
                    uuid,
                    ValidationErrorKind::MissingComponent(instance.component_id().clone()),
                ));
                continue;
            };
            let Some(schema) = definition.schema(instance.component_version()) else {
                errors.push(ValidationError::instance(
                    uuid,
                    ValidationErrorKind::UnknownVersion {
                        component: instance.component_id().clone(),
                        version: instance.component_version().to_owned(),
                    },
                ));
                continue;
            };

            let bound = bind_inputs(instance, schema);
            for issue in bound.issues() {
                errors.push(match issue {
                    InputIssue::Unknown(prop) => {
                        ValidationError::prop(uuid, prop, ValidationErrorKind::UnknownProp)
                    }
                    InputIssue::MissingRequired(prop) => {
                        ValidationError::prop(uuid, prop, ValidationErrorKind::MissingRequired)
                    }
                    InputIssue::Invalid { prop, source, .. } => ValidationError::prop(
                        uuid,
                        prop,
                        ValidationErrorKind::InvalidInput(source.clone()),
                    ),
                });
            }
            for prop in bound.props() {
                if !matches!(prop.source, PropSource::Static(_)) {
                    continue;
                }
                if let Err(source) = prop.source.evaluate(&ctx, prop.required) {
                    errors.push(ValidationError::prop(
                        uuid,
                        &prop.name,
                        ValidationErrorKind::InvalidInput(source),
                    ));
                }
            }

            if let (Some(parent), Some(slot)) = (instance.parent_uuid(), instance.slot()) {
                if let Some(parent_schema) = schema_of(parent) {
                    if !parent_schema.has_slot(slot) {
                        errors.push(ValidationError::instance(
                            uuid,
                            ValidationErrorKind::UndeclaredSlot(slot.to_owned()),
                        ));
                    }
                }
            }
        }

        if errors.is_empty() {
            debug!(instances = tree.len(), "component tree is valid");
            Ok(ValidatedTree { tree })
        } else {
            debug!(errors = errors.len(), "component tree failed validation");
            Err(ValidationErrors(errors))
        }
    }
}

/// Validates `tree` against `loader`.
///
/// # Errors
///
/// Returns every problem found.
pub fn validate(tree: ComponentTree, loader: &dyn DefinitionLoader) -> Result<ValidatedTree, ValidationErrors> {
    Validator::new(loader).validate(tree)
}
