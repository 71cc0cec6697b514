//! Binding stored inputs to a component schema.
//!
//! For every prop the schema declares, the instance's stored input is parsed
//! into a [`PropSource`]. A missing input falls back to the prop's default.
//! Problems are collected rather than returned early so validation can report
//! all of them.

use thiserror::Error;
use tracing::trace;

use crate::definition::ComponentSchema;
use crate::error::PropSourceError;
use crate::instance::ComponentInstance;
use crate::prop_source::PropSource;

/// A prop with the source that will produce its value.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundProp {
    /// The prop name.
    pub name: String,
    /// Where the value comes from.
    pub source: PropSource,
    /// Whether the schema requires a value.
    pub required: bool,
    /// True if the source is the schema default rather than a stored input.
    pub from_default: bool,
}

/// A problem binding one input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputIssue {
    /// The instance stores an input the schema does not declare.
    #[error("input `{0}` is not a prop of the component")]
    Unknown(String),
    /// A required prop has neither an input nor a default.
    #[error("required prop `{0}` has no input")]
    MissingRequired(String),
    /// The stored input is not a valid prop source.
    #[error("input for prop `{prop}` is invalid: {source}")]
    Invalid {
        /// The prop.
        prop: String,
        /// Whether the schema requires the prop.
        required: bool,
        /// The parse failure.
        source: PropSourceError,
    },
}

/// The outcome of [`bind_inputs`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoundInputs {
    props: Vec<BoundProp>,
    issues: Vec<InputIssue>,
}

impl BoundInputs {
    /// Props that have a source, in schema order.
    #[must_use]
    pub fn props(&self) -> &[BoundProp] {
        &self.props
    }

    /// Problems found, in schema order followed by unknown inputs.
    #[must_use]
    pub fn issues(&self) -> &[InputIssue] {
        &self.issues
    }
}

/// Binds the instance's stored inputs to `schema`.
#[must_use]
pub fn bind_inputs(instance: &ComponentInstance, schema: &ComponentSchema) -> BoundInputs {
    let mut bound = BoundInputs::default();

    for (name, prop) in &schema.props {
        let source = match instance.inputs().get(name) {
            Some(stored) => PropSource::parse_input(stored, prop.shape.as_ref()).map(|s| (s, false)),
            None => match &prop.default {
                Some(default) => Ok((default.clone(), true)),
                None => {
                    if prop.required {
                        bound.issues.push(InputIssue::MissingRequired(name.clone()));
                    }
                    continue;
                }
            },
        };
        match source {
            Ok((source, from_default)) => bound.props.push(BoundProp {
                name: name.clone(),
                source,
                required: prop.required,
                from_default,
            }),
            Err(source) => bound.issues.push(InputIssue::Invalid {
                prop: name.clone(),
                required: prop.required,
                source,
            }),
        }
    }

    for name in instance.inputs().keys() {
        if !schema.props.contains_key(name) {
            bound.issues.push(InputIssue::Unknown(name.clone()));
        }
    }

    trace!(
        uuid = %instance.uuid(),
        props = bound.props.len(),
        issues = bound.issues.len(),
        "bound component inputs"
    );
    bound
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::PropDefinition;
    use crate::prop_source::{Cardinality, PropSourceKind, StaticPropSource, StaticShape};
    use serde_json::json;

    fn schema() -> ComponentSchema {
        ComponentSchema::new()
            .with_prop(
                "title",
                PropDefinition::required().with_shape(StaticShape::new("string", Cardinality::SINGLE)),
            )
            .with_prop(
                "tagline",
                PropDefinition::new().with_default(StaticPropSource::new("string", json!("Hi"))),
            )
            .with_prop("author", PropDefinition::new())
    }

    #[test]
    fn binds_collapsed_tagged_and_default_inputs() {
        let instance = ComponentInstance::new("a", "sdc.test.card", "v1")
            .with_input("title", json!("Hello"))
            .with_input(
                "author",
                json!({"sourceType": "dynamic", "expression": "entity:node:article/uid"}),
            );
        let bound = bind_inputs(&instance, &schema());

        assert!(bound.issues().is_empty());
        let kinds: Vec<(&str, PropSourceKind, bool)> = bound
            .props()
            .iter()
            .map(|p| (p.name.as_str(), p.source.kind(), p.from_default))
            .collect();
        assert_eq!(
            kinds,
            [
                ("title", PropSourceKind::Static, false),
                ("tagline", PropSourceKind::Static, true),
                ("author", PropSourceKind::Dynamic, false),
            ]
        );
    }

    #[test]
    fn collects_every_issue() {
        let instance = ComponentInstance::new("a", "sdc.test.card", "v1")
            .with_input("author", json!("not a record"))
            .with_input("colour", json!("red"));
        let bound = bind_inputs(&instance, &schema());

        assert_eq!(
            bound.issues(),
            [
                InputIssue::MissingRequired("title".into()),
                InputIssue::Invalid {
                    prop: "author".into(),
                    required: false,
                    source: PropSourceError::NotARecord
                },
                InputIssue::Unknown("colour".into()),
            ]
        );
        assert_eq!(bound.props().len(), 1);
    }
}
