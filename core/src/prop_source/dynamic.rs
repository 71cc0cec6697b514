//! Props read from a field of the host content item.
//!
//! The field is addressed by a [`FieldExpression`] such as
//! `entity:node:article/title/0/value`.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::EvaluationContext;
use crate::dependencies::Dependencies;
use crate::error::PropSourceError;

/// Where a dynamic prop reads from on the host content item.
///
/// Written as `entity:<type>:<bundle>/<field>[/<delta>][/<property>]`:
///
/// - `entity:node:article/title` reads the `value` of every `title` item.
/// - `entity:node:article/field_tags/0/target_id` reads `target_id` of the
///   first item only.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldExpression {
    entity_type: String,
    bundle: String,
    field: String,
    delta: Option<usize>,
    property: Option<String>,
}

impl FieldExpression {
    /// The entity type the host must have.
    #[must_use]
    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    /// The bundle the host must have.
    #[must_use]
    pub fn bundle(&self) -> &str {
        &self.bundle
    }

    /// The field name.
    #[must_use]
    pub fn field(&self) -> &str {
        &self.field
    }

    /// A single item position, if the expression names one.
    #[must_use]
    pub const fn delta(&self) -> Option<usize> {
        self.delta
    }

    /// The item property, if the expression names one.
    #[must_use]
    pub fn property(&self) -> Option<&str> {
        self.property.as_deref()
    }

    fn extract(&self, item: &Value) -> Value {
        let Value::Object(properties) = item else {
            return item.clone();
        };
        let property = self.property.as_deref().unwrap_or("value");
        properties.get(property).cloned().unwrap_or_else(|| {
            if self.property.is_some() {
                Value::Null
            } else {
                item.clone()
            }
        })
    }
}

impl FromStr for FieldExpression {
    type Err = PropSourceError;

    fn from_str(expression: &str) -> Result<Self, Self::Err> {
        let invalid = |reason| PropSourceError::InvalidExpression {
            expression: expression.to_owned(),
            reason,
        };

        let rest = expression
            .strip_prefix("entity:")
            .ok_or_else(|| invalid("must start with `entity:`"))?;
        let mut segments = rest.split('/');
        let (entity_type, bundle) = segments
            .next()
            .and_then(|target| target.split_once(':'))
            .filter(|(entity_type, bundle)| !entity_type.is_empty() && !bundle.is_empty())
            .ok_or_else(|| invalid("missing `<type>:<bundle>`"))?;
        let field = segments
            .next()
            .filter(|field| !field.is_empty())
            .ok_or_else(|| invalid("missing field name"))?;

        let mut delta = None;
        let mut property = None;
        for segment in segments {
            if segment.is_empty() {
                return Err(invalid("empty segment"));
            }
            match segment.parse::<usize>() {
                Ok(position) if delta.is_none() && property.is_none() => delta = Some(position),
                Err(_) if property.is_none() => property = Some(segment.to_owned()),
                _ => return Err(invalid("too many segments")),
            }
        }

        Ok(Self {
            entity_type: entity_type.to_owned(),
            bundle: bundle.to_owned(),
            field: field.to_owned(),
            delta,
            property,
        })
    }
}

impl fmt::Display for FieldExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entity:{}:{}/{}", self.entity_type, self.bundle, self.field)?;
        if let Some(delta) = self.delta {
            write!(f, "/{delta}")?;
        }
        if let Some(property) = &self.property {
            write!(f, "/{property}")?;
        }
        Ok(())
    }
}

/// A field of the host content item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DynamicPropSource {
    expression: FieldExpression,
}

#[derive(Serialize, Deserialize)]
pub(super) struct DynamicRecord {
    expression: String,
}

impl DynamicPropSource {
    /// Creates a source from a parsed expression.
    #[must_use]
    pub const fn new(expression: FieldExpression) -> Self {
        Self { expression }
    }

    pub(super) fn from_record(record: DynamicRecord) -> Result<Self, PropSourceError> {
        record.expression.parse().map(Self::new)
    }

    pub(super) fn to_record(&self) -> DynamicRecord {
        DynamicRecord {
            expression: self.expression.to_string(),
        }
    }

    /// The expression.
    #[must_use]
    pub const fn expression(&self) -> &FieldExpression {
        &self.expression
    }

    pub(super) fn evaluate(
        &self,
        ctx: &EvaluationContext<'_>,
        is_required: bool,
    ) -> Result<Value, PropSourceError> {
        let host = ctx.host().ok_or(PropSourceError::MissingHostContext)?;
        let expr = &self.expression;
        if host.entity_type_id() != expr.entity_type || host.bundle() != expr.bundle {
            return Err(PropSourceError::HostMismatch {
                expected: format!("{}:{}", expr.entity_type, expr.bundle),
                actual: host.type_label(),
            });
        }

        let items = match host.field(&expr.field) {
            None | Some(Value::Null) => &[][..],
            Some(Value::Array(items)) => items.as_slice(),
            Some(single) => core::slice::from_ref(single),
        };
        let value = match expr.delta {
            Some(delta) => items.get(delta).map_or(Value::Null, |item| expr.extract(item)),
            None if items.len() <= 1 => items.first().map_or(Value::Null, |item| expr.extract(item)),
            None => Value::Array(items.iter().map(|item| expr.extract(item)).collect()),
        };

        if is_required && value.is_null() {
            return Err(PropSourceError::RequiredValueMissing);
        }
        Ok(value)
    }

    pub(super) fn dependencies(&self, ctx: &EvaluationContext<'_>) -> Dependencies {
        let expr = &self.expression;
        let mut dependencies = Dependencies::new();
        dependencies.add_config(format!(
            "field.field.{}.{}.{}",
            expr.entity_type, expr.bundle, expr.field
        ));
        if let Some(id) = ctx.host().and_then(|host| host.id()) {
            dependencies.add_content(format!("{}:{id}", expr.entity_type));
        }
        dependencies
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::JsonEntity;
    use serde_json::json;

    fn source(expression: &str) -> DynamicPropSource {
        DynamicPropSource::new(expression.parse().unwrap())
    }

    fn article() -> JsonEntity {
        JsonEntity::new("node", "article")
            .with_id("1")
            .with_field("title", json!([{"value": "Hello"}]))
            .with_field(
                "field_tags",
                json!([{"target_id": 3}, {"target_id": 5}]),
            )
    }

    #[test]
    fn parses_expression_segments() {
        let expr: FieldExpression = "entity:node:article/field_tags/1/target_id".parse().unwrap();
        assert_eq!(expr.entity_type(), "node");
        assert_eq!(expr.bundle(), "article");
        assert_eq!(expr.field(), "field_tags");
        assert_eq!(expr.delta(), Some(1));
        assert_eq!(expr.property(), Some("target_id"));
        assert_eq!(expr.to_string(), "entity:node:article/field_tags/1/target_id");
    }

    #[test]
    fn rejects_bad_expressions() {
        for bad in [
            "node:article/title",
            "entity:node/title",
            "entity:node:article",
            "entity:node:article/title/0/value/extra",
            "entity:node:article/title//value",
        ] {
            assert!(
                matches!(
                    bad.parse::<FieldExpression>(),
                    Err(PropSourceError::InvalidExpression { .. })
                ),
                "{bad}"
            );
        }
    }

    #[test]
    fn without_host_fails() {
        let ctx = EvaluationContext::new();
        assert_eq!(
            source("entity:node:article/title").evaluate(&ctx, false),
            Err(PropSourceError::MissingHostContext)
        );
    }

    #[test]
    fn reads_single_and_multiple_items() {
        let host = article();
        let ctx = EvaluationContext::new().with_host(&host);
        assert_eq!(
            source("entity:node:article/title").evaluate(&ctx, true),
            Ok(json!("Hello"))
        );
        assert_eq!(
            source("entity:node:article/field_tags/target_id").evaluate(&ctx, true),
            Ok(json!([3, 5]))
        );
        assert_eq!(
            source("entity:node:article/field_tags/1/target_id").evaluate(&ctx, true),
            Ok(json!(5))
        );
        assert_eq!(
            source("entity:node:article/body").evaluate(&ctx, true),
            Err(PropSourceError::RequiredValueMissing)
        );
    }

    #[test]
    fn host_must_match_bundle() {
        let host = JsonEntity::new("node", "page");
        let ctx = EvaluationContext::new().with_host(&host);
        assert_eq!(
            source("entity:node:article/title").evaluate(&ctx, false),
            Err(PropSourceError::HostMismatch {
                expected: "node:article".into(),
                actual: "node:page".into()
            })
        );
    }

    #[test]
    fn depends_on_field_config_and_host() {
        let host = article();
        let deps = source("entity:node:article/title")
            .dependencies(&EvaluationContext::new().with_host(&host));
        assert!(deps.config.contains("field.field.node.article.title"));
        assert!(deps.content.contains("node:1"));

        let deps = source("entity:node:article/title").dependencies(&EvaluationContext::new());
        assert!(deps.content.is_empty());
    }
}
