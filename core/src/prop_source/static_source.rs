//! Literal prop values and their declared cardinality.

use core::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::dependencies::Dependencies;
use crate::error::PropSourceError;

/// How many items a static value may hold.
///
/// Stored as an integer: `-1` is unlimited, anything else a positive limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum Cardinality {
    /// At most this many items.
    Limited(usize),
    /// Any number of items.
    Unlimited,
}

impl Cardinality {
    /// One item, stored as a bare value rather than a list.
    pub const SINGLE: Self = Self::Limited(1);

    /// Returns true if values are stored as lists.
    #[must_use]
    pub const fn is_multiple(self) -> bool {
        !matches!(self, Self::Limited(1))
    }

    /// Returns true if `count` items fit.
    #[must_use]
    pub const fn allows(self, count: usize) -> bool {
        match self {
            Self::Limited(limit) => count <= limit,
            Self::Unlimited => true,
        }
    }
}

impl Default for Cardinality {
    fn default() -> Self {
        Self::SINGLE
    }
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Limited(1) => f.write_str("a single value"),
            Self::Limited(limit) => write!(f, "at most {limit} values"),
            Self::Unlimited => f.write_str("any number of values"),
        }
    }
}

impl TryFrom<i64> for Cardinality {
    type Error = String;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            -1 => Ok(Self::Unlimited),
            n if n >= 1 => usize::try_from(n)
                .map(Self::Limited)
                .map_err(|e| e.to_string()),
            n => Err(format!("cardinality must be -1 or positive, got {n}")),
        }
    }
}

impl From<Cardinality> for i64 {
    fn from(cardinality: Cardinality) -> Self {
        match cardinality {
            Cardinality::Limited(limit) => Self::try_from(limit).unwrap_or(Self::MAX),
            Cardinality::Unlimited => -1,
        }
    }
}

/// The storage shape a component schema declares for a static prop.
///
/// Lets an instance store a bare value instead of a full tagged record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticShape {
    field_type: String,
    #[serde(default)]
    cardinality: Cardinality,
}

impl StaticShape {
    /// Creates a shape.
    pub fn new(field_type: impl Into<String>, cardinality: Cardinality) -> Self {
        Self {
            field_type: field_type.into(),
            cardinality,
        }
    }

    /// The field type, e.g. `string` or `entity_reference`.
    #[must_use]
    pub fn field_type(&self) -> &str {
        &self.field_type
    }

    /// The declared cardinality.
    #[must_use]
    pub const fn cardinality(&self) -> Cardinality {
        self.cardinality
    }

    /// Wraps a bare value in this shape.
    #[must_use]
    pub fn source(&self, value: Value) -> StaticPropSource {
        StaticPropSource::new(self.field_type.clone(), value).with_cardinality(self.cardinality)
    }
}

/// A literal value stored with the instance.
#[derive(Debug, Clone, PartialEq)]
pub struct StaticPropSource {
    field_type: String,
    value: Value,
    cardinality: Cardinality,
    expression: Option<String>,
}

#[derive(Serialize, Deserialize)]
pub(super) struct StaticRecord {
    value: Value,
    #[serde(default, skip_serializing_if = "is_single")]
    cardinality: Cardinality,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expression: Option<String>,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_single(cardinality: &Cardinality) -> bool {
    *cardinality == Cardinality::SINGLE
}

impl StaticPropSource {
    /// A single-cardinality value of `field_type`.
    pub fn new(field_type: impl Into<String>, value: Value) -> Self {
        Self {
            field_type: field_type.into(),
            value,
            cardinality: Cardinality::SINGLE,
            expression: None,
        }
    }

    /// Sets the cardinality.
    #[must_use]
    pub const fn with_cardinality(mut self, cardinality: Cardinality) -> Self {
        self.cardinality = cardinality;
        self
    }

    /// Sets the field property expression kept alongside the value.
    #[must_use]
    pub fn with_expression(mut self, expression: impl Into<String>) -> Self {
        self.expression = Some(expression.into());
        self
    }

    pub(super) fn from_record(field_type: &str, record: StaticRecord) -> Result<Self, PropSourceError> {
        if field_type.is_empty() {
            return Err(PropSourceError::Malformed {
                source_type: "static".to_owned(),
                message: "missing field type".to_owned(),
            });
        }
        Ok(Self {
            field_type: field_type.to_owned(),
            value: record.value,
            cardinality: record.cardinality,
            expression: record.expression,
        })
    }

    pub(super) fn to_record(&self) -> StaticRecord {
        StaticRecord {
            value: self.value.clone(),
            cardinality: self.cardinality,
            expression: self.expression.clone(),
        }
    }

    /// The field type.
    #[must_use]
    pub fn field_type(&self) -> &str {
        &self.field_type
    }

    /// The stored value.
    #[must_use]
    pub const fn value(&self) -> &Value {
        &self.value
    }

    /// The cardinality.
    #[must_use]
    pub const fn cardinality(&self) -> Cardinality {
        self.cardinality
    }

    /// The field property expression, if stored.
    #[must_use]
    pub fn expression(&self) -> Option<&str> {
        self.expression.as_deref()
    }

    pub(super) fn evaluate(&self, is_required: bool) -> Result<Value, PropSourceError> {
        let mismatch = |found| PropSourceError::ShapeMismatch {
            expected: self.cardinality.to_string(),
            found,
        };
        match &self.value {
            Value::Null if is_required => Err(PropSourceError::RequiredValueMissing),
            Value::Null => Ok(Value::Null),
            Value::Array(items) if self.cardinality.is_multiple() => {
                if !self.cardinality.allows(items.len()) {
                    return Err(PropSourceError::CardinalityMismatch {
                        expected: self.cardinality.to_string(),
                        actual: items.len(),
                    });
                }
                if is_required && items.is_empty() {
                    return Err(PropSourceError::RequiredValueMissing);
                }
                Ok(self.value.clone())
            }
            Value::Array(_) => Err(mismatch("a list")),
            _ if self.cardinality.is_multiple() => Err(mismatch("a single value")),
            value => Ok(value.clone()),
        }
    }

    pub(super) fn dependencies(&self) -> Dependencies {
        let mut dependencies = Dependencies::new();
        if self.field_type != "entity_reference" {
            return dependencies;
        }
        let items = match &self.value {
            Value::Array(items) => items.as_slice(),
            single => core::slice::from_ref(single),
        };
        for item in items {
            let target_type = item.get("target_type").and_then(Value::as_str);
            let target_id = item.get("target_id").map(|id| match id {
                Value::String(id) => id.clone(),
                other => other.to_string(),
            });
            if let (Some(target_type), Some(target_id)) = (target_type, target_id) {
                dependencies.add_content(format!("{target_type}:{target_id}"));
            }
        }
        dependencies
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn single_value_evaluates_as_stored() {
        let source = StaticPropSource::new("string", json!("Hello"));
        assert_eq!(source.evaluate(true), Ok(json!("Hello")));
        assert!(source.dependencies().is_empty());
    }

    #[test]
    fn required_null_is_missing() {
        let source = StaticPropSource::new("string", Value::Null);
        assert_eq!(source.evaluate(true), Err(PropSourceError::RequiredValueMissing));
        assert_eq!(source.evaluate(false), Ok(Value::Null));
    }

    #[test]
    fn list_must_fit_cardinality() {
        let source = StaticPropSource::new("string", json!(["a", "b", "c"]))
            .with_cardinality(Cardinality::Limited(2));
        assert_eq!(
            source.evaluate(false),
            Err(PropSourceError::CardinalityMismatch {
                expected: "at most 2 values".into(),
                actual: 3
            })
        );
        let unlimited = source.with_cardinality(Cardinality::Unlimited);
        assert_eq!(unlimited.evaluate(true), Ok(json!(["a", "b", "c"])));
    }

    #[test]
    fn value_shape_must_match_cardinality() {
        let list = StaticPropSource::new("string", json!(["a"]));
        assert_eq!(
            list.evaluate(false),
            Err(PropSourceError::ShapeMismatch {
                expected: "a single value".into(),
                found: "a list"
            })
        );

        let scalar = StaticPropSource::new("string", json!("a")).with_cardinality(Cardinality::Unlimited);
        assert_eq!(
            scalar.evaluate(false),
            Err(PropSourceError::ShapeMismatch {
                expected: "any number of values".into(),
                found: "a single value"
            })
        );

        let empty = StaticPropSource::new("string", Value::Null).with_cardinality(Cardinality::Limited(2));
        assert_eq!(empty.evaluate(false), Ok(Value::Null));
        assert_eq!(empty.evaluate(true), Err(PropSourceError::RequiredValueMissing));
    }

    #[test]
    fn cardinality_is_stored_as_integer() {
        assert_eq!(serde_json::to_value(Cardinality::Unlimited).unwrap(), json!(-1));
        assert_eq!(
            serde_json::from_value::<Cardinality>(json!(3)).unwrap(),
            Cardinality::Limited(3)
        );
        assert!(serde_json::from_value::<Cardinality>(json!(0)).is_err());
    }

    #[test]
    fn entity_references_are_content_dependencies() {
        let source = StaticPropSource::new(
            "entity_reference",
            json!([
                {"target_type": "media", "target_id": 4},
                {"target_type": "media", "target_id": "9"}
            ]),
        )
        .with_cardinality(Cardinality::Unlimited);
        let dependencies = source.dependencies();
        let content: Vec<&str> = dependencies.content.iter().map(String::as_str).collect();
        assert_eq!(content, ["media:4", "media:9"]);
    }
}
