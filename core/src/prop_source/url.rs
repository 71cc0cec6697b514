//! URL-valued prop sources.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use trellis_url::Url;

use super::EvaluationContext;
use crate::dependencies::Dependencies;
use crate::error::PropSourceError;
use crate::id::ComponentId;

/// Makes `raw` absolute: first against the component directory, then against
/// the site base URL.
fn absolutize(raw: &str, ctx: &EvaluationContext<'_>) -> Result<String, PropSourceError> {
    let invalid = |source| PropSourceError::InvalidUrl {
        value: raw.to_owned(),
        source,
    };

    let mut url = Url::parse(raw).map_err(invalid)?;
    if url.is_absolute() {
        return Ok(url.into_string());
    }
    if let Some(component_base) = ctx.component_base() {
        url = Url::parse(component_base)
            .and_then(|base| base.join(url.as_str()))
            .map_err(invalid)?;
    }
    if url.is_relative() {
        let base = ctx.base_url().ok_or_else(|| PropSourceError::MissingBaseUrl {
            value: raw.to_owned(),
        })?;
        url = base.join(url.as_str()).map_err(invalid)?;
    }
    Ok(url.into_string())
}

/// A component-relative URL, typically an example image shipped with the
/// component, made absolute at evaluation time.
///
/// The value is a URL string, an object whose `src` is one, or a list of
/// either.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultRelativeUrlPropSource {
    value: Value,
    json_schema: Value,
    component_id: ComponentId,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct DefaultRelativeUrlRecord {
    value: Value,
    json_schema: Value,
    component_id: ComponentId,
}

impl DefaultRelativeUrlPropSource {
    /// Creates a source.
    pub fn new(value: Value, json_schema: Value, component_id: impl Into<ComponentId>) -> Self {
        Self {
            value,
            json_schema,
            component_id: component_id.into(),
        }
    }

    pub(super) fn from_record(record: DefaultRelativeUrlRecord) -> Self {
        Self {
            value: record.value,
            json_schema: record.json_schema,
            component_id: record.component_id,
        }
    }

    pub(super) fn to_record(&self) -> DefaultRelativeUrlRecord {
        DefaultRelativeUrlRecord {
            value: self.value.clone(),
            json_schema: self.json_schema.clone(),
            component_id: self.component_id.clone(),
        }
    }

    /// The stored, relative value.
    #[must_use]
    pub const fn value(&self) -> &Value {
        &self.value
    }

    /// The JSON schema of the prop the value was written for.
    #[must_use]
    pub const fn json_schema(&self) -> &Value {
        &self.json_schema
    }

    /// The component the value ships with.
    #[must_use]
    pub const fn component_id(&self) -> &ComponentId {
        &self.component_id
    }

    pub(super) fn evaluate(
        &self,
        ctx: &EvaluationContext<'_>,
        is_required: bool,
    ) -> Result<Value, PropSourceError> {
        if is_required && self.value.is_null() {
            return Err(PropSourceError::RequiredValueMissing);
        }
        rewrite(&self.value, ctx)
    }

    pub(super) fn dependencies(&self) -> Dependencies {
        let mut dependencies = Dependencies::new();
        dependencies.add_config(format!("component.{}", self.component_id));
        dependencies
    }
}

fn rewrite(value: &Value, ctx: &EvaluationContext<'_>) -> Result<Value, PropSourceError> {
    match value {
        Value::String(raw) => absolutize(raw, ctx).map(Value::String),
        Value::Object(properties) => {
            let mut properties = properties.clone();
            if let Some(Value::String(src)) = properties.get("src") {
                let src = absolutize(src, ctx)?;
                properties.insert("src".to_owned(), Value::String(src));
            }
            Ok(Value::Object(properties))
        }
        Value::Array(items) => items
            .iter()
            .map(|item| rewrite(item, ctx))
            .collect::<Result<_, _>>()
            .map(Value::Array),
        other => Ok(other.clone()),
    }
}

/// The canonical URL of the host content item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostEntityUrlPropSource {
    absolute: bool,
}

#[derive(Serialize, Deserialize)]
pub(super) struct HostEntityUrlRecord {
    #[serde(default)]
    absolute: bool,
}

impl HostEntityUrlPropSource {
    /// Creates a source; `absolute` prefixes the site base URL.
    #[must_use]
    pub const fn new(absolute: bool) -> Self {
        Self { absolute }
    }

    pub(super) const fn from_record(record: HostEntityUrlRecord) -> Self {
        Self::new(record.absolute)
    }

    pub(super) const fn to_record(self) -> HostEntityUrlRecord {
        HostEntityUrlRecord {
            absolute: self.absolute,
        }
    }

    /// Returns true if the URL includes scheme and host.
    #[must_use]
    pub const fn is_absolute(&self) -> bool {
        self.absolute
    }

    pub(super) fn evaluate(
        &self,
        ctx: &EvaluationContext<'_>,
        is_required: bool,
    ) -> Result<Value, PropSourceError> {
        let host = ctx.host().ok_or(PropSourceError::MissingHostContext)?;
        let Some(path) = host.canonical_path() else {
            return if is_required {
                Err(PropSourceError::RequiredValueMissing)
            } else {
                Ok(Value::Null)
            };
        };
        if !self.absolute {
            return Ok(Value::String(path.to_owned()));
        }
        let base = ctx.base_url().ok_or_else(|| PropSourceError::MissingBaseUrl {
            value: path.to_owned(),
        })?;
        base.join(path)
            .map(|url| Value::String(url.into_string()))
            .map_err(|source| PropSourceError::InvalidUrl {
                value: path.to_owned(),
                source,
            })
    }

    pub(super) fn dependencies(self, ctx: &EvaluationContext<'_>) -> Dependencies {
        let mut dependencies = Dependencies::new();
        if let Some(host) = ctx.host() {
            if let Some(id) = host.id() {
                dependencies.add_content(format!("{}:{id}", host.entity_type_id()));
            }
        }
        dependencies
    }
}
