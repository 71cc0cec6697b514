//! # Prop Sources
//!
//! A prop source produces the concrete value of one component prop. The set
//! of strategies is closed:
//!
//! | `sourceType`            | Variant                                   | Needs host |
//! |-------------------------|-------------------------------------------|------------|
//! | `static:field_item:<t>` | [`StaticPropSource`]: a literal value     | no         |
//! | `dynamic`               | [`DynamicPropSource`]: a host field read  | yes        |
//! | `adapter:<id>`          | [`AdaptedPropSource`]: a transform        | if inputs do |
//! | `default-relative-url`  | [`DefaultRelativeUrlPropSource`]          | no         |
//! | `host-entity-url`       | [`HostEntityUrlPropSource`]               | yes        |
//!
//! Sources are stored inside an instance's `inputs` as tagged JSON records.
//! [`PropSource::parse`] and [`PropSource::to_record`] are the only places that
//! know the tags; everything else matches on [`PropSource`] exhaustively.
//!
//! ```
//! use serde_json::json;
//! use trellis_core::prop_source::{EvaluationContext, PropSource};
//!
//! let source = PropSource::parse(&json!({
//!     "sourceType": "static:field_item:string",
//!     "value": "Hello",
//! }))?;
//! let value = source.evaluate(&EvaluationContext::new(), true)?;
//! assert_eq!(value, json!("Hello"));
//! # Ok::<(), trellis_core::PropSourceError>(())
//! ```

mod adapter;
mod dynamic;
mod static_source;
mod url;

use core::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use trellis_url::Url;

pub use adapter::{AdaptedPropSource, Adapter, AdapterRegistry, DayCount, UnixToDate};
pub use dynamic::{DynamicPropSource, FieldExpression};
pub use static_source::{Cardinality, StaticPropSource, StaticShape};
pub use url::{DefaultRelativeUrlPropSource, HostEntityUrlPropSource};

use crate::dependencies::Dependencies;
use crate::error::PropSourceError;
use crate::host::HostEntity;

const SOURCE_TYPE: &str = "sourceType";

/// One of the five prop source strategies.
#[derive(Debug, Clone, PartialEq)]
pub enum PropSource {
    /// A literal value stored with the instance.
    Static(StaticPropSource),
    /// A field of the host content item.
    Dynamic(DynamicPropSource),
    /// Named child sources fed through an adapter.
    Adapted(AdaptedPropSource),
    /// A component-relative URL made absolute at evaluation time.
    DefaultRelativeUrl(DefaultRelativeUrlPropSource),
    /// The canonical URL of the host content item.
    HostEntityUrl(HostEntityUrlPropSource),
}

/// Discriminant of a [`PropSource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropSourceKind {
    /// [`PropSource::Static`].
    Static,
    /// [`PropSource::Dynamic`].
    Dynamic,
    /// [`PropSource::Adapted`].
    Adapted,
    /// [`PropSource::DefaultRelativeUrl`].
    DefaultRelativeUrl,
    /// [`PropSource::HostEntityUrl`].
    HostEntityUrl,
}

impl PropSourceKind {
    /// Returns true if evaluating this kind always needs a host content item.
    #[must_use]
    pub const fn requires_host(self) -> bool {
        matches!(self, Self::Dynamic | Self::HostEntityUrl)
    }
}

impl fmt::Display for PropSourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Static => "static",
            Self::Dynamic => "dynamic",
            Self::Adapted => "adapter",
            Self::DefaultRelativeUrl => "default-relative-url",
            Self::HostEntityUrl => "host-entity-url",
        })
    }
}

impl PropSource {
    /// Parses a tagged record.
    ///
    /// # Errors
    ///
    /// - [`PropSourceError::NotARecord`] if `value` is not an object.
    /// - [`PropSourceError::MissingSourceType`] if it has no string `sourceType`.
    /// - [`PropSourceError::UnknownSourceType`] if the tag is not recognized.
    /// - [`PropSourceError::Malformed`] or [`PropSourceError::InvalidExpression`]
    ///   if the record does not fit its variant.
    pub fn parse(value: &Value) -> Result<Self, PropSourceError> {
        let Value::Object(record) = value else {
            return Err(PropSourceError::NotARecord);
        };
        let source_type = record
            .get(SOURCE_TYPE)
            .and_then(Value::as_str)
            .ok_or(PropSourceError::MissingSourceType)?;

        if let Some(field_type) = source_type.strip_prefix("static:") {
            let field_type = field_type.strip_prefix("field_item:").unwrap_or(field_type);
            return StaticPropSource::from_record(field_type, decode(source_type, record)?)
                .map(Self::Static);
        }
        if let Some(adapter) = source_type.strip_prefix("adapter:") {
            return AdaptedPropSource::from_record(adapter, decode(source_type, record)?)
                .map(Self::Adapted);
        }
        match source_type {
            "dynamic" => DynamicPropSource::from_record(decode(source_type, record)?).map(Self::Dynamic),
            "default-relative-url" => Ok(Self::DefaultRelativeUrl(
                DefaultRelativeUrlPropSource::from_record(decode(source_type, record)?),
            )),
            "host-entity-url" => Ok(Self::HostEntityUrl(HostEntityUrlPropSource::from_record(
                decode(source_type, record)?,
            ))),
            other => Err(PropSourceError::UnknownSourceType(other.to_owned())),
        }
    }

    /// Parses a stored input, expanding a collapsed static value.
    ///
    /// A stored input without a `sourceType` is a bare static value; `shape`
    /// supplies its field type and cardinality.
    ///
    /// # Errors
    ///
    /// Same as [`PropSource::parse`]. Without a shape, a bare value fails with
    /// [`PropSourceError::NotARecord`] or [`PropSourceError::MissingSourceType`].
    pub fn parse_input(value: &Value, shape: Option<&StaticShape>) -> Result<Self, PropSourceError> {
        let tagged = value
            .as_object()
            .is_some_and(|record| record.contains_key(SOURCE_TYPE));
        match shape {
            Some(shape) if !tagged => Ok(Self::Static(shape.source(value.clone()))),
            _ => Self::parse(value),
        }
    }

    /// Serializes to a tagged record.
    #[must_use]
    pub fn to_record(&self) -> Value {
        let (source_type, mut record) = match self {
            Self::Static(source) => (
                format!("static:field_item:{}", source.field_type()),
                encode(source.to_record()),
            ),
            Self::Dynamic(source) => ("dynamic".to_owned(), encode(source.to_record())),
            Self::Adapted(source) => (
                format!("adapter:{}", source.adapter()),
                encode(source.to_record()),
            ),
            Self::DefaultRelativeUrl(source) => {
                ("default-relative-url".to_owned(), encode(source.to_record()))
            }
            Self::HostEntityUrl(source) => ("host-entity-url".to_owned(), encode(source.to_record())),
        };
        record.insert(SOURCE_TYPE.to_owned(), Value::String(source_type));
        Value::Object(record)
    }

    /// The variant.
    #[must_use]
    pub const fn kind(&self) -> PropSourceKind {
        match self {
            Self::Static(_) => PropSourceKind::Static,
            Self::Dynamic(_) => PropSourceKind::Dynamic,
            Self::Adapted(_) => PropSourceKind::Adapted,
            Self::DefaultRelativeUrl(_) => PropSourceKind::DefaultRelativeUrl,
            Self::HostEntityUrl(_) => PropSourceKind::HostEntityUrl,
        }
    }

    /// Produces the prop value.
    ///
    /// `is_required` turns an empty result into
    /// [`PropSourceError::RequiredValueMissing`].
    ///
    /// # Errors
    ///
    /// [`PropSourceError::MissingHostContext`] if the source reads from the host
    /// and `ctx` has none; otherwise whatever the variant reports.
    pub fn evaluate(
        &self,
        ctx: &EvaluationContext<'_>,
        is_required: bool,
    ) -> Result<Value, PropSourceError> {
        match self {
            Self::Static(source) => source.evaluate(is_required),
            Self::Dynamic(source) => source.evaluate(ctx, is_required),
            Self::Adapted(source) => source.evaluate(ctx, is_required),
            Self::DefaultRelativeUrl(source) => source.evaluate(ctx, is_required),
            Self::HostEntityUrl(source) => source.evaluate(ctx, is_required),
        }
    }

    /// What the produced value depends on.
    ///
    /// Works without a host; host-derived content dependencies are then absent.
    #[must_use]
    pub fn calculate_dependencies(&self, ctx: &EvaluationContext<'_>) -> Dependencies {
        match self {
            Self::Static(source) => source.dependencies(),
            Self::Dynamic(source) => source.dependencies(ctx),
            Self::Adapted(source) => source.dependencies(ctx),
            Self::DefaultRelativeUrl(source) => source.dependencies(),
            Self::HostEntityUrl(source) => source.dependencies(ctx),
        }
    }
}

impl Serialize for PropSource {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_record().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PropSource {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::parse(&value).map_err(serde::de::Error::custom)
    }
}

impl From<StaticPropSource> for PropSource {
    fn from(source: StaticPropSource) -> Self {
        Self::Static(source)
    }
}

impl From<DynamicPropSource> for PropSource {
    fn from(source: DynamicPropSource) -> Self {
        Self::Dynamic(source)
    }
}

impl From<AdaptedPropSource> for PropSource {
    fn from(source: AdaptedPropSource) -> Self {
        Self::Adapted(source)
    }
}

impl From<DefaultRelativeUrlPropSource> for PropSource {
    fn from(source: DefaultRelativeUrlPropSource) -> Self {
        Self::DefaultRelativeUrl(source)
    }
}

impl From<HostEntityUrlPropSource> for PropSource {
    fn from(source: HostEntityUrlPropSource) -> Self {
        Self::HostEntityUrl(source)
    }
}

fn decode<T: DeserializeOwned>(
    source_type: &str,
    record: &Map<String, Value>,
) -> Result<T, PropSourceError> {
    serde_json::from_value(Value::Object(record.clone())).map_err(|e| PropSourceError::Malformed {
        source_type: source_type.to_owned(),
        message: e.to_string(),
    })
}

fn encode<T: Serialize>(record: T) -> Map<String, Value> {
    match serde_json::to_value(record) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    }
}

/// Everything a prop source may read while evaluating.
///
/// Cheap to copy; the hydrator derives one per instance.
#[derive(Debug, Clone, Copy)]
pub struct EvaluationContext<'a> {
    host: Option<&'a dyn HostEntity>,
    base_url: Option<&'a Url>,
    component_base: Option<&'a str>,
    adapters: &'a AdapterRegistry,
}

impl<'a> EvaluationContext<'a> {
    /// A context with no host, no base URL and the built-in adapters.
    #[must_use]
    pub fn new() -> Self {
        Self {
            host: None,
            base_url: None,
            component_base: None,
            adapters: AdapterRegistry::builtin(),
        }
    }

    /// Sets the host content item.
    #[must_use]
    pub const fn with_host(mut self, host: &'a dyn HostEntity) -> Self {
        self.host = Some(host);
        self
    }

    /// Sets the site base URL relative URLs are resolved against last.
    #[must_use]
    pub const fn with_base_url(mut self, base_url: &'a Url) -> Self {
        self.base_url = Some(base_url);
        self
    }

    /// Sets the directory of the component being evaluated.
    #[must_use]
    pub const fn with_component_base(mut self, component_base: &'a str) -> Self {
        self.component_base = Some(component_base);
        self
    }

    /// Replaces the adapter registry.
    #[must_use]
    pub const fn with_adapters(mut self, adapters: &'a AdapterRegistry) -> Self {
        self.adapters = adapters;
        self
    }

    /// The host content item, if any.
    #[must_use]
    pub const fn host(&self) -> Option<&'a dyn HostEntity> {
        self.host
    }

    /// The site base URL, if any.
    #[must_use]
    pub const fn base_url(&self) -> Option<&'a Url> {
        self.base_url
    }

    /// The component directory, if any.
    #[must_use]
    pub const fn component_base(&self) -> Option<&'a str> {
        self.component_base
    }

    /// The adapters available to [`AdaptedPropSource`].
    #[must_use]
    pub const fn adapters(&self) -> &'a AdapterRegistry {
        self.adapters
    }
}

impl Default for EvaluationContext<'_> {
    fn default() -> Self {
        Self::new()
    }
}
