//! Adapter prop sources.
//!
//! An adapter evaluates a set of named child sources and folds the results
//! into one value. Adapters are looked up by id in an [`AdapterRegistry`];
//! [`AdapterRegistry::builtin`] holds `day_count` and `unix_to_date`.

use core::fmt::Debug;
use std::collections::BTreeMap;
use std::sync::{Arc, LazyLock};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::macros::format_description;
use time::{Date, OffsetDateTime};

use super::{EvaluationContext, PropSource};
use crate::dependencies::Dependencies;
use crate::error::{AdapterError, PropSourceError};

/// A named transform from several input values to one prop value.
pub trait Adapter: Send + Sync + Debug {
    /// The identifier used in `adapter:<id>` source types.
    fn id(&self) -> &str;

    /// The module providing the adapter.
    fn provider(&self) -> &str;

    /// Inputs that must be present and non-empty.
    fn required_inputs(&self) -> &[&'static str];

    /// Computes the value.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError`] if the inputs cannot be transformed.
    fn adapt(&self, inputs: &IndexMap<String, Value>) -> Result<Value, AdapterError>;
}

/// Adapters by id.
#[derive(Debug, Clone, Default)]
pub struct AdapterRegistry {
    adapters: BTreeMap<String, Arc<dyn Adapter>>,
}

static BUILTIN: LazyLock<AdapterRegistry> = LazyLock::new(AdapterRegistry::with_builtins);

impl AdapterRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding [`DayCount`] and [`UnixToDate`].
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(DayCount);
        registry.register(UnixToDate);
        registry
    }

    /// The shared registry of built-in adapters.
    #[must_use]
    pub fn builtin() -> &'static Self {
        &BUILTIN
    }

    /// Adds an adapter, replacing any with the same id.
    pub fn register(&mut self, adapter: impl Adapter + 'static) -> &mut Self {
        self.adapters
            .insert(adapter.id().to_owned(), Arc::new(adapter));
        self
    }

    /// Looks up an adapter.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&dyn Adapter> {
        self.adapters.get(id).map(|adapter| &**adapter)
    }

    /// Registered ids in sorted order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.adapters.keys().map(String::as_str)
    }
}

/// Named child sources fed through an adapter.
#[derive(Debug, Clone, PartialEq)]
pub struct AdaptedPropSource {
    adapter: String,
    inputs: IndexMap<String, PropSource>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct AdaptedRecord {
    adapter_inputs: IndexMap<String, PropSource>,
}

impl AdaptedPropSource {
    /// Creates a source with no inputs.
    pub fn new(adapter: impl Into<String>) -> Self {
        Self {
            adapter: adapter.into(),
            inputs: IndexMap::new(),
        }
    }

    /// Adds an input.
    #[must_use]
    pub fn with_input(mut self, name: impl Into<String>, source: impl Into<PropSource>) -> Self {
        self.inputs.insert(name.into(), source.into());
        self
    }

    pub(super) fn from_record(adapter: &str, record: AdaptedRecord) -> Result<Self, PropSourceError> {
        if adapter.is_empty() {
            return Err(PropSourceError::Malformed {
                source_type: "adapter".to_owned(),
                message: "missing adapter id".to_owned(),
            });
        }
        Ok(Self {
            adapter: adapter.to_owned(),
            inputs: record.adapter_inputs,
        })
    }

    pub(super) fn to_record(&self) -> AdaptedRecord {
        AdaptedRecord {
            adapter_inputs: self.inputs.clone(),
        }
    }

    /// The adapter id.
    #[must_use]
    pub fn adapter(&self) -> &str {
        &self.adapter
    }

    /// The input sources, in stored order.
    #[must_use]
    pub const fn inputs(&self) -> &IndexMap<String, PropSource> {
        &self.inputs
    }

    pub(super) fn evaluate(
        &self,
        ctx: &EvaluationContext<'_>,
        is_required: bool,
    ) -> Result<Value, PropSourceError> {
        let adapter = ctx
            .adapters()
            .get(&self.adapter)
            .ok_or_else(|| PropSourceError::UnknownAdapter(self.adapter.clone()))?;
        let required = adapter.required_inputs();
        if let Some(missing) = required.iter().find(|name| !self.inputs.contains_key(**name)) {
            return Err(PropSourceError::MissingAdapterInput {
                adapter: self.adapter.clone(),
                input: (*missing).to_owned(),
            });
        }

        let mut values = IndexMap::with_capacity(self.inputs.len());
        for (name, source) in &self.inputs {
            let value = source.evaluate(ctx, required.iter().any(|r| *r == name.as_str()))?;
            values.insert(name.clone(), value);
        }

        let value = adapter
            .adapt(&values)
            .map_err(|source| PropSourceError::Adapter {
                adapter: self.adapter.clone(),
                source,
            })?;
        if is_required && value.is_null() {
            return Err(PropSourceError::RequiredValueMissing);
        }
        Ok(value)
    }

    pub(super) fn dependencies(&self, ctx: &EvaluationContext<'_>) -> Dependencies {
        let mut dependencies: Dependencies = self
            .inputs
            .values()
            .map(|source| source.calculate_dependencies(ctx))
            .collect();
        if let Some(adapter) = ctx.adapters().get(&self.adapter) {
            dependencies.add_module(adapter.provider());
        }
        dependencies
    }
}

fn date_input(inputs: &IndexMap<String, Value>, name: &str) -> Result<Date, AdapterError> {
    let raw = inputs
        .get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| AdapterError::new(format!("input `{name}` must be a date string")))?;
    // datetime values carry a time part; only the date counts
    let date = raw.get(..10).unwrap_or(raw);
    Date::parse(date, format_description!("[year]-[month]-[day]"))
        .map_err(|e| AdapterError::new(format!("input `{name}` is not a date: {e}")))
}

/// Whole days from `oldest` to `newest`; negative if reversed.
#[derive(Debug, Clone, Copy, Default)]
pub struct DayCount;

impl Adapter for DayCount {
    fn id(&self) -> &str {
        "day_count"
    }

    fn provider(&self) -> &str {
        "datetime"
    }

    fn required_inputs(&self) -> &[&'static str] {
        &["oldest", "newest"]
    }

    fn adapt(&self, inputs: &IndexMap<String, Value>) -> Result<Value, AdapterError> {
        let oldest = date_input(inputs, "oldest")?;
        let newest = date_input(inputs, "newest")?;
        Ok(Value::from((newest - oldest).whole_days()))
    }
}

/// A unix timestamp as an ISO 8601 date (UTC).
#[derive(Debug, Clone, Copy, Default)]
pub struct UnixToDate;

impl Adapter for UnixToDate {
    fn id(&self) -> &str {
        "unix_to_date"
    }

    fn provider(&self) -> &str {
        "datetime"
    }

    fn required_inputs(&self) -> &[&'static str] {
        &["unix"]
    }

    fn adapt(&self, inputs: &IndexMap<String, Value>) -> Result<Value, AdapterError> {
        let timestamp = inputs
            .get("unix")
            .and_then(Value::as_i64)
            .ok_or_else(|| AdapterError::new("input `unix` must be an integer"))?;
        let date = OffsetDateTime::from_unix_timestamp(timestamp)
            .map_err(|e| AdapterError::new(e.to_string()))?
            .date();
        date.format(format_description!("[year]-[month]-[day]"))
            .map(Value::String)
            .map_err(|e| AdapterError::new(e.to_string()))
    }
}
