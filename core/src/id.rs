//! Identifiers for component instances and component definitions.

use core::borrow::Borrow;
use core::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of the synthetic root every root-level instance hangs from.
///
/// It never appears in a stored tree; hydrated output is keyed by it.
pub const ROOT_UUID: &str = "a548b48d-58a8-4077-aa04-da9405a6f418";

/// Stable identifier of one component instance within a tree.
///
/// Assigned once when the instance is created and never changed afterwards.
/// The value is opaque: stored trees may use any string, freshly created
/// instances get a random v4 UUID.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(String);

impl InstanceId {
    /// Wraps an existing identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh random identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if this is the synthetic root identifier.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0 == ROOT_UUID
    }
}

/// Reference to a component definition, e.g. `sdc.olivero.teaser`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComponentId(String);

impl ComponentId {
    /// Wraps a component definition identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

macro_rules! impl_id_conversions {
    ($($ty:ty),*) => {
        $(
            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(&self.0)
                }
            }

            impl From<&str> for $ty {
                fn from(value: &str) -> Self {
                    Self(value.to_owned())
                }
            }

            impl From<String> for $ty {
                fn from(value: String) -> Self {
                    Self(value)
                }
            }

            impl Borrow<str> for $ty {
                fn borrow(&self) -> &str {
                    &self.0
                }
            }

            impl AsRef<str> for $ty {
                fn as_ref(&self) -> &str {
                    &self.0
                }
            }
        )*
    };
}

impl_id_conversions!(InstanceId, ComponentId);
