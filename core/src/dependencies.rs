//! Cache dependency sets.
//!
//! Whatever renders a tree needs to know which configuration, content,
//! modules and themes its output depends on so it can invalidate caches. The
//! engine computes and merges these sets; it never persists them.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Grouped, de-duplicated, sorted dependency names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependencies {
    /// Configuration objects, e.g. `component.sdc.test.card`.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub config: BTreeSet<String>,
    /// Content items, e.g. `node:1`.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub content: BTreeSet<String>,
    /// Modules providing code the output relies on.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub module: BTreeSet<String>,
    /// Themes providing code the output relies on.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub theme: BTreeSet<String>,
}

impl Dependencies {
    /// An empty set.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            config: BTreeSet::new(),
            content: BTreeSet::new(),
            module: BTreeSet::new(),
            theme: BTreeSet::new(),
        }
    }

    /// Adds a configuration dependency.
    pub fn add_config(&mut self, name: impl Into<String>) -> &mut Self {
        self.config.insert(name.into());
        self
    }

    /// Adds a content dependency.
    pub fn add_content(&mut self, name: impl Into<String>) -> &mut Self {
        self.content.insert(name.into());
        self
    }

    /// Adds a module dependency.
    pub fn add_module(&mut self, name: impl Into<String>) -> &mut Self {
        self.module.insert(name.into());
        self
    }

    /// Adds a theme dependency.
    pub fn add_theme(&mut self, name: impl Into<String>) -> &mut Self {
        self.theme.insert(name.into());
        self
    }

    /// Unions `other` into `self`.
    pub fn merge(&mut self, other: Self) {
        self.config.extend(other.config);
        self.content.extend(other.content);
        self.module.extend(other.module);
        self.theme.extend(other.theme);
    }

    /// Returns true if every group is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.config.is_empty()
            && self.content.is_empty()
            && self.module.is_empty()
            && self.theme.is_empty()
    }
}

impl Extend<Self> for Dependencies {
    fn extend<T: IntoIterator<Item = Self>>(&mut self, iter: T) {
        for other in iter {
            self.merge(other);
        }
    }
}

impl FromIterator<Self> for Dependencies {
    fn from_iter<T: IntoIterator<Item = Self>>(iter: T) -> Self {
        let mut merged = Self::new();
        merged.extend(iter);
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn merge_deduplicates_and_sorts() {
        let mut a = Dependencies::new();
        a.add_config("b").add_config("a").add_module("datetime");
        let mut b = Dependencies::new();
        b.add_config("a").add_content("node:1");

        let merged: Dependencies = [a, b].into_iter().collect();
        assert_eq!(merged.config.iter().collect::<Vec<_>>(), ["a", "b"]);
        assert_eq!(
            serde_json::to_value(&merged).unwrap(),
            json!({"config": ["a", "b"], "content": ["node:1"], "module": ["datetime"]})
        );
        assert!(Dependencies::new().is_empty());
    }
}
