//! Loading and storing the JSON files commands operate on.
//!
//! | File | Shape |
//! |------|-------|
//! | tree | array of flat component instance records |
//! | nested tree | array of components with children under `slots` |
//! | definitions | array of component definitions |
//! | host | one content item: `entity_type`, `bundle`, `id`, `path`, `fields` |

use std::{fs, path::Path};

use color_eyre::eyre::{Result, WrapErr};
use serde::{Serialize, de::DeserializeOwned};
use trellis::{ComponentTree, DefinitionSet, JsonEntity, NestedComponent};

fn read<T: DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
    let contents = fs::read_to_string(path)
        .wrap_err_with(|| format!("failed to read {what} from {}", path.display()))?;
    serde_json::from_str(&contents)
        .wrap_err_with(|| format!("{} is not a valid {what} file", path.display()))
}

/// Reads a flat component tree.
///
/// # Errors
///
/// Fails on I/O errors, malformed JSON and duplicate uuids.
pub fn read_tree(path: &Path) -> Result<ComponentTree> {
    read(path, "component tree")
}

/// Reads a caller-authored nested tree.
///
/// # Errors
///
/// Fails on I/O errors and malformed JSON.
pub fn read_nested(path: &Path) -> Result<Vec<NestedComponent>> {
    read(path, "nested component tree")
}

/// Reads component definitions.
///
/// # Errors
///
/// Fails on I/O errors and malformed JSON.
pub fn read_definitions(path: &Path) -> Result<DefinitionSet> {
    read(path, "component definitions")
}

/// Reads a host content item.
///
/// # Errors
///
/// Fails on I/O errors and malformed JSON.
pub fn read_host(path: &Path) -> Result<JsonEntity> {
    read(path, "host entity")
}

/// Writes `value` as pretty JSON with a trailing newline.
///
/// # Errors
///
/// Fails on I/O errors.
pub fn write_json(path: &Path, value: &impl Serialize) -> Result<()> {
    let mut contents = serde_json::to_string_pretty(value)?;
    contents.push('\n');
    fs::write(path, contents).wrap_err_with(|| format!("failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::path::PathBuf;
    use trellis::ComponentInstance;

    fn scratch(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("trellis-fixture-{name}-{}.json", std::process::id()))
    }

    #[test]
    fn tree_survives_a_write() {
        let path = scratch("tree");
        let tree = ComponentTree::from_instances([
            ComponentInstance::new("a", "sdc.test.card", "v1"),
            ComponentInstance::new("b", "sdc.test.card", "v1").in_slot("a", "content"),
        ])
        .unwrap();
        write_json(&path, &tree).unwrap();
        assert_eq!(read_tree(&path).unwrap(), tree);
        fs::remove_file(path).unwrap();
    }

    #[test]
    fn duplicate_uuids_fail_to_load() {
        let path = scratch("duplicates");
        let records = json!([
            {"uuid": "a", "component_id": "sdc.test.card", "component_version": "v1"},
            {"uuid": "a", "component_id": "sdc.test.card", "component_version": "v1"}
        ]);
        write_json(&path, &records).unwrap();
        let error = read_tree(&path).unwrap_err();
        assert!(format!("{error:?}").contains("already exists"));
        fs::remove_file(path).unwrap();
    }

    #[test]
    fn missing_file_names_the_kind() {
        let error = read_definitions(Path::new("/nonexistent/components.json")).unwrap_err();
        assert!(error.to_string().contains("component definitions"));
    }
}
