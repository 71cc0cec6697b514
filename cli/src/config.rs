//! `trellis.toml`.

use std::{
    fs,
    path::{Path, PathBuf},
};

use color_eyre::eyre::{Result, WrapErr, eyre};
use serde::{Deserialize, Serialize};
use trellis::url::Url;

/// Optional project settings. Command line flags win over every field.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Site base URL used to make relative URLs absolute.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Tracing filter directive, e.g. `trellis_core=debug`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_filter: Option<String>,
    /// Component definitions file used when `--definitions` is not given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definitions: Option<PathBuf>,
}

impl Config {
    /// Reads and parses the config file at `path`.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read or is not a valid config.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .wrap_err_with(|| format!("failed to read {}", path.display()))?;
        let mut config: Self = toml::from_str(&contents)
            .wrap_err_with(|| format!("failed to parse {}", path.display()))?;
        // relative definitions paths are relative to the config file
        if let (Some(definitions), Some(dir)) = (&config.definitions, path.parent()) {
            if definitions.is_relative() {
                config.definitions = Some(dir.join(definitions));
            }
        }
        Ok(config)
    }

    /// Loads an explicitly named config, or `trellis.toml` in `root` if it
    /// exists, or the defaults.
    ///
    /// # Errors
    ///
    /// Fails if an explicitly named file is missing, or if any file found is
    /// invalid.
    pub fn load_or_default(explicit: Option<&Path>, root: &Path) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        let path = Self::path(root);
        if path.is_file() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Where the config lives inside `root`.
    #[must_use]
    pub fn path(root: &Path) -> PathBuf {
        root.join("trellis.toml")
    }

    /// The base URL from `flag`, or else from the file.
    ///
    /// # Errors
    ///
    /// Fails if the URL does not parse or has no host.
    pub fn base_url(&self, flag: Option<&str>) -> Result<Option<Url>> {
        let Some(raw) = flag.or(self.base_url.as_deref()) else {
            return Ok(None);
        };
        let url = Url::parse(raw).wrap_err_with(|| format!("invalid base URL `{raw}`"))?;
        if !url.is_web() {
            return Err(eyre!("base URL `{raw}` must be an absolute `scheme://host` URL"));
        }
        Ok(Some(url))
    }

    /// The definitions file from `flag`, or else from the file.
    ///
    /// # Errors
    ///
    /// Fails if neither names one.
    pub fn definitions(&self, flag: Option<&Path>) -> Result<PathBuf> {
        flag.map(Path::to_path_buf)
            .or_else(|| self.definitions.clone())
            .ok_or_else(|| {
                eyre!("no component definitions given; pass --definitions or set `definitions` in trellis.toml")
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("trellis-config-{name}-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn loads_all_fields() {
        let dir = scratch("full");
        fs::write(
            Config::path(&dir),
            "base_url = \"https://example.com\"\nlog_filter = \"debug\"\ndefinitions = \"components.json\"\n",
        )
        .unwrap();

        let config = Config::load_or_default(None, &dir).unwrap();
        assert_eq!(config.base_url.as_deref(), Some("https://example.com"));
        assert_eq!(config.log_filter.as_deref(), Some("debug"));
        assert_eq!(config.definitions, Some(dir.join("components.json")));
        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn missing_file_means_defaults() {
        let dir = scratch("empty");
        assert_eq!(Config::load_or_default(None, &dir).unwrap(), Config::default());
        assert!(Config::load_or_default(Some(&dir.join("nope.toml")), &dir).is_err());
        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn flags_override_file() {
        let config = Config {
            base_url: Some("https://file.example".into()),
            log_filter: None,
            definitions: Some("file.json".into()),
        };
        assert_eq!(
            config.base_url(Some("https://flag.example")).unwrap().unwrap().as_str(),
            "https://flag.example"
        );
        assert_eq!(
            config.base_url(None).unwrap().unwrap().as_str(),
            "https://file.example"
        );
        assert_eq!(
            config.definitions(Some(Path::new("flag.json"))).unwrap(),
            PathBuf::from("flag.json")
        );
        assert!(Config::default().definitions(None).is_err());
        assert!(config.base_url(Some("/relative")).is_err());
        assert!(config.base_url(Some("mailto:site@example.com")).is_err());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(toml::from_str::<Config>("colour = \"red\"").is_err());
    }
}
