//! CLI command implementations.

pub mod deps;
pub mod hydrate;
pub mod order;
pub mod remove;
pub mod validate;

use std::path::PathBuf;

use clap::Args as ClapArgs;
use color_eyre::eyre::Result;
use trellis::url::Url;
use trellis::{DefinitionSet, JsonEntity};
use trellis_cli::{Config, fixtures};

use crate::note;

/// Evaluation context shared by `hydrate` and `deps`.
#[derive(ClapArgs, Debug)]
pub struct ContextArgs {
    /// Component definitions file (overrides the config file).
    #[arg(long, value_name = "PATH")]
    definitions: Option<PathBuf>,

    /// Host content item the tree is rendered for.
    #[arg(long, value_name = "PATH")]
    host: Option<PathBuf>,

    /// Site base URL (overrides the config file).
    #[arg(long, value_name = "URL")]
    base_url: Option<String>,
}

/// What [`ContextArgs`] point at, loaded.
#[derive(Debug)]
pub struct Context {
    pub definitions: DefinitionSet,
    pub host: Option<JsonEntity>,
    pub base_url: Option<Url>,
}

impl ContextArgs {
    pub fn load(&self, config: &Config) -> Result<Context> {
        let path = config.definitions(self.definitions.as_deref())?;
        let definitions = fixtures::read_definitions(&path)?;
        note!("loaded {} component definitions from {}", definitions.len(), path.display());

        let host = self.host.as_deref().map(fixtures::read_host).transpose()?;
        let base_url = config.base_url(self.base_url.as_deref())?;
        Ok(Context {
            definitions,
            host,
            base_url,
        })
    }
}

impl Context {
    /// A hydrator over the loaded definitions, host and base URL.
    pub fn hydrator(&self) -> trellis::Hydrator<'_> {
        let mut hydrator = trellis::Hydrator::new(&self.definitions);
        if let Some(host) = &self.host {
            hydrator = hydrator.with_host(host);
        }
        if let Some(base_url) = &self.base_url {
            hydrator = hydrator.with_base_url(base_url);
        }
        hydrator
    }
}
