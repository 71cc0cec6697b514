//! `trellis deps` command implementation.

use std::path::PathBuf;

use clap::Args as ClapArgs;
use color_eyre::eyre::Result;
use trellis_cli::{Config, fixtures};

use super::ContextArgs;
use crate::shell;

/// Arguments for the deps command.
#[derive(ClapArgs, Debug)]
pub struct Args {
    /// Flat component tree file.
    tree: PathBuf,

    #[command(flatten)]
    context: ContextArgs,
}

/// Run the deps command.
pub fn run(args: &Args, config: &Config) -> Result<()> {
    let tree = fixtures::read_tree(&args.tree)?;
    let context = args.context.load(config)?;
    let dependencies = context.hydrator().dependencies(&tree);
    shell::emit(&dependencies)?;
    Ok(())
}
