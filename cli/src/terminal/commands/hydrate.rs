//! `trellis hydrate` command implementation.

use std::path::PathBuf;

use clap::Args as ClapArgs;
use color_eyre::eyre::{Result, eyre};
use trellis::validate;
use trellis_cli::{Config, fixtures};

use super::ContextArgs;
use crate::shell;
use crate::{error, warn};

/// Arguments for the hydrate command.
#[derive(ClapArgs, Debug)]
pub struct Args {
    /// Flat component tree file.
    tree: PathBuf,

    #[command(flatten)]
    context: ContextArgs,

    /// Validate first and treat any per-instance failure as fatal.
    #[arg(long)]
    strict: bool,
}

/// Run the hydrate command.
pub fn run(args: &Args, config: &Config) -> Result<()> {
    let tree = fixtures::read_tree(&args.tree)?;
    let context = args.context.load(config)?;
    let hydrator = context.hydrator();

    if args.strict {
        let validated = match validate(tree, &context.definitions) {
            Ok(validated) => validated,
            Err(errors) => {
                for error in &errors {
                    error!("{error}");
                }
                return Err(eyre!("{} validation error(s)", errors.len()));
            }
        };
        shell::emit(&hydrator.hydrate_validated(&validated)?)?;
        return Ok(());
    }

    let hydration = hydrator.hydrate(&tree)?;
    for violation in &hydration.violations {
        warn!("left out: {violation}");
    }
    for failure in &hydration.failures {
        warn!("instance {} rendered as placeholder: {}", failure.uuid, failure.failure);
    }
    shell::emit(&hydration.tree)?;
    Ok(())
}
