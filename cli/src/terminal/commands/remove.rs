//! `trellis remove` command implementation.

use std::path::PathBuf;

use clap::Args as ClapArgs;
use color_eyre::eyre::Result;
use serde::Serialize;
use trellis::{ComponentTree, InstanceId};
use trellis_cli::fixtures;

use crate::shell;
use crate::{line, success};

/// Arguments for the remove command.
#[derive(ClapArgs, Debug)]
pub struct Args {
    /// Flat component tree file.
    tree: PathBuf,

    /// The instance to remove.
    uuid: String,

    /// Write the result back instead of printing it.
    #[arg(long)]
    write: bool,
}

#[derive(Serialize)]
struct Report<'a> {
    removed: Vec<&'a InstanceId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tree: Option<&'a ComponentTree>,
}

/// Run the remove command.
pub fn run(args: &Args) -> Result<()> {
    let mut tree = fixtures::read_tree(&args.tree)?;
    let removed = tree.remove(&InstanceId::from(args.uuid.as_str()))?;

    if args.write {
        fixtures::write_json(&args.tree, &tree)?;
    }

    if shell::get().is_json() {
        shell::emit(&Report {
            removed: removed.iter().collect(),
            tree: (!args.write).then_some(&tree),
        })?;
        return Ok(());
    }

    success!("Removed {} component instance(s)", removed.len());
    for uuid in &removed {
        line!("  {uuid}");
    }
    if args.write {
        success!("Wrote {}", args.tree.display());
    } else {
        shell::emit(&tree)?;
    }
    Ok(())
}
