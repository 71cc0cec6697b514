//! `trellis order` command implementation.

use std::path::PathBuf;

use clap::Args as ClapArgs;
use color_eyre::eyre::Result;
use serde::Serialize;
use trellis::{CanonicalKey, Edge, InstanceId, StructuralViolation};
use trellis_cli::fixtures;

use crate::shell;
use crate::{header, line, warn};

/// Arguments for the order command.
#[derive(ClapArgs, Debug)]
pub struct Args {
    /// Flat component tree file.
    tree: PathBuf,
}

#[derive(Serialize)]
struct Entry<'a> {
    key: &'a CanonicalKey,
    uuid: &'a InstanceId,
}

#[derive(Serialize)]
struct Report<'a> {
    canonical: Vec<Entry<'a>>,
    bottom_up: &'a [Edge],
    violations: &'a [StructuralViolation],
}

/// Run the order command.
pub fn run(args: &Args) -> Result<()> {
    let tree = fixtures::read_tree(&args.tree)?;
    let topology = tree.topology()?;

    if shell::get().is_json() {
        let report = Report {
            canonical: topology
                .canonical()
                .iter()
                .map(|(key, uuid)| Entry { key, uuid })
                .collect(),
            bottom_up: topology.bottom_up(),
            violations: topology.violations(),
        };
        shell::emit(&report)?;
        return Ok(());
    }

    header!("Canonical order");
    for (key, uuid) in topology.canonical() {
        let component = tree.get(uuid).map(|i| i.component_id().as_str()).unwrap_or_default();
        line!("  {:<16} {uuid}  {component}", key.to_string());
    }

    header!("Bottom-up edges");
    for edge in topology.bottom_up() {
        line!("  {} -> {}.{}", edge.child, edge.parent, edge.slot);
    }

    for violation in topology.violations() {
        warn!("{violation}");
    }
    Ok(())
}
