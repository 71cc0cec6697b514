//! `trellis validate` command implementation.

use std::path::PathBuf;

use clap::Args as ClapArgs;
use color_eyre::eyre::{Result, eyre};
use serde::Serialize;
use trellis::{FlattenedTree, InstanceId, NestedPath, ValidationError, flatten_nested, validate};
use trellis_cli::{Config, fixtures};

use crate::shell;
use crate::{error, success};

/// Arguments for the validate command.
#[derive(ClapArgs, Debug)]
pub struct Args {
    /// Component tree file, flat unless `--nested` is given.
    file: PathBuf,

    /// The file holds a nested tree; report errors by position in it.
    #[arg(long)]
    nested: bool,

    /// Component definitions file (overrides the config file).
    #[arg(long, value_name = "PATH")]
    definitions: Option<PathBuf>,
}

#[derive(Serialize)]
struct Problem<'a> {
    uuid: &'a InstanceId,
    #[serde(skip_serializing_if = "Option::is_none")]
    prop: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<&'a NestedPath>,
    message: String,
}

#[derive(Serialize)]
struct Report<'a> {
    valid: bool,
    errors: Vec<Problem<'a>>,
}

/// Run the validate command.
pub fn run(args: &Args, config: &Config) -> Result<()> {
    let path = config.definitions(args.definitions.as_deref())?;
    let definitions = fixtures::read_definitions(&path)?;

    let (tree, flattened) = if args.nested {
        let flattened = flatten_nested(fixtures::read_nested(&args.file)?)?;
        (flattened.tree().clone(), Some(flattened))
    } else {
        (fixtures::read_tree(&args.file)?, None)
    };
    let instances = tree.len();

    let errors = match validate(tree, &definitions) {
        Ok(_) => {
            if shell::get().is_json() {
                shell::emit(&Report {
                    valid: true,
                    errors: Vec::new(),
                })?;
            } else {
                success!("{instances} component instances are valid");
            }
            return Ok(());
        }
        Err(errors) => errors,
    };

    let locate = |e: &ValidationError| flattened.as_ref().and_then(|f: &FlattenedTree| f.locate(e));
    if shell::get().is_json() {
        shell::emit(&Report {
            valid: false,
            errors: errors
                .errors()
                .iter()
                .map(|e| Problem {
                    uuid: &e.uuid,
                    prop: e.prop.as_deref(),
                    path: locate(e),
                    message: e.kind.to_string(),
                })
                .collect(),
        })?;
    } else {
        for e in &errors {
            match locate(e) {
                Some(path) => error!("at {path}: {e}"),
                None => error!("{e}"),
            }
        }
    }
    Err(eyre!("{} validation error(s)", errors.len()))
}
