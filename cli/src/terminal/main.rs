//! `trellis` CLI entry point.

mod commands;
mod shell;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr};
use trellis_cli::Config;

use commands::{deps, hydrate, order, remove, validate};

/// Inspect, hydrate and validate flat component trees.
#[derive(Parser, Debug)]
#[command(name = "trellis", version, about, long_about = None)]
struct Cli {
    /// Output in JSON format (machine-readable).
    #[arg(long, global = true)]
    json: bool,

    /// Config file (defaults to `trellis.toml` in the current directory).
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Tracing filter, e.g. `trellis_core=debug` (overrides the config file).
    #[arg(long, global = true, value_name = "FILTER")]
    log: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print canonical order, bottom-up edges and structural violations.
    Order(order::Args),

    /// Assemble the nested render tree.
    Hydrate(hydrate::Args),

    /// Print merged cache dependencies.
    Deps(deps::Args),

    /// Validate a flat or nested tree against component definitions.
    Validate(validate::Args),

    /// Remove an instance and everything placed inside it.
    Remove(remove::Args),
}

fn main() -> Result<()> {
    color_eyre::config::HookBuilder::default()
        .display_location_section(false)
        .display_env_section(false)
        .install()?;

    let cli = Cli::parse();

    // Initialize global shell
    shell::init(cli.json);

    let cwd = std::env::current_dir().wrap_err("cannot determine the current directory")?;
    let config = Config::load_or_default(cli.config.as_deref(), &cwd)?;
    trellis::logging::install(cli.log.as_deref().or(config.log_filter.as_deref()));

    match cli.command {
        Commands::Order(args) => order::run(&args),
        Commands::Hydrate(args) => hydrate::run(&args, &config),
        Commands::Deps(args) => deps::run(&args, &config),
        Commands::Validate(args) => validate::run(&args, &config),
        Commands::Remove(args) => remove::run(&args),
    }
}
