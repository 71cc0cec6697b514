//! `trellis` CLI library
//!
//! Everything the `trellis` binary needs that is not terminal output:
//! reading `trellis.toml` and loading the JSON files the commands operate on.
//!
//! # Architecture
//!
//! - **Library modules** (`config`, `fixtures`) load and store data
//! - **Terminal frontend** (`cli/src/terminal/`) parses arguments and prints

pub mod config;
pub mod fixtures;

pub use config::Config;
