//! CLI subcommands.

pub mod migrate;
pub mod reap;
pub mod store;
