//! Subcommand implementations, one module per command group

pub mod config;
pub mod pull;
pub mod records;
pub mod status;
pub mod sync;
