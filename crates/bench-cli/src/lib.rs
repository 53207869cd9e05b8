//! Command line and environment configuration for the bench bot binary.

pub mod cli_args;

pub use cli_args::Cli;
