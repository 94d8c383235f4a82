//! CLI module for taskloop - command-line interface and subcommands.

pub mod commands;

pub use commands::Cli;
