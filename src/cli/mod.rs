//! CLI module for tbloop - command-line interface and subcommands.

pub mod commands;

pub use commands::Cli;
