//! CLI module for loz - command-line interface and subcommands.
//!
//! Provides the main entry point with the agent and one-shot ask commands.

pub mod commands;

pub use commands::Cli;
