//! CLI module for envkit.
//!
//! This module provides the command-line interface for validating,
//! provisioning, and snapshotting environments.

mod commands;
mod output;

pub use commands::{
    Cli, Commands, EnvCommands, InfraArgs, InfraCommands, OutputFormat, SecretsCommands,
};
pub use output::OutputFormatter;
