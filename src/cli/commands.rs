//! CLI command definitions.
//!
//! This module defines all CLI commands and their arguments using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::infra::InfraOperation;

/// envkit - Declarative environment provisioning.
#[derive(Parser, Debug)]
#[command(name = "envkit")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the spec file (searched upward from the current directory if omitted).
    #[arg(short, long, global = true, env = "ENVKIT_SPEC")]
    pub spec: Option<PathBuf>,

    /// State directory.
    #[arg(long, global = true, env = "ENVKIT_STATE_DIR", default_value = ".envkit")]
    pub state_dir: PathBuf,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON.
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Output format (text, json).
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write a starter spec and initialize the state directory.
    Init {
        /// Where to write the spec.
        #[arg(long, default_value = "envkit.yaml")]
        path: PathBuf,

        /// Force overwrite an existing spec.
        #[arg(short, long)]
        force: bool,
    },

    /// Validate the spec and its environment hierarchy.
    Validate {
        /// Show all warnings, not just errors.
        #[arg(short, long)]
        warnings: bool,
    },

    /// Run readiness checks.
    Doctor,

    /// Provision an environment.
    Provision {
        /// Environment to provision (defaults to the base spec).
        #[arg(short, long)]
        env: Option<String>,
    },

    /// Write a reproducibility lockfile.
    Snapshot {
        /// Environment to snapshot (defaults to the base spec).
        #[arg(short, long)]
        env: Option<String>,

        /// Lockfile path.
        #[arg(long, env = "ENVKIT_LOCK", default_value = "envkit.lock.json")]
        lock: PathBuf,
    },

    /// Check an environment against its lockfile.
    Verify {
        /// Environment to verify (defaults to the base spec).
        #[arg(short, long)]
        env: Option<String>,

        /// Lockfile path.
        #[arg(long, env = "ENVKIT_LOCK", default_value = "envkit.lock.json")]
        lock: PathBuf,
    },

    /// Print the fingerprint of an environment.
    Fingerprint {
        /// Environment to fingerprint (defaults to the base spec).
        #[arg(short, long)]
        env: Option<String>,
    },

    /// Inspect resolved environments.
    Env {
        /// Environment subcommand.
        #[command(subcommand)]
        command: EnvCommands,
    },

    /// Work with secrets.
    Secrets {
        /// Secrets subcommand.
        #[command(subcommand)]
        command: SecretsCommands,
    },

    /// Drive infrastructure providers.
    Infra {
        /// Infrastructure operation.
        #[command(subcommand)]
        command: InfraCommands,
    },

    /// Remove envkit state.
    Destroy {
        /// Keep cached toolchains.
        #[arg(long)]
        preserve_cache: bool,
    },

    /// List registered plugins.
    Plugins,
}

/// Environment subcommands.
#[derive(Subcommand, Debug)]
pub enum EnvCommands {
    /// List resolved environments.
    List,

    /// Show a resolved environment.
    Show {
        /// Environment name.
        name: String,
    },

    /// Copy secrets and toolchains from one environment onto another.
    Promote {
        /// Source environment.
        from: String,

        /// Target environment.
        to: String,
    },

    /// Check the hierarchy for cycles and unknown parents.
    Validate,
}

/// Secrets subcommands.
#[derive(Subcommand, Debug)]
pub enum SecretsCommands {
    /// Fetch every secret of an environment.
    Fetch {
        /// Environment (defaults to the base spec).
        #[arg(short, long)]
        env: Option<String>,
    },

    /// Rotate every secret of an environment.
    Rotate {
        /// Environment (defaults to the base spec).
        #[arg(short, long)]
        env: Option<String>,
    },

    /// Report provider health.
    Health,
}

/// Infrastructure subcommands.
#[derive(Subcommand, Debug)]
pub enum InfraCommands {
    /// Create or update resources.
    Deploy(InfraArgs),
    /// Tear resources down.
    Destroy(InfraArgs),
    /// Show resource status.
    Status(InfraArgs),
    /// Detect drift.
    Drift(InfraArgs),
}

/// Arguments shared by infrastructure operations.
#[derive(clap::Args, Debug)]
pub struct InfraArgs {
    /// Provider kind (terraform, cloudformation, arm).
    #[arg(short, long)]
    pub provider: String,

    /// Environment (defaults to the base spec).
    #[arg(short, long)]
    pub env: Option<String>,
}

impl InfraCommands {
    /// Splits the command into its operation and arguments.
    #[must_use]
    pub const fn split(&self) -> (InfraOperation, &InfraArgs) {
        match self {
            Self::Deploy(args) => (InfraOperation::Deploy, args),
            Self::Destroy(args) => (InfraOperation::Destroy, args),
            Self::Status(args) => (InfraOperation::Status, args),
            Self::Drift(args) => (InfraOperation::Drift, args),
        }
    }
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}
