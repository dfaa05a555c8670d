//! envkit CLI entrypoint.
//!
//! This is the main entrypoint for the envkit command-line tool.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use envkit::cli::{Cli, Commands, EnvCommands, OutputFormatter, SecretsCommands};
use envkit::config::{
    fingerprint_spec, find_spec_file, write_sample_spec, EnvironmentSpec, SpecLoader,
    SpecValidator,
};
use envkit::doctor::ShellRunner;
use envkit::environment::EnvironmentManager;
use envkit::error::{ConfigError, EnvkitError, ProvisionError, Result};
use envkit::infra::{default_infra_registry, run_infra};
use envkit::provision::Provisioner;
use envkit::secrets::default_secret_registry;
use envkit::state::{LocalStateStore, StateStore};

use clap::Parser;
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose, cli.log_json);

    // Run async runtime
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Initializes the logging system.
///
/// `--verbose` forces `debug`; otherwise `RUST_LOG` applies, defaulting to `info`.
fn init_logging(verbose: bool, json: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Main async entry point.
async fn run(cli: Cli) -> Result<ExitCode> {
    let ctx = Context {
        spec: cli.spec,
        state_dir: cli.state_dir,
        formatter: OutputFormatter::new(cli.output),
    };

    match cli.command {
        Commands::Init { path, force } => cmd_init(&ctx, &path, force).await,
        Commands::Validate { warnings } => cmd_validate(&ctx, warnings),
        Commands::Doctor => cmd_doctor(&ctx).await,
        Commands::Provision { env } => cmd_provision(&ctx, env.as_deref()).await,
        Commands::Snapshot { env, lock } => cmd_snapshot(&ctx, env.as_deref(), &lock).await,
        Commands::Verify { env, lock } => cmd_verify(&ctx, env.as_deref(), &lock).await,
        Commands::Fingerprint { env } => cmd_fingerprint(&ctx, env.as_deref()),
        Commands::Env { command } => cmd_env(&ctx, command),
        Commands::Secrets { command } => cmd_secrets(&ctx, command).await,
        Commands::Infra { command } => {
            let (operation, args) = command.split();
            let (spec, spec_dir) = ctx.load_environment(args.env.as_deref())?;
            let provisioner = ctx.provisioner(&spec_dir)?;
            let registry = default_infra_registry()?;
            let result =
                run_infra(&registry, &args.provider, operation, &spec, provisioner.audit()).await?;
            emit(&ctx.formatter.format_infra(&args.provider, operation, &result))?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Destroy { preserve_cache } => cmd_destroy(&ctx, preserve_cache).await,
        Commands::Plugins => {
            let provisioner = ctx.provisioner(Path::new("."))?;
            emit(&ctx.formatter.format_plugins(&provisioner.plugins().names()))?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Write a starter spec and initialize the state directory.
async fn cmd_init(ctx: &Context, path: &Path, force: bool) -> Result<ExitCode> {
    let created = write_sample_spec(path, force)?;

    let store = LocalStateStore::with_base_dir(&ctx.state_dir);
    store.init().await?;

    emit(&ctx.formatter.success(&format!(
        "Initialized environment spec at {}",
        created.display()
    )))?;
    Ok(ExitCode::SUCCESS)
}

/// Validate the spec and its hierarchy, reporting every issue.
fn cmd_validate(ctx: &Context, show_warnings: bool) -> Result<ExitCode> {
    let (spec, _) = ctx.load_unvalidated()?;

    let result = SpecValidator::new().check(&spec);
    let hierarchy = EnvironmentManager::new(spec).validate_environments();

    emit(&ctx.formatter.format_validation(&result, &hierarchy, show_warnings))?;

    Ok(exit_code(result.is_valid() && hierarchy.valid))
}

/// Run readiness checks and save the doctor report.
async fn cmd_doctor(ctx: &Context) -> Result<ExitCode> {
    let (spec, spec_dir) = ctx.load_environment(None)?;
    let provisioner = ctx.provisioner(&spec_dir)?;

    let (report, path) = provisioner.diagnose(ShellRunner, &spec).await?;
    emit(&ctx.formatter.format_doctor(&report, &path))?;

    Ok(exit_code(report.passed()))
}

/// Provision an environment.
async fn cmd_provision(ctx: &Context, env: Option<&str>) -> Result<ExitCode> {
    let (spec, spec_dir) = ctx.load_environment(env)?;
    let provisioner = ctx.provisioner(&spec_dir)?;

    let report = provisioner.provision(&spec).await?;
    emit(&ctx.formatter.format_provision(&report))?;

    Ok(ExitCode::SUCCESS)
}

/// Write a lockfile for an environment.
async fn cmd_snapshot(ctx: &Context, env: Option<&str>, lock: &Path) -> Result<ExitCode> {
    let (spec, spec_dir) = ctx.load_environment(env)?;
    let provisioner = ctx.provisioner(&spec_dir)?;

    let snapshot = provisioner.snapshot(&spec, lock).await?;
    emit(&ctx.formatter.format_snapshot(&snapshot, lock))?;

    Ok(ExitCode::SUCCESS)
}

/// Compare an environment with its lockfile.
async fn cmd_verify(ctx: &Context, env: Option<&str>, lock: &Path) -> Result<ExitCode> {
    let (spec, spec_dir) = ctx.load_environment(env)?;
    let provisioner = ctx.provisioner(&spec_dir)?;

    let check = provisioner.verify(&spec, lock).await?;
    emit(&ctx.formatter.format_check(&check))?;

    if check.matches {
        Ok(ExitCode::SUCCESS)
    } else {
        Err(ProvisionError::SnapshotMismatch {
            environment: check.environment,
            expected: check.expected,
            actual: check.actual,
        }
        .into())
    }
}

/// Print the fingerprint of an environment.
fn cmd_fingerprint(ctx: &Context, env: Option<&str>) -> Result<ExitCode> {
    let (spec, _) = ctx.load_environment(env)?;
    let fingerprint = fingerprint_spec(&spec)?;

    emit(&ctx.formatter.format_fingerprint(&spec.name, &fingerprint))?;
    Ok(ExitCode::SUCCESS)
}

/// Environment manager commands.
fn cmd_env(ctx: &Context, command: EnvCommands) -> Result<ExitCode> {
    let (spec, _) = ctx.load_spec()?;
    let manager = EnvironmentManager::new(spec);

    match command {
        EnvCommands::List => {
            emit(&ctx.formatter.format_environments(&manager.all_environments()))?;
        }
        EnvCommands::Show { name } => {
            let spec = manager
                .get_environment(&name)
                .ok_or(ConfigError::UnknownEnvironment { name })?;
            emit(&ctx.formatter.format_environment(spec))?;
        }
        EnvCommands::Promote { from, to } => {
            for name in [&from, &to] {
                if manager.get_environment(name).is_none() {
                    return Err(ConfigError::UnknownEnvironment { name: name.clone() }.into());
                }
            }
            let promoted = manager.promote_environment(&from, &to).ok_or_else(|| {
                EnvkitError::internal(format!("Promotion of '{from}' to '{to}' failed"))
            })?;
            emit(&ctx.formatter.format_environment(&promoted))?;
        }
        EnvCommands::Validate => {
            let hierarchy = manager.validate_environments();
            emit(&ctx.formatter.format_hierarchy(&hierarchy))?;
            return Ok(exit_code(hierarchy.valid));
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// Secrets broker commands.
async fn cmd_secrets(ctx: &Context, command: SecretsCommands) -> Result<ExitCode> {
    match command {
        SecretsCommands::Fetch { env } => {
            let (spec, spec_dir) = ctx.load_environment(env.as_deref())?;
            let provisioner = ctx.provisioner(&spec_dir)?;
            let fetched = provisioner.broker().fetch(&spec.secrets).await?;
            emit(&ctx.formatter.format_secrets(&fetched))?;
            Ok(exit_code(fetched.is_complete()))
        }
        SecretsCommands::Rotate { env } => {
            let (spec, spec_dir) = ctx.load_environment(env.as_deref())?;
            let provisioner = ctx.provisioner(&spec_dir)?;
            let rotation = provisioner.broker().rotate(&spec.secrets).await?;
            emit(&ctx.formatter.format_rotation(&rotation))?;
            Ok(exit_code(rotation.failures.is_empty()))
        }
        SecretsCommands::Health => {
            let provisioner = ctx.provisioner(Path::new("."))?;
            let health = provisioner.broker().health().await;
            emit(&ctx.formatter.format_health(&health))?;
            Ok(exit_code(health.iter().all(|h| h.healthy)))
        }
    }
}

/// Remove envkit state.
async fn cmd_destroy(ctx: &Context, preserve_cache: bool) -> Result<ExitCode> {
    let provisioner = ctx.provisioner(Path::new("."))?;

    let message = if provisioner.destroy(preserve_cache).await? {
        "Environment state removed"
    } else {
        "No environment state found to destroy"
    };
    emit(&ctx.formatter.success(message))?;

    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Global options shared by every command.
struct Context {
    spec: Option<PathBuf>,
    state_dir: PathBuf,
    formatter: OutputFormatter,
}

impl Context {
    /// Resolves the spec file path.
    fn spec_path(&self) -> Result<PathBuf> {
        match &self.spec {
            Some(path) => Ok(path.clone()),
            None => find_spec_file(std::env::current_dir()?),
        }
    }

    /// Loads the spec and its `.env` without validating it.
    fn load_unvalidated(&self) -> Result<(EnvironmentSpec, PathBuf)> {
        let spec_file = self.spec_path()?;
        debug!("Loading spec from: {}", spec_file.display());

        let spec_dir = spec_file
            .parent()
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        let loader = SpecLoader::new().with_base_path(&spec_dir);
        loader.load_dotenv()?;

        let spec = loader.load_with_env(&spec_file)?;
        Ok((spec, spec_dir))
    }

    /// Loads and validates the spec.
    fn load_spec(&self) -> Result<(EnvironmentSpec, PathBuf)> {
        let (spec, spec_dir) = self.load_unvalidated()?;
        SpecValidator::new().validate(&spec)?;
        Ok((spec, spec_dir))
    }

    /// Loads the spec and resolves `env`, defaulting to the base spec.
    fn load_environment(&self, env: Option<&str>) -> Result<(EnvironmentSpec, PathBuf)> {
        let (spec, spec_dir) = self.load_spec()?;
        let Some(name) = env else {
            return Ok((spec, spec_dir));
        };

        let manager = EnvironmentManager::new(spec);
        let resolved = manager
            .get_environment(name)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownEnvironment {
                name: name.to_string(),
            })?;
        Ok((resolved, spec_dir))
    }

    /// Creates a provisioner over the local state directory.
    fn provisioner(&self, spec_dir: &Path) -> Result<Provisioner> {
        let store = LocalStateStore::with_base_dir(&self.state_dir);
        debug!("Using {} state at {}", store.backend_type(), store.root().display());
        Ok(Provisioner::new(
            Box::new(store),
            default_secret_registry()?,
            spec_dir,
        ))
    }
}

/// Writes command output to stdout.
fn emit(output: &str) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(output.as_bytes())?;
    stdout.flush()?;
    Ok(())
}

/// Maps a success flag to a process exit code.
const fn exit_code(success: bool) -> ExitCode {
    if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
