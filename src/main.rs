use anyhow::{bail, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;

use sso_attrs::config::{validate_region, Config};
use sso_attrs::resource::{
    ApplyOutcome, DeleteOutcome, DesiredConfiguration, Manifest, Observation,
    ObservedConfiguration, Plan, Reconciler, StateStore, UpdateOutcome, Verifier,
};
use sso_attrs::ssoadmin::api::list_all_instances;
use sso_attrs::ssoadmin::arn::InstanceArn;
use sso_attrs::ssoadmin::client::SsoAdminClient;
use sso_attrs::ReconcileError;

/// Version injected at compile time via SSO_ATTRS_VERSION env var (set by CI/CD),
/// or "dev" for local builds.
pub const VERSION: &str = match option_env!("SSO_ATTRS_VERSION") {
    Some(v) => v,
    None => "dev",
};

/// Manage IAM Identity Center instance access control attributes
#[derive(Parser, Debug)]
#[command(name = "sso-attrs", version, about, long_about = None)]
struct Args {
    /// Region of the SSO Admin endpoint
    #[arg(long, global = true)]
    region: Option<String>,

    /// Endpoint override: a signing proxy or local emulator.
    ///
    /// Requests are sent unsigned, so the default public endpoint
    /// (https://sso.<region>.amazonaws.com) answers AccessDenied.
    #[arg(long, global = true)]
    endpoint: Option<String>,

    /// Tracked-resource state file
    #[arg(long, global = true)]
    state: Option<PathBuf>,

    /// Deadline for each operation, in seconds
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Output format
    #[arg(long, value_enum, default_value = "yaml", global = true)]
    output: OutputFormat,

    /// Log level for debugging
    #[arg(long, value_enum, default_value = "off", global = true)]
    log_level: LogLevel,

    /// Run in read-only mode (block all write operations)
    #[arg(long, global = true)]
    readonly: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List instances visible to the caller
    Instances,
    /// Show what applying a manifest would change
    Plan {
        #[arg(short, long)]
        file: PathBuf,
    },
    /// Create, update or leave alone, whichever the manifest requires
    Apply {
        #[arg(short, long)]
        file: PathBuf,
    },
    /// Attach a configuration to an instance that has none
    Create {
        #[arg(short, long)]
        file: PathBuf,
    },
    /// Replace an attached configuration
    Update {
        #[arg(short, long)]
        file: PathBuf,
    },
    /// Show the configuration attached to an instance
    Read { instance_arn: String },
    /// Re-read every tracked instance
    Refresh,
    /// Detach the configuration from an instance
    Delete { instance_arn: String },
    /// Start tracking an existing configuration
    Import { instance_arn: String },
    /// Exit 0 when a configuration is attached
    Exists { instance_arn: String },
    /// Exit 0 when no configuration is attached
    Destroyed { instance_arn: String },
    /// Persist default region, endpoint and state file
    Configure {
        #[arg(long)]
        region: Option<String>,
        #[arg(long)]
        endpoint: Option<String>,
        #[arg(long)]
        state: Option<PathBuf>,
    },
}

impl Command {
    fn is_write(&self) -> bool {
        matches!(
            self,
            Command::Apply { .. }
                | Command::Create { .. }
                | Command::Update { .. }
                | Command::Delete { .. }
        )
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Json,
    Yaml,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

fn setup_logging(level: LogLevel) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let tracing_level = level.to_tracing_level()?;

    let log_path = get_log_path();

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let file = match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
    {
        Ok(file) => file,
        Err(e) => {
            eprintln!("Failed to open log file {}: {}", log_path.display(), e);
            return None;
        }
    };

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::fmt()
        .with_max_level(tracing_level)
        .with_writer(non_blocking.with_max_level(tracing_level))
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("sso-attrs {} started with log level: {:?}", VERSION, level);
    tracing::info!("Log file: {:?}", log_path);

    Some(guard)
}

fn get_log_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("sso-attrs").join("sso-attrs.log");
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".sso-attrs").join("sso-attrs.log");
    }
    PathBuf::from("sso-attrs.log")
}

/// What `plan` prints
#[derive(Debug, Serialize)]
struct PlanReport {
    instance_arn: String,
    action: &'static str,
    added: Vec<String>,
    removed: Vec<String>,
    changed: Vec<String>,
}

impl PlanReport {
    fn new(arn: &InstanceArn, plan: &Plan) -> Self {
        let (action, diff) = match plan {
            Plan::Create => ("create", None),
            Plan::Replace { diff, .. } => ("replace", Some(diff)),
            Plan::Noop(_) => ("noop", None),
        };
        Self {
            instance_arn: arn.to_string(),
            action,
            added: diff.map(|d| d.added.clone()).unwrap_or_default(),
            removed: diff.map(|d| d.removed.clone()).unwrap_or_default(),
            changed: diff.map(|d| d.changed.clone()).unwrap_or_default(),
        }
    }
}

/// One line of `refresh` output
#[derive(Debug, Serialize)]
struct RefreshReport {
    instance_arn: String,
    result: String,
}

struct Session {
    reconciler: Reconciler,
    state: StateStore,
    output: OutputFormat,
}

impl Session {
    fn print<T: Serialize>(&self, value: &T) -> Result<()> {
        let rendered = match self.output {
            OutputFormat::Json => serde_json::to_string_pretty(value)?,
            OutputFormat::Yaml => serde_yaml::to_string(value)?,
        };
        println!("{}", rendered.trim_end());
        Ok(())
    }

    fn print_observed(&self, observed: &ObservedConfiguration) -> Result<()> {
        self.print(&Manifest::from_observed(observed))
    }

    fn track(&mut self, observed: &ObservedConfiguration) -> Result<()> {
        self.state.track(observed);
        self.state.save()
    }

    fn untrack(&mut self, arn: &InstanceArn) -> Result<()> {
        if self.state.untrack(arn.as_str()) {
            self.state.save()?;
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    let _log_guard = setup_logging(args.log_level);

    if args.readonly && args.command.is_write() {
        bail!("Read-only mode: write operations are disabled");
    }

    let mut config = Config::load();

    if let Command::Configure {
        region,
        endpoint,
        state,
    } = &args.command
    {
        return configure(&mut config, region, endpoint, state);
    }

    let region = config.effective_region(args.region.as_deref())?;
    let endpoint = config.effective_endpoint(args.endpoint.as_deref(), &region);
    tracing::info!("Using region: {}, endpoint: {}", region, endpoint);

    let client = SsoAdminClient::new(&region, Some(&endpoint))?
        .with_session_token(Config::session_token());
    let policy = config
        .retry
        .clone()
        .with_operation_timeout(args.timeout.map(Duration::from_secs));
    let reconciler = Reconciler::new(Arc::new(client), policy);

    let state_path = config.effective_state_path(args.state.as_deref());
    let mut ctx = Session {
        reconciler,
        state: StateStore::load(&state_path)?,
        output: args.output,
    };

    run(&mut ctx, args.command).await
}

fn configure(
    config: &mut Config,
    region: &Option<String>,
    endpoint: &Option<String>,
    state: &Option<PathBuf>,
) -> Result<ExitCode> {
    if let Some(region) = region {
        validate_region(region)?;
        config.region = Some(region.clone());
    }
    if let Some(endpoint) = endpoint {
        config.endpoint = Some(endpoint.clone());
    }
    if let Some(state) = state {
        config.state_path = Some(state.clone());
    }
    config.save()?;
    Ok(ExitCode::SUCCESS)
}

fn load_desired(file: &Path) -> Result<DesiredConfiguration> {
    let manifest = Manifest::load(file)?;
    let desired = manifest
        .to_desired()
        .map_err(|e| ReconcileError::configuration(manifest.instance_arn.clone(), e))?;
    Ok(desired)
}

async fn run(ctx: &mut Session, command: Command) -> Result<ExitCode> {
    match command {
        Command::Instances => {
            let instances = list_all_instances(ctx.reconciler.api()).await?;
            tracing::info!("Loaded {} instances", instances.len());
            ctx.print(&instances)?;
        }
        Command::Plan { file } => {
            let desired = load_desired(&file)?;
            let plan = ctx.reconciler.plan(&desired).await?;
            ctx.print(&PlanReport::new(&desired.instance_arn, &plan))?;
        }
        Command::Apply { file } => {
            let desired = load_desired(&file)?;
            let outcome = ctx.reconciler.apply(&desired).await?;
            match &outcome {
                ApplyOutcome::Created(_) => eprintln!("Created"),
                ApplyOutcome::Updated(_) => eprintln!("Updated"),
                ApplyOutcome::Unchanged(_) => eprintln!("No changes"),
            }
            ctx.track(outcome.configuration())?;
            ctx.print_observed(outcome.configuration())?;
        }
        Command::Create { file } => {
            let desired = load_desired(&file)?;
            let observed = ctx.reconciler.create(&desired).await?;
            ctx.track(&observed)?;
            ctx.print_observed(&observed)?;
        }
        Command::Update { file } => {
            let desired = load_desired(&file)?;
            let outcome = ctx.reconciler.update(&desired).await?;
            if let UpdateOutcome::Unchanged(_) = outcome {
                eprintln!("No changes");
            }
            ctx.track(outcome.configuration())?;
            ctx.print_observed(outcome.configuration())?;
        }
        Command::Read { instance_arn } => {
            let arn = InstanceArn::parse(&instance_arn)?;
            match ctx.reconciler.read(&arn).await? {
                Observation::Present(observed) => {
                    ctx.track(&observed)?;
                    ctx.print_observed(&observed)?;
                }
                Observation::Absent => {
                    ctx.untrack(&arn)?;
                    eprintln!("No configuration attached to {}", arn);
                }
            }
        }
        Command::Refresh => {
            let arns = ctx
                .state
                .arns()
                .map(InstanceArn::parse)
                .collect::<Result<Vec<_>, _>>()?;
            let results = ctx.reconciler.refresh_all(&arns).await;

            let mut reports = Vec::with_capacity(results.len());
            let mut failed = false;
            for (arn, result) in results {
                let outcome = match result {
                    Ok(Observation::Present(observed)) => {
                        ctx.state.track(&observed);
                        "in sync".to_string()
                    }
                    Ok(Observation::Absent) => {
                        tracing::warn!("{} disappeared, no longer tracked", arn);
                        ctx.state.untrack(arn.as_str());
                        "removed".to_string()
                    }
                    Err(e) => {
                        failed = true;
                        e.to_string()
                    }
                };
                reports.push(RefreshReport {
                    instance_arn: arn.to_string(),
                    result: outcome,
                });
            }
            ctx.state.save()?;
            ctx.print(&reports)?;

            if failed {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::Delete { instance_arn } => {
            let arn = InstanceArn::parse(&instance_arn)?;
            match ctx.reconciler.delete(&arn).await? {
                DeleteOutcome::Deleted => eprintln!("Deleted"),
                DeleteOutcome::AlreadyAbsent => eprintln!("Already absent"),
            }
            ctx.untrack(&arn)?;
        }
        Command::Import { instance_arn } => {
            let arn = InstanceArn::parse(&instance_arn)?;
            let observed = ctx.reconciler.import(&arn).await?;
            ctx.track(&observed)?;
            ctx.print_observed(&observed)?;
        }
        Command::Exists { instance_arn } => {
            let arn = InstanceArn::parse(&instance_arn)?;
            let verifier = Verifier::new(ctx.reconciler.clone());
            return Ok(predicate_exit(verifier.exists(&arn).await?));
        }
        Command::Destroyed { instance_arn } => {
            let arn = InstanceArn::parse(&instance_arn)?;
            let verifier = Verifier::new(ctx.reconciler.clone());
            return Ok(predicate_exit(verifier.destroyed(&arn).await?));
        }
        // Handled before a client is built
        Command::Configure { .. } => {}
    }

    Ok(ExitCode::SUCCESS)
}

fn predicate_exit(holds: bool) -> ExitCode {
    println!("{}", holds);
    if holds {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_endpoint_help_mentions_signing_proxy() {
        let command = Args::command();
        let endpoint = command
            .get_arguments()
            .find(|arg| arg.get_id() == "endpoint")
            .unwrap();
        let help = endpoint.get_long_help().unwrap().to_string();
        assert!(help.contains("signing proxy"), "{help}");
        assert!(help.contains("AccessDenied"), "{help}");
    }

    #[test]
    fn test_readonly_blocks_only_writes() {
        let args = Args::try_parse_from([
            "sso-attrs",
            "--readonly",
            "delete",
            "arn:aws:sso:::instance/ssoins-1",
        ])
        .unwrap();
        assert!(args.readonly && args.command.is_write());

        let args =
            Args::try_parse_from(["sso-attrs", "read", "arn:aws:sso:::instance/ssoins-1"]).unwrap();
        assert!(!args.command.is_write());
    }
}
