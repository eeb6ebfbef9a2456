//! CLI command definitions for the site agent.
//!
//! Three subcommands: `schedule` runs scheduling cycles over the provenance
//! graph, `watch` runs the claim/submit/poll/finalize loop, and `validate`
//! loads and links the workflow definitions without touching any service.

use std::collections::HashSet;
use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};

use crate::config::{load_configs_from_path, ConfigSet};
use crate::engine::{CromwellClient, ReleaseFetcher};
use crate::lifecycle::JobLifecycle;
use crate::remote::RuntimeClient;
use crate::scheduler::Scheduler;
use crate::settings::Settings;
use crate::state::CheckpointFile;
use crate::store::ApiStore;

/// Site agent for provenance-driven workflow automation.
#[derive(Parser)]
#[command(name = "nmdc-agent")]
#[command(about = "Schedule and run metagenome workflow jobs from provenance records")]
#[command(version)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Run scheduling cycles: discover eligible workflow stages and insert
    /// job records.
    Schedule(ScheduleArgs),

    /// Run the job lifecycle loop: claim, submit, poll, finalize.
    Watch,

    /// Load and link workflow definitions, reporting what this agent would
    /// run.
    Validate(ValidateArgs),
}

/// Arguments for `nmdc-agent schedule`.
#[derive(Parser, Debug)]
pub struct ScheduleArgs {
    /// Run a single cycle and exit.
    #[arg(long)]
    pub once: bool,

    /// Restrict scheduling to these data-generation record ids.
    #[arg(long, value_delimiter = ',')]
    pub ids: Vec<String>,
}

/// Arguments for `nmdc-agent validate`.
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Workflow definition YAML, overriding AGENT_WORKFLOWS_FILE.
    #[arg(long)]
    pub workflows: Option<String>,
}

/// Parse CLI arguments without running a command.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Parse arguments and execute the command.
pub async fn run() -> anyhow::Result<()> {
    run_with_cli(parse_cli()).await
}

/// Execute the parsed command.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Schedule(args) => run_schedule_command(args).await?,
        Commands::Watch => run_watch_command().await?,
        Commands::Validate(args) => run_validate_command(args)?,
    }
    Ok(())
}

fn load_workflow_set(settings: &Settings) -> anyhow::Result<ConfigSet> {
    let configs = load_configs_from_path(&settings.workflows_file)?;
    info!(
        path = %settings.workflows_file.display(),
        workflows = configs.iter().count(),
        "Loaded workflow definitions"
    );
    Ok(configs)
}

async fn run_schedule_command(args: ScheduleArgs) -> anyhow::Result<()> {
    let settings = Settings::from_env()?;
    let configs = load_workflow_set(&settings)?;

    let runtime = Arc::new(RuntimeClient::new(
        &settings.api_base,
        &settings.client_id,
        &settings.client_secret,
        &settings.site_id,
    ));
    let store = Arc::new(ApiStore::new(runtime.clone()));
    let mut scheduler = Scheduler::new(store, runtime, configs);

    let allowlist: Option<HashSet<String>> = if args.ids.is_empty() {
        None
    } else {
        Some(args.ids.iter().cloned().collect())
    };

    loop {
        match scheduler.cycle(allowlist.as_ref()).await {
            Ok(created) => info!(created = created.len(), "Scheduling cycle complete"),
            Err(err) => warn!(error = %err, "Scheduling cycle failed"),
        }
        if args.once {
            break;
        }
        tokio::time::sleep(settings.poll_interval).await;
    }
    Ok(())
}

async fn run_watch_command() -> anyhow::Result<()> {
    let settings = Settings::from_env()?;
    let configs = load_workflow_set(&settings)?;

    let runtime = Arc::new(RuntimeClient::new(
        &settings.api_base,
        &settings.client_id,
        &settings.client_secret,
        &settings.site_id,
    ));
    let store = Arc::new(ApiStore::new(runtime.clone()));
    let engine = Arc::new(CromwellClient::new(&settings.engine_url));
    let assets = Arc::new(ReleaseFetcher::new());

    let allowed: HashSet<String> = configs
        .execution_configs()
        .iter()
        .map(|c| c.workflow_id())
        .collect();

    let mut lifecycle = JobLifecycle::new(
        store,
        runtime,
        engine,
        assets,
        &settings.site_id,
        allowed,
        &settings.data_dir,
        &settings.data_url_base,
        CheckpointFile::new(&settings.state_file),
    );
    lifecycle.run(settings.poll_interval).await?;
    Ok(())
}

fn run_validate_command(args: ValidateArgs) -> anyhow::Result<()> {
    let path = match args.workflows {
        Some(path) => path.into(),
        None => Settings::from_env()?.workflows_file,
    };
    let configs = load_configs_from_path(&path)?;

    for config in configs.iter() {
        let kind = if config.is_generation() {
            "generation"
        } else {
            "execution"
        };
        info!(
            workflow = %config.name,
            kind = kind,
            enabled = config.enabled,
            version = %config.version,
            predecessors = ?config.predecessors,
            "Workflow definition linked"
        );
    }
    println!(
        "{} workflow definitions loaded and linked from {}",
        configs.iter().count(),
        path.display()
    );
    Ok(())
}
