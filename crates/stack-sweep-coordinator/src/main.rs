//! stack-sweep: dependency-ordered cleanup of OpenStack resources
//!
//! Finds resources whose name or description matches a pattern, either by
//! listing the cloud or from a `kind|name|id` resource list, then deletes
//! them stage by stage and verifies each deletion.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use comfy_table::{Cell, ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use stack_sweep_common::{CloudClient, OutcomeKind};
use stack_sweep_common::defaults::{
    DEFAULT_CONCURRENCY, DEFAULT_FILTER, DEFAULT_HTTP_TIMEOUT_SECS, DEFAULT_POLL_INTERVAL_SECS,
    DEFAULT_VERIFY_TIMEOUT_SECS,
};
use stack_sweep_coordinator::config::{ExecutionConfig, FilterConfig, SourceConfig, SweepConfig};
use stack_sweep_coordinator::openstack::{Endpoints, OpenStackClient, OpenStackContext};
use stack_sweep_coordinator::orchestrator::{Plan, Preview, RunSignals, RunSummary, Sweeper};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "stack-sweep")]
#[command(about = "Dependency-ordered cleanup of OpenStack resources")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Which resources to consider
#[derive(clap::Args, Debug)]
struct SourceArgs {
    /// Regular expression searched in resource names, then descriptions
    #[arg(short, long, default_value = DEFAULT_FILTER)]
    filter: String,

    /// Resource list file with `kind|name|id` lines (default: list the cloud)
    #[arg(long)]
    file: Option<PathBuf>,

    /// Fail on malformed resource list lines instead of skipping them
    #[arg(long)]
    strict: bool,
}

/// Token and service endpoints, usually taken from the environment
#[derive(clap::Args, Debug)]
struct CloudArgs {
    /// Pre-issued Keystone token
    #[arg(long, env = "OS_AUTH_TOKEN", hide_env_values = true)]
    token: Option<String>,

    #[arg(long, env = "OS_COMPUTE_URL")]
    compute_url: Option<String>,

    #[arg(long, env = "OS_VOLUME_URL")]
    volume_url: Option<String>,

    #[arg(long, env = "OS_IMAGE_URL")]
    image_url: Option<String>,

    #[arg(long, env = "OS_NETWORK_URL")]
    network_url: Option<String>,

    #[arg(long, env = "OS_LOADBALANCER_URL")]
    load_balancer_url: Option<String>,

    #[arg(long, env = "OS_ORCHESTRATION_URL")]
    orchestration_url: Option<String>,

    #[arg(long, env = "OS_DNS_URL")]
    dns_url: Option<String>,

    /// HTTP request timeout in seconds
    #[arg(long, default_value_t = DEFAULT_HTTP_TIMEOUT_SECS)]
    http_timeout: u64,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(clap::Args, Debug)]
struct OutputArgs {
    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,

    /// Also write the run summary as JSON to this file
    #[arg(short, long)]
    output: Option<PathBuf>,
}

/// Arguments for the run command (boxed to keep the enum small)
#[derive(clap::Args, Debug)]
struct RunArgs {
    #[command(flatten)]
    source: SourceArgs,

    #[command(flatten)]
    cloud: CloudArgs,

    #[command(flatten)]
    output: OutputArgs,

    /// Report what would be deleted without deleting anything
    #[arg(long)]
    dry_run: bool,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    yes: bool,

    /// Seconds to wait for each resource to disappear
    #[arg(long, default_value_t = DEFAULT_VERIFY_TIMEOUT_SECS)]
    timeout: u64,

    /// Seconds between existence checks
    #[arg(long, default_value_t = DEFAULT_POLL_INTERVAL_SECS)]
    poll_interval: u64,

    /// Resources deleted at once within a stage
    #[arg(long, default_value_t = DEFAULT_CONCURRENCY)]
    concurrency: usize,

    /// Do not wait for deletions to complete
    #[arg(long)]
    skip_verify: bool,
}

impl RunArgs {
    fn sweep_config(&self) -> SweepConfig {
        SweepConfig {
            filter: self.source.filter_config(),
            source: self.source.source_config(),
            execution: ExecutionConfig {
                dry_run: self.dry_run,
                verify: !self.skip_verify,
                verify_timeout: Duration::from_secs(self.timeout),
                poll_interval: Duration::from_secs(self.poll_interval),
                concurrency: self.concurrency,
            },
        }
    }
}

impl SourceArgs {
    fn filter_config(&self) -> FilterConfig {
        FilterConfig {
            pattern: self.filter.clone(),
        }
    }

    fn source_config(&self) -> SourceConfig {
        SourceConfig {
            file: self.file.clone(),
            strict: self.strict,
        }
    }
}

impl CloudArgs {
    fn endpoints(&self) -> Endpoints {
        Endpoints {
            compute: self.compute_url.clone(),
            volume: self.volume_url.clone(),
            image: self.image_url.clone(),
            network: self.network_url.clone(),
            load_balancer: self.load_balancer_url.clone(),
            orchestration: self.orchestration_url.clone(),
            dns: self.dns_url.clone(),
        }
    }

    /// Build the cloud client
    ///
    /// Without a token the client is only acceptable when nothing will be
    /// sent, i.e. a dry run or scan over a resource list.
    fn client(&self, needs_cloud: bool) -> Result<Arc<dyn CloudClient>> {
        let token = match (&self.token, needs_cloud) {
            (Some(token), _) => token.as_str(),
            (None, false) => "",
            (None, true) => bail!("No OpenStack token: set OS_AUTH_TOKEN or pass --token"),
        };
        let endpoints = self.endpoints();
        if needs_cloud && endpoints.is_empty() {
            bail!("No OpenStack endpoints configured: set OS_COMPUTE_URL, OS_NETWORK_URL, ...");
        }

        let ctx = OpenStackContext::new(
            token,
            endpoints,
            Duration::from_secs(self.http_timeout),
        )?;
        Ok(Arc::new(OpenStackClient::from_context(&ctx)))
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show what a run would delete, in deletion order
    Scan {
        #[command(flatten)]
        source: SourceArgs,

        #[command(flatten)]
        cloud: CloudArgs,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },

    /// Delete matching resources and verify they are gone
    Run(Box<RunArgs>),
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        print_error(&e);
        std::process::exit(1);
    }
}

/// Print error in a user-friendly way
fn print_error(e: &anyhow::Error) {
    let mut stderr = std::io::stderr();

    let _ = writeln!(stderr, "\n\x1b[1;31mError:\x1b[0m {e}");

    let mut source = e.source();
    while let Some(cause) = source {
        let _ = writeln!(stderr, "  \x1b[33mCaused by:\x1b[0m {cause}");
        source = cause.source();
    }
}

async fn run() -> Result<()> {
    let args = Args::parse();

    let level = if args.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .init();

    match args.command {
        Command::Scan {
            source,
            cloud,
            format,
        } => handle_scan(source, cloud, format).await,
        Command::Run(run_args) => handle_run(*run_args).await,
    }
}

/// Handle the scan command
async fn handle_scan(source: SourceArgs, cloud: CloudArgs, format: OutputFormat) -> Result<()> {
    let config = SweepConfig {
        filter: source.filter_config(),
        source: source.source_config(),
        execution: ExecutionConfig {
            dry_run: true,
            ..Default::default()
        },
    };
    let client = cloud.client(!config.is_file_mode())?;
    let sweeper = Sweeper::new(config, client)?;

    let Preview { plan, summary } = sweeper.preview().await?;

    match format {
        OutputFormat::Json => {
            let stages: Vec<_> = plan
                .stages()
                .iter()
                .map(|stage| {
                    serde_json::json!({
                        "stage": stage.stage,
                        "micro": stage.micro,
                        "kinds": stage.kinds_label(),
                        "resources": stage.members,
                    })
                })
                .collect();
            let json = serde_json::json!({
                "pattern": sweeper.config().pattern(),
                "stages": stages,
                "skipped_domains": summary.skipped_domains(),
                "warnings": summary.warnings(),
                "not_matched": summary.total(OutcomeKind::SkippedNoMatch),
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        OutputFormat::Table => {
            if plan.is_empty() {
                println!("No resources match '{}'.", sweeper.config().pattern());
            } else {
                println!("{}", plan_table(&plan));
                println!("\nTotal: {} resources", plan.resource_count());
            }
            for skipped in summary.skipped_domains() {
                println!("Skipped {}: {}", skipped.domain, skipped.reason);
            }
            for warning in summary.warnings() {
                println!("Warning: {warning}");
            }
        }
    }

    Ok(())
}

/// Handle the run command
async fn handle_run(args: RunArgs) -> Result<()> {
    let config = args.sweep_config();
    let needs_cloud = !config.is_file_mode() || !config.dry_run();
    let client = args.cloud.client(needs_cloud)?;
    let sweeper = Sweeper::new(config, client)?;

    // The confirmed plan is the one executed; the cloud is not listed again
    let preview = sweeper.preview().await?;
    let live = !sweeper.config().is_file_mode();
    if live && !sweeper.config().dry_run() && !args.yes {
        if preview.plan.is_empty() {
            println!("No resources match '{}'.", sweeper.config().pattern());
            return Ok(());
        }
        println!("{}", plan_table(&preview.plan));
        if !confirm(preview.plan.resource_count())? {
            println!("Aborted.");
            return Ok(());
        }
    }

    let signals = RunSignals::new();
    let handler = signals.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted: finishing in-flight deletions (Ctrl-C again to stop waiting)");
            handler.stop();
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted again: abandoning verification");
                handler.abort();
            }
        }
    });

    info!(
        pattern = %sweeper.config().pattern(),
        dry_run = sweeper.config().dry_run(),
        concurrency = sweeper.config().execution.concurrency,
        "Starting stack-sweep run"
    );
    let summary = sweeper.execute(preview, &signals).await;

    report(&summary, &args.output)?;

    let failures = summary.failures().count();
    if failures > 0 {
        bail!("{failures} resource(s) were not cleaned up");
    }
    Ok(())
}

fn report(summary: &RunSummary, output: &OutputArgs) -> Result<()> {
    match output.format {
        OutputFormat::Table => summary.print(),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(summary)?),
    }
    if let Some(path) = &output.output {
        summary.write_json(path)?;
    }
    Ok(())
}

/// Deletion order, one row per resource
fn plan_table(plan: &Plan) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Stage"),
            Cell::new("Kind"),
            Cell::new("Name"),
            Cell::new("ID"),
        ]);

    for (position, stage) in plan.stages().iter().enumerate() {
        for member in &stage.members {
            table.add_row(vec![
                Cell::new(position + 1),
                Cell::new(member.kind().label()),
                Cell::new(member.display_name()),
                Cell::new(member.id()),
            ]);
        }
    }

    table
}

/// Ask the operator before deleting anything
fn confirm(count: usize) -> Result<bool> {
    print!("\nDelete {count} resource(s)? [y/N] ");
    std::io::stdout().flush().context("Failed to flush stdout")?;

    let mut answer = String::new();
    std::io::stdin()
        .read_line(&mut answer)
        .context("Failed to read confirmation")?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes" | "YES"))
}
