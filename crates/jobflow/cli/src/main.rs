//! Jobflow CLI - command-line interface for workflows and jobs
//!
//! This CLI talks to the jobflow daemon over HTTP to:
//! - Apply workflow and job manifests
//! - List and inspect workflows and the jobs their steps created
//! - Delete resources by name, label selector or manifest

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod client;
mod commands;
mod error;
mod output;

use commands::{apply, delete, get, Context};
use error::CliResult;
use output::print_error;

/// Jobflow CLI application
#[derive(Parser)]
#[command(name = "jobflow")]
#[command(about = "Jobflow - manage workflows and their jobs", long_about = None)]
#[command(version)]
struct Cli {
    /// Jobflow daemon endpoint
    #[arg(
        short,
        long,
        global = true,
        env = "JOBFLOW_ENDPOINT",
        default_value = "http://127.0.0.1:8080"
    )]
    endpoint: String,

    /// Output format (table, json, yaml)
    #[arg(short, long, global = true, default_value = "table")]
    output: output::OutputFormat,

    /// Namespace; listings span all namespaces when omitted, other commands use `default`
    #[arg(short, long, global = true)]
    namespace: Option<String>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand)]
enum Commands {
    /// Create or replace resources from a manifest file
    Apply(apply::ApplyArgs),

    /// Show workflows or jobs
    Get(get::GetArgs),

    /// Delete resources by name, selector or manifest file
    Delete(delete::DeleteArgs),

    /// Delete every resource named in a manifest file or directory
    #[command(name = "deleteall")]
    DeleteAll(delete::DeleteAllArgs),

    /// Check daemon connectivity
    Status,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().without_time())
        .init();

    if let Err(e) = run(cli).await {
        print_error(&e.to_string());
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> CliResult<()> {
    let ctx = Context {
        client: client::JobflowClient::new(&cli.endpoint)?,
        output: cli.output,
        namespace: cli.namespace,
    };

    match cli.command {
        Commands::Apply(args) => apply::execute(args, &ctx).await,
        Commands::Get(args) => get::execute(args, &ctx).await,
        Commands::Delete(args) => delete::execute(args, &ctx).await,
        Commands::DeleteAll(args) => delete::execute_all(args, &ctx).await,
        Commands::Status => {
            let status = ctx.client.health_check().await?;
            output::print_success(&format!("Jobflow daemon is {}", status.status));
            println!("  Version: {}", status.version);
            println!("  Uptime: {}", status.uptime);
            println!("  Queue depth: {}", status.queue_depth);
            println!("  Pending expectations: {}", status.pending_expectations);
            Ok(())
        }
    }
}
