//! perfstore - operator CLI for the performance result store
//!
//! Talks to Neo4j with the same connector the services use and prints JSON.

use anyhow::{Context, Result};
use chrono::Duration;
use clap::{Args, Parser, Subcommand};
use perf_store::model::TimeRange;
use perf_store::query::PerformanceOptions;
use perf_store::{AppState, Config};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "perfstore")]
#[command(about = "Query and maintain CI performance results")]
struct Cli {
    /// Path to config.yaml (default: ./config.yaml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List results matching a filter
    Find(FindArgs),

    /// Show a result and its descendants
    Show {
        id: String,

        /// Parent/child hops to follow (0 = only the result itself)
        #[arg(short, long, default_value = "0")]
        depth: usize,

        /// Only include descendants carrying one of these tags
        #[arg(short, long)]
        tag: Vec<String>,
    },

    /// Remove a result and all of its descendants
    Remove { id: String },

    /// Enqueue signal processing recalculation and run it to completion
    Schedule,
}

#[derive(Args)]
struct FindArgs {
    #[arg(long)]
    task_id: Option<String>,

    #[arg(long)]
    task_name: Option<String>,

    #[arg(long)]
    version: Option<String>,

    #[arg(long)]
    variant: Option<String>,

    /// Match results carrying any of these tags
    #[arg(short, long)]
    tag: Vec<String>,

    /// Only results created in the last N hours
    #[arg(long)]
    since_hours: Option<i64>,

    #[arg(short, long)]
    limit: Option<usize>,

    #[arg(short, long, default_value = "0")]
    skip: usize,
}

impl TryFrom<FindArgs> for PerformanceOptions {
    type Error = anyhow::Error;

    fn try_from(args: FindArgs) -> Result<Self> {
        let interval = match args.since_hours {
            Some(hours) => {
                let duration = Duration::try_hours(hours)
                    .with_context(|| format!("--since-hours {} is out of range", hours))?;
                Some(TimeRange::lookback(None, duration)?)
            }
            None => None,
        };
        Ok(Self {
            task_id: args.task_id,
            task_name: args.task_name,
            version: args.version,
            variant: args.variant,
            tags: args.tag,
            interval,
            limit: args.limit,
            skip: args.skip,
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,perf_store=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = Config::from_yaml_and_env(cli.config.as_deref())?;
    let state = AppState::new(config).await?;
    tracing::info!("Connected to Neo4j");

    // Ctrl-C cancels the in-flight operation
    let ctx = CancellationToken::new();
    let on_interrupt = ctx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    match cli.command {
        Commands::Find(args) => {
            let opts = PerformanceOptions::try_from(args)?;
            let results = state.connector.find_performance_results(&ctx, &opts).await?;
            print_json(&results)
        }
        Commands::Show { id, depth, tag } => {
            let results = state
                .connector
                .find_performance_result_with_children(&ctx, &id, depth, &tag)
                .await?;
            print_json(&results)
        }
        Commands::Remove { id } => {
            let removed = state
                .connector
                .remove_performance_result_by_id(&ctx, &id)
                .await?;
            print_json(&serde_json::json!({ "id": id, "removed": removed }))
        }
        Commands::Schedule => run_schedule(&state, &ctx).await,
    }
}

async fn run_schedule(state: &AppState, ctx: &CancellationToken) -> Result<()> {
    state.start_queue().await?;
    state
        .connector
        .schedule_signal_processing_recalculate_jobs(ctx)
        .await?;

    tokio::select! {
        _ = state.queue.wait_idle() => {}
        _ = ctx.cancelled() => tracing::warn!("Interrupted before the queue drained"),
    }

    let stats = perf_store::queue::JobQueue::stats(state.queue.as_ref());
    tracing::info!(
        "Recalculation finished: {} jobs, {} completed, {} failed",
        stats.total,
        stats.completed,
        stats.failed
    );
    print_json(&stats)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
