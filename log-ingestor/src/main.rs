mod console;
mod error;
mod ingest;
mod invariants;
mod logging;
mod metrics_server;
mod models;
mod parser;
mod prometheus;
mod query;
mod scheduler;
mod store;

use crate::prometheus::PromMetrics;
use clap::{Parser, Subcommand};
use ingest::{Ingestor, StoreRetry};
use query::QueryService;
use scheduler::Schedule;
use std::{error::Error, io, path::PathBuf, sync::Arc, time::Duration};
use store::SqliteStore;
use tokio::try_join;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Parser, Debug)]
#[command(version, about = "Ingests combined-format access logs into SQLite", long_about = None)]
struct Args {
    /// Access log ingested by every run.
    #[arg(long, default_value = "access.log")]
    log_file: PathBuf,

    /// SQLite database holding ingested records.
    #[arg(long, default_value = "access_logs.db")]
    database: PathBuf,

    #[arg(long, default_value_t = 5, value_parser = clap::value_parser!(u64).range(1..))]
    interval_secs: u64,

    #[arg(long, default_value_t = 8080)]
    port: u16,

    /// Retries for a batch write the store rejected.
    #[arg(long, default_value_t = 3)]
    store_retries: u32,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// Ingest the log file once right away, then keep running on schedule.
    Process,
    /// Browse stored records interactively.
    Console {
        /// Print records as JSON lines.
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    logging::init_logging();

    let store = SqliteStore::open(&args.database)?;
    info!(database = %store.path().display(), "store ready");

    if let Some(Command::Console { json }) = args.command {
        let query = QueryService::new(store);
        tokio::task::spawn_blocking(move || {
            console::run(&query, io::stdin().lock(), io::stdout().lock(), json)
        })
        .await??;
        return Ok(());
    }

    let metrics = Arc::new(PromMetrics::new()?);
    let retry = StoreRetry {
        retries: args.store_retries,
        ..StoreRetry::default()
    };
    let ingestor = Arc::new(Ingestor::new(Arc::new(store), metrics.clone(), retry));

    let cancel = CancellationToken::new();
    let metrics_handle = metrics_server::start(metrics, args.port, cancel.clone()).await?;
    spawn_shutdown_listener(cancel.clone());

    if args.command == Some(Command::Process) {
        info!(path = %args.log_file.display(), "one-shot ingestion requested");
        scheduler::run_once(&ingestor, &args.log_file, &cancel).await;
    }

    let scheduler_handle = scheduler::start(
        ingestor,
        Schedule {
            path: args.log_file,
            interval: Duration::from_secs(args.interval_secs),
        },
        cancel,
    );

    try_join!(metrics_handle, scheduler_handle)?;
    Ok(())
}

fn spawn_shutdown_listener(cancel: CancellationToken) {
    tokio::spawn(async move {
        metrics_server::shutdown_signal().await;
        info!("shutdown requested");
        cancel.cancel();
    });
}
