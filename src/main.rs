// Async HTTP boilerplate based on
// https://github.com/daboross/futures-example-2019/

#![recursion_limit = "128"]

pub use anyhow::Result;
use anyhow::Context;
use clap::{Parser, Subcommand};
use metrics::describe_counter;
use opinionated_metrics::Mode;
use std::sync::Arc;
use tracing::{debug, info, info_span, warn};
use tracing_subscriber::{
    fmt::{format::FmtSpan, Subscriber},
    prelude::*,
    EnvFilter,
};

use realty_pipeline::config::Config;
use realty_pipeline::enrichment::geocoder;
use realty_pipeline::errors::display_causes_and_backtrace;
use realty_pipeline::pipeline::IngestContext;
use realty_pipeline::queue::consumer;
use realty_pipeline::store::relational::RelationalStore;
use realty_pipeline::store::search_index::SearchIndex;

#[cfg(all(feature = "jemallocator", not(target_env = "msvc")))]
#[global_allocator]
static GLOBAL: jemallocator::Jemalloc = jemallocator::Jemalloc;

/// Our command-line arguments.
#[derive(Debug, Parser)]
#[command(author, version, about = "ingest and serve real-estate listings")]
struct Opt {
    /// Command to run.
    #[command(subcommand)]
    cmd: Command,
}

/// Subcommands for realty-pipeline.
#[derive(Debug, Subcommand)]
enum Command {
    /// Consume the intake queue and run the ingestion pipeline (C1-C4).
    Worker {
        /// Number of independent consumer loops to run against the intake
        /// queue. Defaults to `WORKER_CONCURRENCY`.
        #[arg(long, env = "WORKER_CONCURRENCY")]
        concurrency: Option<usize>,
    },
    /// Serve the query API (C5).
    Serve,
    /// Run pending relational-store migrations and exit.
    Migrate,
}

// Our main entrypoint. We rely on the fact that `anyhow::Error` has a `Debug`
// implementation that will print a nice friendly error if we return from
// `main` with an error.
#[tokio::main]
async fn main() -> Result<()> {
    // Configure tracing.
    let filter = EnvFilter::from_default_env();
    Subscriber::builder()
        .with_writer(std::io::stderr)
        .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE)
        .with_env_filter(filter)
        .finish()
        .init();
    let _span = info_span!("realty-pipeline").entered();
    debug!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));

    let opt = Opt::parse();
    let result = run(opt.cmd).await;
    if let Err(err) = &result {
        display_causes_and_backtrace(err);
    }
    result
}

async fn run(cmd: Command) -> Result<()> {
    let config = Config::from_env().context("failed to load configuration")?;

    let metrics_mode = match cmd {
        Command::Serve => Mode::Server,
        Command::Worker { .. } | Command::Migrate => Mode::Cli,
    };
    let metrics_handle = Arc::new(opinionated_metrics::Builder::new(metrics_mode).install()?);
    describe_counter!(
        "realty_pipeline.ingest.errors",
        "Ingest failures, by component and cause"
    );

    let relational = RelationalStore::connect(&config.database_url).await?;

    match cmd {
        Command::Migrate => {
            relational.migrate().await?;
            info!("migrations applied");
        }
        Command::Worker { concurrency } => {
            relational.migrate().await?;
            let search_index =
                SearchIndex::connect(&config.elasticsearch_url, &config.elasticsearch_index)?;
            search_index.ensure_index().await?;

            let ctx = Arc::new(IngestContext {
                geocoder: geocoder::build(&config.geocoder),
                relational,
                search_index,
                dedup_thresholds: config.dedup_thresholds,
            });

            let shutdown = tokio_util::sync::CancellationToken::new();
            let shutdown_signal = shutdown.clone();
            tokio::spawn(async move {
                wait_for_shutdown_signal().await;
                warn!("shutdown signal received, draining in-flight messages");
                shutdown_signal.cancel();
            });

            consumer::run(
                &config.amqp_url,
                &config.amqp_queue_name,
                concurrency.unwrap_or(config.worker_concurrency),
                ctx,
                shutdown,
            )
            .await?;
        }
        Command::Serve => {
            relational.migrate().await?;
            let search_index =
                SearchIndex::connect(&config.elasticsearch_url, &config.elasticsearch_index)?;
            search_index.ensure_index().await?;

            let state = Arc::new(realty_pipeline::api::state::AppState::from_config(&config).await?);
            let router = realty_pipeline::api::routes::build(state, Arc::clone(&metrics_handle));

            realty_pipeline::api::routes::serve(
                &config.listen_address,
                router,
                wait_for_shutdown_signal(),
            )
            .await?;
        }
    }

    if let Err(err) = metrics_handle.report().await {
        warn!("could not report metrics: {:?}", err);
    }

    Ok(())
}

async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm =
        signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
}
