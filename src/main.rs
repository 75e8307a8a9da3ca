use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use healthtree::duration::{format_duration, parse_duration};
use healthtree::server::{serve, DEFAULT_LISTEN_ADDR};
use healthtree::{Aggregator, AggregatorConfig, Output, Publisher};

#[derive(Parser, Debug)]
#[command(name = "healthtree")]
#[command(about = "Aggregate flat status reports into a hierarchical health tree")]
struct Args {
    /// Analyzer configuration file (TOML); HEALTHTREE_* variables override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address producers connect to (host:port)
    #[arg(short, long, default_value = DEFAULT_LISTEN_ADDR)]
    listen: String,

    /// Publish interval (e.g., "1s", "500ms"); overrides pub_rate
    #[arg(short, long)]
    interval: Option<String>,

    /// Write each publication to this JSON file
    #[arg(long)]
    output_file: Option<PathBuf>,

    /// Send each publication to this TCP endpoint (host:port)
    #[arg(long)]
    output_tcp: Option<String>,

    /// Print each publication as a JSON line (default when no other output is set)
    #[arg(long)]
    stdout: bool,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr; stdout may carry publications.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = match &args.config {
        Some(path) => AggregatorConfig::load(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => AggregatorConfig::default(),
    };
    let aggregator = Arc::new(Aggregator::new(config).context("Invalid analyzer configuration")?);

    let mut builder = Publisher::builder(aggregator.clone());
    if let Some(interval) = &args.interval {
        builder = builder.interval(parse_duration(interval)?);
    }
    let mut has_output = false;
    if let Some(path) = &args.output_file {
        builder = builder.output(Output::file(path));
        has_output = true;
    }
    if let Some(addr) = &args.output_tcp {
        builder = builder.output(Output::tcp(addr));
        has_output = true;
    }
    if args.stdout || !has_output {
        builder = builder.output(Output::Stdout);
    }
    let publisher = builder.build();

    let listener = TcpListener::bind(&args.listen)
        .await
        .with_context(|| format!("Failed to listen on {}", args.listen))?;

    info!(
        root = %aggregator.root_path(),
        interval = %format_duration(publisher.interval()),
        "healthtree started"
    );
    let handle = publisher.start();

    tokio::select! {
        result = serve(listener, aggregator.clone()) => {
            result.context("Ingestion server failed")?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, shutting down");
        }
    }

    aggregator.shutdown();
    handle.shutdown().await;
    Ok(())
}
