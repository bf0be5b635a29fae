mod adapters;
mod api;
mod config;
mod error;
mod http;
mod index;
mod model;
mod registry;
mod runtime;

use anyhow::Context;
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use config::Config;
use index::AggregationIndex;
use runtime::ParserRuntime;

/// Multi-source odds-aggregation engine.
#[derive(Parser, Debug)]
#[command(name = "odds-aggregator")]
struct Cli {
    /// Path to the YAML config file.
    #[arg(long = "config", default_value = "config.yaml")]
    config: String,

    /// Run for a bounded duration, then shut down cleanly. Absent means
    /// run until SIGINT/SIGTERM.
    #[arg(long = "run-for", value_parser = humantime::parse_duration)]
    run_for: Option<Duration>,

    /// Comma-separated parser names to enable, overriding the config
    /// file's `enabled_parsers` list.
    #[arg(long = "parser", env = "BOOKMAKER_PARSER")]
    parser: Option<String>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        error!(error = %e, "fatal startup error");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    info!("starting odds-aggregator");

    let mut config = Config::load(&cli.config).context("loading configuration")?;
    if let Some(names) = cli.parser {
        config.parser.enabled_parsers = names.split(',').map(|s| s.trim().to_string()).collect();
    }

    let registry = registry::build_registry();
    config.validate_enabled_parsers(&registry.names()).context("validating enabled_parsers")?;

    let index = Arc::new(AggregationIndex::new());

    let adapters = config
        .parser
        .enabled_parsers
        .iter()
        .filter_map(|name| {
            let source = config.parser.sources.get(name).cloned().unwrap_or_default();
            let adapter = registry.build(name, &source, index.clone());
            if adapter.is_none() {
                error!(parser = name, "registered name disappeared between validation and build");
            }
            adapter
        })
        .collect::<Vec<_>>();

    info!(count = adapters.len(), "adapters configured");

    let parser_runtime = Arc::new(ParserRuntime::new(
        index.clone(),
        adapters,
        config.parser.interval,
        config.parser.timeout,
    ));

    parser_runtime.warm_start().await;
    parser_runtime.start().await;

    let api_state = Arc::new(api::ApiState {
        index: index.clone(),
        runtime: parser_runtime.clone(),
    });
    let app = api::router(api_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.health.port));
    let listener = tokio::net::TcpListener::bind(addr).await.context("binding http listener")?;
    info!(%addr, "http server listening");

    let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal(cli.run_for));
    server.await.context("http server")?;

    parser_runtime.stop().await;
    info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal(run_for: Option<Duration>) {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let bounded = async {
        match run_for {
            Some(d) => tokio::time::sleep(d).await,
            None => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
        _ = bounded => info!("run-for duration elapsed, shutting down"),
    }
}
