use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use cluster_telemetry::{
    api::{ApiConfig, ApiState, spawn_api_server},
    collector::{Collaborators, Collector},
    config::{Config, read_config_file},
    transport::{HttpActorDirectory, HttpStubFactory, LocalBus},
    util::{get_api_addr, get_api_port, get_api_token},
};
use tracing::{info, level_filters::LevelFilter, trace};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_ACTOR_DIRECTORY_URL: &str = "http://127.0.0.1:8265";

#[derive(Debug, Clone, Parser)]
struct Args {
    /// Config file
    #[arg(short)]
    file: Option<String>,

    /// Log everything down to TRACE
    #[arg(short, long)]
    verbose: bool,
}

fn init(verbose: bool) {
    let level = if verbose {
        LevelFilter::TRACE
    } else {
        LevelFilter::INFO
    };
    let filter = filter::Targets::new().with_targets(vec![
        ("cluster_telemetry", level),
        ("telemetry_hub", level),
    ]);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();
    init(args.verbose);
    trace!("started with args: {args:?}");

    let config = match &args.file {
        Some(file) => read_config_file(file)?,
        None => Config::default(),
    };

    let directory_url = config
        .actor_directory
        .as_ref()
        .map_or(DEFAULT_ACTOR_DIRECTORY_URL, |d| d.url.as_str());
    let bus = Arc::new(LocalBus::default());

    let collector = Collector::spawn(
        &config.collector,
        config.nodes.as_deref().unwrap_or_default(),
        Collaborators {
            stubs: Arc::new(HttpStubFactory::new()?),
            actor_directory: Arc::new(HttpActorDirectory::new(directory_url)?),
            bus: bus.clone(),
        },
    )
    .await?;

    let api_config = api_config(&config);
    let addr = spawn_api_server(api_config, ApiState::new(collector.query(), bus)).await?;
    info!("serving queries on http://{addr}/api/v1");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;
    info!("received ctrl-c, shutting down");

    collector.shutdown().await;
    Ok(())
}

/// Values from the config file win over the environment
fn api_config(config: &Config) -> ApiConfig {
    let settings = config.api.as_ref();

    ApiConfig {
        bind_addr: settings
            .and_then(|s| s.bind)
            .unwrap_or_else(|| SocketAddr::from((get_api_addr(), get_api_port()))),
        auth_token: settings.and_then(|s| s.token.clone()).or_else(get_api_token),
        ..Default::default()
    }
}
