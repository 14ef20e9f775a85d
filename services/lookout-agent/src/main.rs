//! # Lookout Agent
//!
//! Host-resident monitoring daemon

use clap::Parser;
use lookout_agent::{register, Agent, ConfigStore};
use lookout_core::{AgentInfo, HandlerRegistry, BUILD_INFO};
use message_queue::{MessageBus, NatsBus};
use policy_engine::register_builtin;
use reqwest::Client;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, info_span, Instrument};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "lookoutd")]
#[command(about = "Lookout agent - runs monitoring policies on this host")]
#[command(version = lookout_core::VERSION)]
struct Cli {
    /// Address of the master server, including the scheme
    #[arg(long, default_value = "http://localhost:3000")]
    master_addr: String,

    /// Config file path (default: ~/.lookoutd.json)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    run(cli).instrument(info_span!("lookoutd")).await
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    info!("Starting Lookout agent {}", BUILD_INFO);

    let path = match cli.config {
        Some(path) => path,
        None => ConfigStore::default_path()?,
    };
    let store = Arc::new(ConfigStore::load(path)?);
    info!(path = %store.path().display(), uid = %store.uid(), "Config loaded");

    let me = AgentInfo::new(store.uid(), metrics::host_name());
    let registration = register(&Client::new(), &cli.master_addr, &me).await?;

    let bus: Arc<dyn MessageBus> = Arc::new(NatsBus::connect(&registration.nats_url).await?);

    let registry = Arc::new(HandlerRegistry::new());
    register_builtin(&registry)?;

    let mut agent = Agent::boot(store, registry, bus).await?;
    info!(uid = %agent.uid(), "Agent running");

    let interrupted = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal?;
            true
        }
        () = agent.closed() => false,
    };
    agent.shutdown();
    if !interrupted {
        anyhow::bail!("control plane lost its connection to {}", registration.nats_url);
    }
    info!("Interrupted, shut down");
    Ok(())
}
