use anyhow::Context;
use clap::Parser;

use edge_dispatch::config::{Config, DEFAULT_CONFIG_PATH};
use edge_dispatch::{logger, server};

/// Edge dispatcher: static assets plus a chat API in front of an inference backend
#[derive(Parser, Debug)]
#[command(name = "edge-dispatch", version, about)]
struct Cli {
    /// Config file path, extension optional
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    /// Override `server.host`
    #[arg(long)]
    host: Option<String>,

    /// Override `server.port`
    #[arg(short, long)]
    port: Option<u16>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut cfg = Config::load_from(&cli.config)
        .with_context(|| format!("failed to load configuration from '{}'", cli.config))?;
    if let Some(host) = cli.host {
        cfg.server.host = host;
    }
    if let Some(port) = cli.port {
        cfg.server.port = port;
    }

    let _log_guard = logger::init(&cfg.logging).context("failed to initialise logging")?;

    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();
    if let Some(workers) = cfg.server.workers {
        runtime_builder.worker_threads(workers);
    }
    let runtime = runtime_builder.build().context("failed to build tokio runtime")?;

    runtime.block_on(server::run(cfg))
}
