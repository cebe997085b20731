use anyhow::{Context, Result, anyhow};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tether_core::DEFAULT_PORT;
use tether_server::{
    AssetStore, Coordinator, EventSink, JsonLinesOutput, RelayConfig, forward_events,
    read_commands,
};
use tokio::io::BufReader;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Local relay node between hardware and browsers.
///
/// Reads `{key, value}` commands from stdin and writes events to stdout,
/// one JSON object per line.
#[derive(Parser)]
#[command(name = "tether", version)]
struct Args {
    /// Rendezvous port claimed by `open` without a value.
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Serve plaintext even when a complete certificate bundle exists.
    #[arg(long)]
    http: bool,

    #[arg(long, default_value = "./assets")]
    asset_dir: PathBuf,

    /// Registers an extra certificate artifact, e.g. `ChainCA2.crt=/etc/tether/ChainCA2.crt`.
    #[arg(long = "asset", value_name = "NAME=PATH", value_parser = parse_asset)]
    assets: Vec<(String, PathBuf)>,

    #[arg(long, default_value = "./modules")]
    modules_dir: PathBuf,

    /// Host name dialled over TLS; must match the certificate.
    #[arg(long, default_value = "localhost")]
    tls_host: String,

    /// Start the election immediately instead of waiting for `open`.
    #[arg(long)]
    open: bool,

    /// Log filter, overrides RUST_LOG.
    #[arg(long)]
    log: Option<String>,
}

fn parse_asset(raw: &str) -> Result<(String, PathBuf)> {
    let (name, path) = raw
        .split_once('=')
        .ok_or_else(|| anyhow!("expected NAME=PATH, got `{raw}`"))?;
    if name.is_empty() || path.is_empty() {
        return Err(anyhow!("expected NAME=PATH, got `{raw}`"));
    }
    Ok((name.to_owned(), PathBuf::from(path)))
}

fn init_tracing(directive: Option<&str>) {
    let filter = match directive {
        Some(directive) => EnvFilter::new(directive),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tether=info")),
    };

    // stdout carries the control channel
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.log.as_deref());

    let config = RelayConfig {
        port: args.port,
        plaintext_only: args.http,
        asset_dir: args.asset_dir.clone(),
        modules_dir: args.modules_dir,
        tls_host: args.tls_host,
        ..RelayConfig::default()
    };

    let mut assets = AssetStore::new(&config.asset_dir);
    for (name, path) in args.assets {
        assets.register(name, path);
    }

    let (events, event_rx) = EventSink::channel();
    let output = Arc::new(JsonLinesOutput::new(tokio::io::stdout()));
    let forwarder = tokio::spawn(forward_events(event_rx, output));

    let (handle, engine) = Coordinator::spawn(config, assets, events);
    info!("Relay engine ready on port {}", args.port);

    if args.open {
        handle.open(None).await.context("Failed to start election")?;
    }

    let stdin = BufReader::new(tokio::io::stdin());
    tokio::select! {
        result = read_commands(stdin, &handle) => {
            if let Err(e) = result {
                warn!("Control input failed: {}", e);
            }
        }
        _ = shutdown_signal() => info!("Shutdown signal received"),
    }

    handle.close().await.context("Relay engine stopped unexpectedly")?;
    drop(handle);
    engine.await.context("Relay engine task failed")?;
    forwarder.await.context("Event forwarder failed")?;

    info!("Bye");
    // the blocking stdin reader would otherwise keep the runtime alive
    std::process::exit(0)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
