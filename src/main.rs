//! livepoll - live polls with scannable QR voting targets on the local network
//!
//! Module structure:
//! - `domain/` - Polls, packs and name normalization
//! - `io/` - External interfaces (HTTP, QR rendering, pack files, LAN address)
//! - `services/` - Registry, id generation, voting pipeline, access guard
//! - `infra/` - Configuration

use anyhow::Context;
use clap::Parser;
use livepoll::infra::Config;
use livepoll::io::{
    start_http_server, AppState, FileSystemInitializer, LocalResourceEncoder,
    PackStore, PngQrCodec, StaticAddress, UdpProbeResolver,
};
use livepoll::services::{AccessGuard, DateAndTopicIdGenerator, PollRegistry, PollService, VotingPipeline};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

/// livepoll - QR code polls for the room you are in
#[derive(Parser, Debug)]
#[command(name = "livepoll", version, about)]
struct Args {
    /// Path to TOML configuration file (falls back to CONFIG_FILE, then config/livepoll.toml)
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // RUST_LOG overrides, default INFO
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false)
        .init();

    info!(git_hash = env!("GIT_HASH"), "livepoll starting");

    let args = Args::parse();
    let config = Config::load_from_path(Config::resolve_config_path(args.config.as_deref()));

    info!(
        config_file = %config.config_file(),
        base_dir = %config.base_dir(),
        poll_tmp_dir = %config.poll_tmp_dir().display(),
        bind_address = %config.bind_address(),
        port = %config.port(),
        advertise_address = ?config.advertise_address(),
        "config_loaded"
    );

    let store = PackStore::from_configured(config.base_dir()).context("resolving pack directory")?;
    FileSystemInitializer::new(&store, config.poll_tmp_dir(), config.seed_sample_pack())
        .ensure_base_dir_ready()
        .context("preparing storage directories")?;

    let encoder = Arc::new(match config.advertise_address() {
        Some(addr) => LocalResourceEncoder::new(StaticAddress(addr), config.port()),
        None => LocalResourceEncoder::new(UdpProbeResolver::default(), config.port()),
    });
    // retried on first poll creation
    if let Err(e) = encoder.lan_address() {
        warn!(error = %e, "lan_address_unavailable");
    }

    let codec = Arc::new(PngQrCodec::new(config.module_px(), config.quiet_zone()));
    let pipeline = VotingPipeline::new(encoder, codec, config.poll_tmp_dir());
    let registry = Arc::new(PollRegistry::new(DateAndTopicIdGenerator::new()));
    let service = PollService::new(registry, pipeline, store);
    let state = Arc::new(AppState::new(service, AccessGuard));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("shutdown_signal_received");
        let _ = shutdown_tx.send(true);
    });

    let addr = SocketAddr::new(config.bind_address(), config.port());
    start_http_server(addr, state, shutdown_rx)
        .await
        .map_err(|e| anyhow::anyhow!(e))
        .with_context(|| format!("serving on {addr}"))?;

    info!("livepoll shutdown complete");
    Ok(())
}
