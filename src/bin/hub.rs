//! The relay hub binary: `hub <listen_ip> <port>`.
//!
//! Grounded on `crimpz-Audio-P2P/src/main.rs`'s logging setup (daily
//! rolling file, `tracing-subscriber` registry) and panic hook, and its
//! `tokio::signal::ctrl_c`-driven shutdown — here awaited on a plain
//! blocking thread since the hub has no async runtime.

use anyhow::{Context, Result};
use clap::Parser;
use std::net::{IpAddr, SocketAddr};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use voicemesh::constants::MAX_PEERS;
use voicemesh::hub::HubRuntime;

#[derive(Debug, Parser)]
#[command(name = "hub", about = "Low-latency voice conferencing relay hub")]
struct Args {
    /// Address to listen on.
    listen_ip: IpAddr,
    /// Port to listen on.
    port: u16,
}

fn main() {
    if let Err(e) = run() {
        error!(error = ?e, "hub exiting with startup error");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    init_logging()?;
    std::panic::set_hook(Box::new(|panic_info| {
        error!("panic occurred: {}", panic_info);
    }));

    let args = Args::parse();
    let bind_addr = SocketAddr::new(args.listen_ip, args.port);

    let runtime = HubRuntime::start(bind_addr, MAX_PEERS).context("starting hub")?;

    info!("hub running, press Ctrl-C to stop");
    ctrlc_blocking()?;

    runtime.shutdown();
    info!("hub stopped cleanly");
    Ok(())
}

fn init_logging() -> Result<()> {
    let file_appender = tracing_appender::rolling::daily("logs", "hub.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    // Leak the guard: it must outlive the process for buffered writes
    // to flush, and the hub's logging setup runs exactly once.
    Box::leak(Box::new(guard));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();
    Ok(())
}

fn ctrlc_blocking() -> Result<()> {
    let (tx, rx) = std::sync::mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = tx.send(());
    })
    .context("installing Ctrl-C handler")?;
    rx.recv().context("Ctrl-C channel closed unexpectedly")?;
    Ok(())
}
