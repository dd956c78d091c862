//! The client binary: `client <host_or_ip> <port>`.
//!
//! Grounded on `crimpz-Audio-P2P/src/main.rs`'s logging setup and
//! shutdown shape (daily rolling log file, Ctrl-C driven shutdown),
//! adapted to the blocking, thread-per-role client runtime instead of
//! a tokio main.

use anyhow::{Context, Result};
use clap::Parser;
use std::net::{SocketAddr, ToSocketAddrs};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use voicemesh::client::ClientRuntime;

#[derive(Debug, Parser)]
#[command(name = "client", about = "Low-latency voice conferencing client")]
struct Args {
    /// Hub hostname or address.
    host_or_ip: String,
    /// Hub port.
    port: u16,
}

fn main() {
    if let Err(e) = run() {
        error!(error = ?e, "client exiting with startup error");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    init_logging()?;
    std::panic::set_hook(Box::new(|panic_info| {
        error!("panic occurred: {}", panic_info);
    }));

    let args = Args::parse();
    let server_addr = resolve(&args.host_or_ip, args.port)?;

    let runtime = ClientRuntime::connect(server_addr).context("connecting to hub")?;
    info!(my_id = runtime.my_id(), "client running, press Ctrl-C to stop");

    let (tx, rx) = std::sync::mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = tx.send(());
    })
    .context("installing Ctrl-C handler")?;

    // Wake up periodically so a hub-initiated disconnect (receiver
    // thread clearing `running`) also ends the wait, not just Ctrl-C.
    loop {
        if rx.recv_timeout(std::time::Duration::from_millis(200)).is_ok() {
            break;
        }
        if !runtime.is_running() {
            info!("hub disconnected us, shutting down");
            break;
        }
    }

    runtime.shutdown();
    info!("client stopped cleanly");
    Ok(())
}

fn resolve(host_or_ip: &str, port: u16) -> Result<SocketAddr> {
    (host_or_ip, port)
        .to_socket_addrs()
        .with_context(|| format!("resolving {host_or_ip}:{port}"))?
        .next()
        .with_context(|| format!("no address found for {host_or_ip}:{port}"))
}

fn init_logging() -> Result<()> {
    let file_appender = tracing_appender::rolling::daily("logs", "client.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    Box::leak(Box::new(guard));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();
    Ok(())
}
