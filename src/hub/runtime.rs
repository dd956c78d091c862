//! Hub process lifecycle: acceptor thread, broadcaster thread, one
//! worker thread per peer.
//!
//! Grounded on `original_source/src/server.c`'s `main`, which binds,
//! spawns the worker pool, and on shutdown closes the listening socket
//! and tears down every client. `crimpz-Audio-P2P`'s `AppCore` plays
//! the same "own every handle, provide one shutdown method" role for
//! its tokio tasks; this is the blocking-thread analogue.

use crate::hub::acceptor;
use crate::hub::broadcaster::{self, BroadcastSender};
use crate::hub::peer_table::PeerTable;
use socket2::{Domain, Socket, Type};
use std::io;
use std::net::{SocketAddr, TcpListener};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::info;

/// Binds the listening socket with `SO_REUSEADDR`, which
/// `std::net::TcpListener::bind` doesn't expose.
fn bind_listener(bind_addr: SocketAddr) -> io::Result<TcpListener> {
    let domain = if bind_addr.is_ipv6() { Domain::IPV6 } else { Domain::IPV4 };
    let socket = Socket::new(domain, Type::STREAM, None)?;
    socket.set_reuse_address(true)?;
    socket.bind(&bind_addr.into())?;
    socket.listen(128)?;
    Ok(socket.into())
}

pub struct HubRuntime {
    local_addr: SocketAddr,
    peer_table: Arc<PeerTable>,
    broadcast_tx: Option<BroadcastSender>,
    running: Arc<AtomicBool>,
    acceptor_handle: Option<JoinHandle<()>>,
    broadcaster_handle: Option<JoinHandle<()>>,
}

impl HubRuntime {
    /// Binds the listening socket and starts the acceptor and
    /// broadcaster threads. Per-peer worker threads are spawned later,
    /// one per accepted connection.
    pub fn start(bind_addr: SocketAddr, max_peers: usize) -> io::Result<Self> {
        let listener = bind_listener(bind_addr)?;
        let local_addr = listener.local_addr()?;
        info!(%local_addr, "hub listening");

        let peer_table = Arc::new(PeerTable::new(max_peers));
        let (broadcast_tx, broadcast_rx) = crossbeam_channel::unbounded();
        let running = Arc::new(AtomicBool::new(true));

        let broadcaster_handle = {
            let table = Arc::clone(&peer_table);
            std::thread::spawn(move || broadcaster::run(broadcast_rx, table))
        };

        let acceptor_handle = {
            let table = Arc::clone(&peer_table);
            let tx = broadcast_tx.clone();
            let running = Arc::clone(&running);
            std::thread::spawn(move || acceptor::run(listener, tx, table, running))
        };

        Ok(Self {
            local_addr,
            peer_table,
            broadcast_tx: Some(broadcast_tx),
            running,
            acceptor_handle: Some(acceptor_handle),
            broadcaster_handle: Some(broadcaster_handle),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn live_peer_count(&self) -> usize {
        self.peer_table.live_count()
    }

    /// Stops accepting new connections, force-closes every live peer,
    /// closes the broadcast queue, and waits for both owned threads to
    /// exit. Per-peer worker threads are not joined here: each frees
    /// its own slot and exits on its own once its socket is shut down.
    pub fn shutdown(mut self) {
        info!("hub shutting down");
        self.running.store(false, Ordering::Release);
        self.peer_table.shutdown_all();

        if let Some(handle) = self.acceptor_handle.take() {
            let _ = handle.join();
        }

        // Dropping our sender clone lets the broadcaster drain whatever
        // is queued and then return once every handle (including any
        // still-exiting per-peer worker threads) is gone.
        drop(self.broadcast_tx.take());
        if let Some(handle) = self.broadcaster_handle.take() {
            let _ = handle.join();
        }
    }
}
