//! The hub acceptor.
//!
//! Grounded on `original_source/src/server.c`'s accept loop (find free
//! slot, reject at capacity, otherwise register and hand off). Runs as
//! a dedicated thread polling a non-blocking listener so it can notice
//! the shared shutdown flag promptly, rather than racing a concurrent
//! listener close against an in-flight blocking `accept()`.

use crate::codec::send_id_preamble;
use crate::hub::broadcaster::BroadcastSender;
use crate::hub::peer_table::PeerTable;
use std::io::Write;
use std::net::TcpListener;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::warn;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

pub fn run(listener: TcpListener, broadcast_tx: BroadcastSender, peer_table: Arc<PeerTable>, running: Arc<AtomicBool>) {
    listener.set_nonblocking(true).expect("listener must support non-blocking mode");

    while running.load(Ordering::Acquire) {
        match listener.accept() {
            Ok((stream, addr)) => handle_incoming(stream, addr, &broadcast_tx, &peer_table),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                thread::sleep(POLL_INTERVAL);
            }
            Err(e) => {
                warn!(error = %e, "accept failed");
                thread::sleep(POLL_INTERVAL);
            }
        }
    }
}

fn handle_incoming(
    stream: std::net::TcpStream,
    addr: std::net::SocketAddr,
    broadcast_tx: &BroadcastSender,
    peer_table: &Arc<PeerTable>,
) {
    if let Err(e) = stream.set_nodelay(true) {
        warn!(%addr, error = %e, "set_nodelay failed");
    }

    let id = match peer_table.admit(addr) {
        Ok(id) => id,
        Err(_) => {
            // Oversubscription: close and continue, existing conference
            // is unaffected.
            return;
        }
    };

    let read_handle = match stream.try_clone() {
        Ok(s) => s,
        Err(e) => {
            warn!(id, error = %e, "failed to clone accepted socket");
            peer_table.free(id);
            return;
        }
    };
    let write_handle = Arc::new(stream);

    {
        let mut writer: &std::net::TcpStream = &write_handle;
        if let Err(e) = send_id_preamble(&mut writer, id) {
            warn!(id, error = %e, "failed to send id preamble");
            peer_table.free(id);
            return;
        }
        let _ = writer.flush();
    }

    peer_table.finalize_alive(id, Arc::clone(&write_handle));

    let tx = broadcast_tx.clone();
    let table = Arc::clone(peer_table);
    thread::spawn(move || crate::hub::connection::run(id, read_handle, tx, table));
}
