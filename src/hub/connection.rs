//! The per-peer framed read loop.
//!
//! Grounded on `original_source/src/server.c`'s
//! `handle_client_input`: read the size-prefixed packet, validate it,
//! copy it onto a work queue tagged with the sender. Runs on its own
//! OS thread — one worker thread per peer, so unlike an async-task
//! connection handler this is a blocking loop over a plain
//! `std::net::TcpStream`.

use crate::codec::recv_framed;
use crate::constants::MAX_PAYLOAD;
use crate::error::ConnectionError;
use crate::frame::Id;
use crate::hub::broadcaster::{BroadcastItem, BroadcastSender};
use crate::hub::peer_table::PeerTable;
use std::net::{Shutdown, TcpStream};
use std::sync::Arc;
use tracing::{info, warn};

pub fn run(id: Id, mut read_stream: TcpStream, broadcast_tx: BroadcastSender, peer_table: Arc<PeerTable>) {
    loop {
        match recv_framed(&mut read_stream, false) {
            Ok((_, payload)) => {
                debug_assert!(payload.len() <= MAX_PAYLOAD);
                if broadcast_tx.send(BroadcastItem { sender_id: id, payload }).is_err() {
                    info!(id, "broadcast queue shut down, closing connection");
                    break;
                }
            }
            Err(ConnectionError::Closed) => {
                info!(id, "peer closed connection");
                break;
            }
            Err(ConnectionError::ProtocolViolation(msg)) => {
                warn!(id, %msg, "protocol violation, terminating connection");
                break;
            }
            Err(ConnectionError::Broken(e)) => {
                warn!(id, error = %e, "transport broken, terminating connection");
                break;
            }
        }
    }

    if let Some(handle) = peer_table.mark_draining(id) {
        let _ = handle.shutdown(Shutdown::Both);
    }
    let _ = read_stream.shutdown(Shutdown::Both);
    peer_table.free(id);
}
