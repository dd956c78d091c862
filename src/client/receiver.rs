//! The receiver thread: blocks on `recv_framed` against the hub
//! transport and feeds the registry. No direct analogue in a
//! two-party point-to-point link with no registry, but reuses
//! [`crate::codec::recv_framed`] and [`crate::registry::Registry`]
//! exactly as built for the hub side.

use crate::codec::recv_framed;
use crate::error::ConnectionError;
use crate::frame::Id;
use crate::registry::Registry;
use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

pub fn run<R: Read>(mut transport: R, my_id: Id, registry: Arc<Registry>, running: Arc<AtomicBool>) {
    loop {
        match recv_framed(&mut transport, true) {
            Ok((Some(speaker_id), payload)) => {
                if speaker_id == my_id {
                    // Defense in depth: the hub never echoes the
                    // sender's own frame back, but a client that
                    // trusted the wire blindly would duplicate itself.
                    continue;
                }
                if let Err(e) = registry.push(speaker_id, payload, Instant::now()) {
                    warn!(speaker_id, error = %e, "dropping frame, could not register speaker");
                }
            }
            Ok((None, _)) => {
                warn!("hub frame missing speaker id, dropping");
            }
            Err(ConnectionError::Closed) => {
                info!("hub closed the connection");
                running.store(false, Ordering::Release);
                break;
            }
            Err(ConnectionError::ProtocolViolation(msg)) => {
                warn!(%msg, "protocol violation from hub, disconnecting");
                running.store(false, Ordering::Release);
                break;
            }
            Err(ConnectionError::Broken(e)) => {
                warn!(error = %e, "transport broken, disconnecting");
                running.store(false, Ordering::Release);
                break;
            }
        }
    }
}
