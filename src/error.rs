//! The connection and frame error taxonomy.
//!
//! Every per-connection error is local to that connection's worker;
//! every per-frame error is local to that frame. Nothing here is meant
//! to propagate past the worker thread that produced it — `main` only
//! ever sees the handful of unrecoverable startup errors (bind/listen,
//! device init, codec init), which are reported through `anyhow`
//! instead of these types.

use std::io;

/// A connection-scoped failure. Terminal: the connection that produced
/// it is torn down, surviving connections are unaffected.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// Malformed length field, or a length outside `[4, MAX_PAYLOAD+4]`
    /// (server-bound) / `[1, MAX_PAYLOAD]` (client-bound).
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    /// The peer closed the connection gracefully (EOF on a fresh read).
    #[error("connection closed by peer")]
    Closed,

    /// Reset, broken pipe, or any other I/O failure on the transport.
    #[error("transport error: {0}")]
    Broken(#[from] io::Error),
}

impl ConnectionError {
    /// True if this is a graceful close rather than a hard failure.
    pub fn is_closed(&self) -> bool {
        matches!(self, ConnectionError::Closed)
    }
}

/// A single-frame failure. Never terminal: the caller drops this frame
/// (and, for decode faults, flushes the affected jitter queue) and
/// continues.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The encoder or decoder returned a negative status.
    #[error("codec fault: {0}")]
    CodecFault(String),

    /// A frame arrived whose payload would not fit the caller's local
    /// buffer; dropped without tearing down the connection.
    #[error("payload too large for local buffer ({size} > {max})")]
    TooLarge { size: usize, max: usize },
}

/// Raised by the hub acceptor when admission is refused because the
/// conference is already at `MAX_PEERS`. Not a connection error: the
/// new transport is simply closed, the existing conference is
/// unaffected.
#[derive(Debug, thiserror::Error)]
#[error("oversubscribed: {live}/{max} peers already connected")]
pub struct Oversubscription {
    pub live: usize,
    pub max: usize,
}

/// Raised when the hub's broadcast queue cannot accept an item (the
/// channel's allocation failed, or it has already been shut down).
#[derive(Debug, thiserror::Error)]
pub enum ResourceExhaustion {
    #[error("broadcast queue is shutting down")]
    ChannelClosed,
}
