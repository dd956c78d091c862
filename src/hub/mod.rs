//! The relay hub: acceptor, broadcaster, peer table, and per-peer
//! connection handlers.

pub mod acceptor;
pub mod broadcaster;
pub mod connection;
pub mod peer_table;
pub mod runtime;

pub use runtime::HubRuntime;
