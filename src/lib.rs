//! `voicemesh`: a low-latency, many-to-many real-time voice
//! conferencing fabric — a hub server that relays per-speaker audio
//! packets between connected peers, and a client that captures,
//! compresses, sends, receives, and mixes every peer's stream into one
//! local playback buffer.
//!
//! See `DESIGN.md` at the repository root for the grounding behind
//! this crate's design.

pub mod audio_codec;
pub mod client;
pub mod codec;
pub mod constants;
pub mod error;
pub mod frame;
pub mod hub;
pub mod jitter;
pub mod registry;
pub mod ring;

pub use frame::{Frame, Id};
