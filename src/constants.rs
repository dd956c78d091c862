//! Design constants shared by the hub and the client.
//!
//! These must match end-to-end; they are compile-time constants rather
//! than configuration because they are fixed design parameters, not
//! deployment-time knobs.

use std::time::Duration;

/// Audio sample rate, in Hz.
pub const SAMPLE_RATE: u32 = 48_000;

/// Number of audio channels. The mixing engine is mono-only.
pub const CHANNELS: usize = 1;

/// PCM samples per channel per tick (20 ms at 48 kHz).
pub const FRAME_SIZE: usize = 960;

/// Maximum compressed payload size, in bytes.
pub const MAX_PAYLOAD: usize = 1500;

/// Maximum number of simultaneously connected peers at the hub.
pub const MAX_PEERS: usize = 10;

/// Depth of each remote speaker's jitter queue.
pub const JITTER_DEPTH: usize = 8;

/// A remote speaker with no traffic for longer than this is evicted.
pub const STALE_TIMEOUT: Duration = Duration::from_secs(5);

/// Wall-clock duration of one audio tick (derived, not independently tunable).
pub const FRAME_PERIOD: Duration =
    Duration::from_micros((FRAME_SIZE as u64 * 1_000_000) / SAMPLE_RATE as u64);

/// How many ticks' worth of encoded frames the capture ring must
/// tolerate before the sender thread is considered to have fallen
/// behind (design minimum: 100 ms of frames' worth of network stall).
pub const CAPTURE_RING_TICKS: usize = 5;
