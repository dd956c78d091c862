//! The identity and payload types shared by the hub and the client.

use bytes::Bytes;

/// Speaker identity, assigned by the hub at connect time. Unique among
/// currently connected peers; reused after disconnect.
pub type Id = u32;

/// A compressed, opaque audio payload. Immutable after creation.
///
/// `len() <= MAX_PAYLOAD` is enforced wherever a `Frame` is
/// constructed from network or codec input, not by the type itself.
pub type Frame = Bytes;
