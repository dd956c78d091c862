//! The framed wire protocol.
//!
//! Two primitives, `send_framed` and `recv_framed`, built directly on
//! any `Read + Write` transport — on the hub and client that's a
//! blocking `std::net::TcpStream`; in tests it's [`ChannelTransport`].
//! Grounded on `original_source/src/client.cpp`'s `send_data`/
//! `receive_data` and `src/server.c`'s `send_all` (same big-endian
//! length-prefix idea, generalized to optionally carry a speaker id
//! and to classify failures by type instead of `perror`-and-continue).

use crate::constants::MAX_PAYLOAD;
use crate::error::ConnectionError;
use crate::frame::Id;
use bytes::Bytes;
use std::io::{self, Read, Write};

/// Reads exactly `buf.len()` bytes, classifying a zero-byte read as a
/// graceful close and any other truncated read as a broken transport.
fn read_exact_classified<R: Read + ?Sized>(
    transport: &mut R,
    buf: &mut [u8],
) -> Result<(), ConnectionError> {
    let mut filled = 0;
    while filled < buf.len() {
        match transport.read(&mut buf[filled..]) {
            Ok(0) => {
                return if filled == 0 {
                    Err(ConnectionError::Closed)
                } else {
                    Err(ConnectionError::Broken(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "connection closed mid-frame",
                    )))
                };
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(ConnectionError::Broken(e)),
        }
    }
    Ok(())
}

/// Sends one length-prefixed frame. `speaker_id` is present on the
/// hub→client direction and absent client→hub (the hub stamps the id
/// from the connection). Retries partial writes until every byte
/// leaves or the transport reports a hard failure.
pub fn send_framed<W: Write + ?Sized>(
    transport: &mut W,
    speaker_id: Option<Id>,
    payload: &[u8],
) -> Result<(), ConnectionError> {
    let id_bytes = if speaker_id.is_some() { 4 } else { 0 };
    let total_len = (payload.len() + id_bytes) as u32;

    transport.write_all(&total_len.to_be_bytes()).map_err(ConnectionError::Broken)?;
    if let Some(id) = speaker_id {
        transport.write_all(&id.to_be_bytes()).map_err(ConnectionError::Broken)?;
    }
    transport.write_all(payload).map_err(ConnectionError::Broken)?;
    Ok(())
}

/// Sends the one-time, length-unprefixed 4-byte `Id` preamble (hub
/// → client, once, on connect).
pub fn send_id_preamble<W: Write + ?Sized>(transport: &mut W, id: Id) -> Result<(), ConnectionError> {
    transport.write_all(&id.to_be_bytes()).map_err(ConnectionError::Broken)
}

/// Reads the one-time 4-byte `Id` preamble.
pub fn recv_id_preamble<R: Read + ?Sized>(transport: &mut R) -> Result<Id, ConnectionError> {
    let mut buf = [0u8; 4];
    read_exact_classified(transport, &mut buf)?;
    Ok(u32::from_be_bytes(buf))
}

/// Receives one length-prefixed frame. When `with_speaker_id` is true
/// (client reading from the hub) the length covers a leading 4-byte
/// speaker id; when false (hub reading from a client) the length is
/// the payload length alone.
pub fn recv_framed<R: Read + ?Sized>(
    transport: &mut R,
    with_speaker_id: bool,
) -> Result<(Option<Id>, Frame), ConnectionError> {
    let mut len_buf = [0u8; 4];
    read_exact_classified(transport, &mut len_buf)?;
    let len = u32::from_be_bytes(len_buf) as usize;

    if with_speaker_id {
        if !(4..=MAX_PAYLOAD + 4).contains(&len) {
            return Err(ConnectionError::ProtocolViolation(format!(
                "frame length {len} outside [4, {}]",
                MAX_PAYLOAD + 4
            )));
        }
    } else if !(1..=MAX_PAYLOAD).contains(&len) {
        return Err(ConnectionError::ProtocolViolation(format!(
            "frame length {len} outside [1, {MAX_PAYLOAD}]"
        )));
    }

    let mut body = vec![0u8; len];
    read_exact_classified(transport, &mut body)?;

    if with_speaker_id {
        let id = u32::from_be_bytes([body[0], body[1], body[2], body[3]]);
        Ok((Some(id), Bytes::copy_from_slice(&body[4..])))
    } else {
        Ok((None, Bytes::from(body)))
    }
}

/// Serializes one hub→client wire frame exactly once, so the
/// broadcaster can write the identical bytes to every target instead
/// of re-encoding per peer.
pub fn materialize_frame(speaker_id: Id, payload: &[u8]) -> Vec<u8> {
    let total_len = (4 + payload.len()) as u32;
    let mut out = Vec::with_capacity(4 + 4 + payload.len());
    out.extend_from_slice(&total_len.to_be_bytes());
    out.extend_from_slice(&speaker_id.to_be_bytes());
    out.extend_from_slice(payload);
    out
}

/// An in-memory duplex transport for tests: two `crossbeam_channel`
/// byte queues standing in for a socket.
pub mod test_support {
    use crossbeam_channel::{Receiver, Sender};
    use std::io::{self, Read, Write};

    pub struct ChannelTransport {
        tx: Sender<u8>,
        rx: Receiver<u8>,
        pending: Option<u8>,
    }

    impl ChannelTransport {
        /// Builds a connected pair: writes to `a` are readable from `b`
        /// and vice versa.
        pub fn pair() -> (ChannelTransport, ChannelTransport) {
            let (tx1, rx1) = crossbeam_channel::unbounded();
            let (tx2, rx2) = crossbeam_channel::unbounded();
            (
                ChannelTransport { tx: tx1, rx: rx2, pending: None },
                ChannelTransport { tx: tx2, rx: rx1, pending: None },
            )
        }
    }

    impl Read for ChannelTransport {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if buf.is_empty() {
                return Ok(0);
            }
            let first = match self.pending.take() {
                Some(b) => b,
                None => match self.rx.recv() {
                    Ok(b) => b,
                    Err(_) => return Ok(0), // sender dropped: graceful EOF
                },
            };
            buf[0] = first;
            let mut n = 1;
            while n < buf.len() {
                match self.rx.try_recv() {
                    Ok(b) => {
                        buf[n] = b;
                        n += 1;
                    }
                    Err(_) => break,
                }
            }
            Ok(n)
        }
    }

    impl Write for ChannelTransport {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            for &b in buf {
                self.tx.send(b).map_err(|_| {
                    io::Error::new(io::ErrorKind::BrokenPipe, "peer transport dropped")
                })?;
            }
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::ChannelTransport;
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn round_trip_without_speaker_id() {
        let (mut a, mut b) = ChannelTransport::pair();
        send_framed(&mut a, None, b"hello").unwrap();
        let (id, payload) = recv_framed(&mut b, false).unwrap();
        assert_eq!(id, None);
        assert_eq!(&payload[..], b"hello");
    }

    #[test]
    fn round_trip_with_speaker_id() {
        let (mut a, mut b) = ChannelTransport::pair();
        send_framed(&mut a, Some(42), b"hi").unwrap();
        let (id, payload) = recv_framed(&mut b, true).unwrap();
        assert_eq!(id, Some(42));
        assert_eq!(&payload[..], b"hi");
    }

    #[test]
    fn materialized_frame_parses_back_with_recv_framed() {
        let bytes = materialize_frame(7, b"payload");
        let (mut a, mut b) = ChannelTransport::pair();
        a.write_all(&bytes).unwrap();
        let (id, payload) = recv_framed(&mut b, true).unwrap();
        assert_eq!(id, Some(7));
        assert_eq!(&payload[..], b"payload");
    }

    #[test]
    fn id_preamble_round_trips() {
        let (mut a, mut b) = ChannelTransport::pair();
        send_id_preamble(&mut a, 7).unwrap();
        assert_eq!(recv_id_preamble(&mut b).unwrap(), 7);
    }

    #[test]
    fn zero_payload_client_to_hub_is_a_protocol_violation() {
        let (mut a, mut b) = ChannelTransport::pair();
        a.write_all(&0u32.to_be_bytes()).unwrap();
        let err = recv_framed(&mut b, false).unwrap_err();
        assert!(matches!(err, ConnectionError::ProtocolViolation(_)));
    }

    #[test]
    fn oversized_length_is_a_protocol_violation() {
        let (mut a, mut b) = ChannelTransport::pair();
        let too_big = (MAX_PAYLOAD + 1) as u32;
        a.write_all(&too_big.to_be_bytes()).unwrap();
        let err = recv_framed(&mut b, false).unwrap_err();
        assert!(matches!(err, ConnectionError::ProtocolViolation(_)));
    }

    #[test]
    fn dropped_peer_reads_as_closed() {
        let (a, mut b) = ChannelTransport::pair();
        drop(a);
        let err = recv_framed(&mut b, false).unwrap_err();
        assert!(err.is_closed());
    }

    // recv_framed(send_framed(payload)) yields the same payload, for
    // any 1..=MAX_PAYLOAD byte payload.
    proptest! {
        #[test]
        fn framed_codec_round_trip(payload in prop::collection::vec(any::<u8>(), 1..=MAX_PAYLOAD)) {
            let (mut a, mut b) = ChannelTransport::pair();
            send_framed(&mut a, None, &payload).unwrap();
            let (id, got) = recv_framed(&mut b, false).unwrap();
            prop_assert_eq!(id, None);
            prop_assert_eq!(&got[..], &payload[..]);
        }

        #[test]
        fn framed_codec_round_trip_with_id(id in any::<u32>(), payload in prop::collection::vec(any::<u8>(), 1..=MAX_PAYLOAD)) {
            let (mut a, mut b) = ChannelTransport::pair();
            send_framed(&mut a, Some(id), &payload).unwrap();
            let (got_id, got) = recv_framed(&mut b, true).unwrap();
            prop_assert_eq!(got_id, Some(id));
            prop_assert_eq!(&got[..], &payload[..]);
        }
    }
}
