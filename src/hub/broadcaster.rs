//! The hub broadcaster.
//!
//! One thread serializes every outbound frame, giving a total
//! ordering on packets delivered to any single peer and avoiding
//! contended per-transport locks. Grounded on
//! `original_source/src/server.c`'s `worker_thread_func`, which
//! dequeues from the same kind of single-writer work queue and fans a
//! materialized packet out to every recipient but the sender.

use crate::codec::materialize_frame;
use crate::frame::{Frame, Id};
use crate::hub::peer_table::PeerTable;
use std::io::Write;
use std::net::Shutdown;
use std::sync::Arc;
use tracing::warn;

/// One item on the broadcast queue.
pub struct BroadcastItem {
    pub sender_id: Id,
    pub payload: Frame,
}

pub type BroadcastSender = crossbeam_channel::Sender<BroadcastItem>;
pub type BroadcastReceiver = crossbeam_channel::Receiver<BroadcastItem>;

/// Runs until `rx` is disconnected (the hub runtime drops every
/// sender handle as part of shutdown), draining whatever is still
/// queued first.
pub fn run(rx: BroadcastReceiver, peer_table: Arc<PeerTable>) {
    while let Ok(item) = rx.recv() {
        let frame_bytes = materialize_frame(item.sender_id, &item.payload);
        let targets = peer_table.snapshot_targets(item.sender_id);

        for (id, stream) in targets {
            let mut writer = &*stream;
            if let Err(e) = writer.write_all(&frame_bytes) {
                warn!(id, error = %e, "broadcast write failed, marking peer dead");
                if let Some(handle) = peer_table.mark_draining(id) {
                    let _ = handle.shutdown(Shutdown::Both);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::peer_table::PeerTable;
    use bytes::Bytes;
    use std::net::{TcpListener, TcpStream};
    use std::thread;

    fn connected_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let client = thread::spawn(move || TcpStream::connect(addr).unwrap());
        let (server_side, _) = listener.accept().unwrap();
        (server_side, client.join().unwrap())
    }

    #[test]
    fn fans_out_to_all_but_sender() {
        let table = Arc::new(PeerTable::new(3));
        let zero = table.admit("127.0.0.1:0".parse().unwrap()).unwrap();
        let one = table.admit("127.0.0.1:0".parse().unwrap()).unwrap();
        let two = table.admit("127.0.0.1:0".parse().unwrap()).unwrap();

        let (s0, mut c0) = connected_pair();
        let (s1, mut c1) = connected_pair();
        let (s2, mut c2) = connected_pair();
        table.finalize_alive(zero, Arc::new(s0));
        table.finalize_alive(one, Arc::new(s1));
        table.finalize_alive(two, Arc::new(s2));

        let (tx, rx) = crossbeam_channel::unbounded();
        let table_for_thread = Arc::clone(&table);
        let handle = thread::spawn(move || run(rx, table_for_thread));

        tx.send(BroadcastItem { sender_id: zero, payload: Bytes::from_static(b"hi") }).unwrap();
        drop(tx);
        handle.join().unwrap();

        use crate::codec::recv_framed;
        let (id1, payload1) = recv_framed(&mut c1, true).unwrap();
        assert_eq!(id1, Some(zero));
        assert_eq!(&payload1[..], b"hi");

        let (id2, payload2) = recv_framed(&mut c2, true).unwrap();
        assert_eq!(id2, Some(zero));
        assert_eq!(&payload2[..], b"hi");

        // c0 (the sender's own transport) must never receive its own frame.
        c0.set_read_timeout(Some(std::time::Duration::from_millis(50))).unwrap();
        let mut probe = [0u8; 1];
        let res = std::io::Read::read(&mut c0, &mut probe);
        assert!(res.is_err() || res.unwrap() == 0, "sender must not see its own frame");
    }
}
