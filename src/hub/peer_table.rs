//! The hub's client slot table, with a `free -> admitting -> alive ->
//! draining -> free` lifecycle per slot.
//!
//! Grounded on `original_source/src/server.c`'s fixed
//! `Client clients[MAX_CLIENTS]` array plus its `clients_mutex` — one
//! mutex, one fixed-size table, slot index doubles as assigned `Id`.

use crate::error::Oversubscription;
use crate::frame::Id;
use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;
use tracing::info;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SlotState {
    Free,
    Admitting,
    Alive,
    Draining,
}

struct Slot {
    state: SlotState,
    remote_addr: Option<SocketAddr>,
    write_handle: Option<Arc<TcpStream>>,
}

impl Slot {
    fn empty() -> Self {
        Self { state: SlotState::Free, remote_addr: None, write_handle: None }
    }
}

pub struct PeerTable {
    slots: parking_lot::Mutex<Vec<Slot>>,
    max_peers: usize,
}

impl PeerTable {
    pub fn new(max_peers: usize) -> Self {
        let slots = (0..max_peers).map(|_| Slot::empty()).collect();
        Self { slots: parking_lot::Mutex::new(slots), max_peers }
    }

    /// Admission control: rejects if already at capacity, otherwise
    /// claims the lowest free slot and marks it `Admitting`. The
    /// returned `Id` is the slot index.
    pub fn admit(&self, addr: SocketAddr) -> Result<Id, Oversubscription> {
        let mut slots = self.slots.lock();
        let live = slots.iter().filter(|s| s.state != SlotState::Free).count();
        if live >= self.max_peers {
            return Err(Oversubscription { live, max: self.max_peers });
        }
        let index = slots
            .iter()
            .position(|s| s.state == SlotState::Free)
            .expect("live < max_peers implies a free slot exists");
        slots[index].state = SlotState::Admitting;
        slots[index].remote_addr = Some(addr);
        info!(id = index, %addr, "admitting");
        Ok(index as Id)
    }

    /// `admitting -> alive`, once the `Id` preamble has been written
    /// and the connection handler spawned.
    pub fn finalize_alive(&self, id: Id, write_handle: Arc<TcpStream>) {
        let mut slots = self.slots.lock();
        let slot = &mut slots[id as usize];
        slot.state = SlotState::Alive;
        slot.write_handle = Some(write_handle);
        info!(id, addr = ?slot.remote_addr, "alive");
    }

    /// `alive -> draining`, noticeable by either the connection
    /// handler or the broadcaster. Idempotent: a slot already draining
    /// or free yields `None` and is left untouched, so the broadcaster
    /// and the handler racing to notice the same failure never
    /// double-transition or hand the same write handle out twice.
    pub fn mark_draining(&self, id: Id) -> Option<Arc<TcpStream>> {
        let mut slots = self.slots.lock();
        let slot = &mut slots[id as usize];
        if slot.state != SlotState::Alive {
            return None;
        }
        slot.state = SlotState::Draining;
        let handle = slot.write_handle.take();
        info!(id, addr = ?slot.remote_addr, "draining");
        handle
    }

    /// `draining -> free`. Only ever called by the connection handler
    /// that owns this id's read loop, once that loop has actually
    /// exited — the single point of authority that avoids a freed
    /// slot being reused while a stale handler thread is still
    /// unwinding.
    pub fn free(&self, id: Id) {
        let mut slots = self.slots.lock();
        info!(id, addr = ?slots[id as usize].remote_addr, "disconnected");
        slots[id as usize] = Slot::empty();
    }

    /// Snapshot of `(id, write_handle)` for every alive peer except
    /// `exclude` — echo suppression at the source.
    pub fn snapshot_targets(&self, exclude: Id) -> Vec<(Id, Arc<TcpStream>)> {
        let slots = self.slots.lock();
        slots
            .iter()
            .enumerate()
            .filter(|(id, s)| *id as Id != exclude && s.state == SlotState::Alive)
            .filter_map(|(id, s)| s.write_handle.as_ref().map(|h| (id as Id, Arc::clone(h))))
            .collect()
    }

    pub fn live_count(&self) -> usize {
        self.slots.lock().iter().filter(|s| s.state != SlotState::Free).count()
    }

    /// Forcibly drains every alive peer (hub shutdown). Each
    /// connection handler notices its socket going away, finds
    /// `mark_draining` already a no-op, and frees its own slot as
    /// usual — shutdown never calls `free` directly.
    pub fn shutdown_all(&self) {
        let ids: Vec<Id> = {
            let slots = self.slots.lock();
            slots
                .iter()
                .enumerate()
                .filter(|(_, s)| s.state == SlotState::Alive)
                .map(|(id, _)| id as Id)
                .collect()
        };
        for id in ids {
            if let Some(handle) = self.mark_draining(id) {
                let _ = handle.shutdown(std::net::Shutdown::Both);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr() -> SocketAddr {
        "127.0.0.1:0".parse().unwrap()
    }

    #[test]
    fn admits_until_capacity_then_rejects() {
        let table = PeerTable::new(2);
        assert_eq!(table.admit(addr()).unwrap(), 0);
        assert_eq!(table.admit(addr()).unwrap(), 1);
        let err = table.admit(addr()).unwrap_err();
        assert_eq!(err.live, 2);
        assert_eq!(err.max, 2);
    }

    #[test]
    fn freed_slot_is_reusable() {
        let table = PeerTable::new(1);
        let id = table.admit(addr()).unwrap();
        table.free(id);
        assert_eq!(table.admit(addr()).unwrap(), id);
    }

    #[test]
    fn mark_draining_is_idempotent() {
        let table = PeerTable::new(1);
        let id = table.admit(addr()).unwrap();
        // Not alive yet (still Admitting) -> no-op.
        assert!(table.mark_draining(id).is_none());
    }

    #[test]
    fn snapshot_excludes_sender_and_non_alive_slots() {
        let table = PeerTable::new(3);
        let a = table.admit(addr()).unwrap();
        let b = table.admit(addr()).unwrap();
        let _c = table.admit(addr()).unwrap(); // left in Admitting, never alive

        // finalize_alive requires a real TcpStream; exercised in the
        // hub integration test instead. Here we only check exclusion
        // logic over an empty (no alive) table plus the admitted-only
        // counts.
        assert_eq!(table.live_count(), 3);
        let targets = table.snapshot_targets(a);
        assert!(targets.is_empty()); // none finalized alive yet
        let _ = b;
    }
}
