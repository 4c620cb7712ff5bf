//! Owner of face identifiers and the live `Face` set (§5 "Face identifiers
//! and the face table are owned by the link layer; the ICN layer treats
//! them as opaque integers.", §6.2 `face_for`/`faces`).

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use tokio::sync::RwLock;

use rust_udcn_common::types::{FaceId, MAX_FACE_TABLE_ENTRIES};

use crate::face::Face;

struct Entry {
    face: Arc<Face>,
    insertion_order: u64,
}

/// Maps addresses and face identifiers to live `Face` handles, evicting the
/// oldest entry on overflow past `capacity` (default 10,000 per §6.2).
pub struct FaceTable {
    capacity: usize,
    next_id: AtomicU32,
    insertion_clock: AtomicU32,
    by_id: RwLock<HashMap<FaceId, Entry>>,
    by_addr: RwLock<HashMap<SocketAddr, FaceId>>,
}

impl FaceTable {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            next_id: AtomicU32::new(0),
            insertion_clock: AtomicU32::new(0),
            by_id: RwLock::new(HashMap::new()),
            by_addr: RwLock::new(HashMap::new()),
        }
    }

    /// Allocates a fresh face id, to be used before the face itself is
    /// constructed (the underlying connection needs the id to label logs).
    pub fn allocate_id(&self) -> FaceId {
        FaceId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Registers a newly created face, evicting the least-recently-inserted
    /// entry first if the table is at capacity.
    pub async fn insert(&self, addr: SocketAddr, face: Arc<Face>) {
        let mut by_id = self.by_id.write().await;
        if by_id.len() >= self.capacity {
            if let Some(oldest) = by_id
                .iter()
                .min_by_key(|(_, e)| e.insertion_order)
                .map(|(id, _)| *id)
            {
                if let Some(entry) = by_id.remove(&oldest) {
                    self.by_addr.write().await.remove(&entry.face.remote_addr());
                }
            }
        }
        let order = self.insertion_clock.fetch_add(1, Ordering::Relaxed) as u64;
        let id = face.id();
        by_id.insert(id, Entry { face, insertion_order: order });
        self.by_addr.write().await.insert(addr, id);
    }

    /// Returns the face id already associated with `addr`, if any (§6.2
    /// `face_for`: create-if-absent is the caller's responsibility, since
    /// creating a face here means opening a QUIC connection).
    pub async fn face_for_addr(&self, addr: &SocketAddr) -> Option<FaceId> {
        self.by_addr.read().await.get(addr).copied()
    }

    pub async fn get(&self, id: FaceId) -> Option<Arc<Face>> {
        self.by_id.read().await.get(&id).map(|e| e.face.clone())
    }

    pub async fn remove(&self, id: FaceId) -> Option<Arc<Face>> {
        let mut by_id = self.by_id.write().await;
        let entry = by_id.remove(&id)?;
        self.by_addr.write().await.remove(&entry.face.remote_addr());
        Some(entry.face)
    }

    pub async fn faces(&self) -> Vec<Arc<Face>> {
        self.by_id.read().await.values().map(|e| e.face.clone()).collect()
    }

    pub async fn len(&self) -> usize {
        self.by_id.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.by_id.read().await.is_empty()
    }
}

impl Default for FaceTable {
    fn default() -> Self {
        Self::new(MAX_FACE_TABLE_ENTRIES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(port: u16) -> SocketAddr {
        format!("127.0.0.1:{port}").parse().unwrap()
    }

    #[test]
    fn allocate_id_is_monotonic() {
        let table = FaceTable::new(10);
        let a = table.allocate_id();
        let b = table.allocate_id();
        assert_ne!(a, b);
    }

    #[test]
    fn default_capacity_matches_spec_default() {
        let table = FaceTable::default();
        assert_eq!(table.capacity, MAX_FACE_TABLE_ENTRIES);
    }
}
