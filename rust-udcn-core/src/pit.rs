//! Pending Interest Table: in-flight Interest state keyed by exact name.

use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

use rust_udcn_common::ndn::Interest;
use rust_udcn_common::ndn::Name;
use rust_udcn_common::types::FaceId;

use crate::fib::FibSnapshot;

/// A single Pending Interest Table entry.
///
/// Mutated in place through `&mut` references handed out by [`Pit`] — every
/// update here is a single atomic read-modify-write, never the
/// remove-then-reinsert pattern.
#[derive(Debug, Clone)]
pub struct PitEntry {
    pub name: Name,
    /// Downstream faces awaiting an answer, parallel to `local`.
    in_faces: Vec<FaceId>,
    /// `local[i]` is true iff `in_faces[i]` is the application/upward queue.
    local: Vec<bool>,
    pub interest: Interest,
    pub timestamp: Instant,
    pub retransmits: u32,
    pub fibs_tried: Vec<FibSnapshot>,
    pub nacked_faces: Vec<FaceId>,
    pub outstanding_forwards: u32,
    pub is_session: bool,
}

impl PitEntry {
    fn new(name: Name, interest: Interest, face_id: FaceId, local: bool) -> Self {
        Self {
            name,
            in_faces: vec![face_id],
            local: vec![local],
            interest,
            timestamp: Instant::now(),
            retransmits: 0,
            fibs_tried: Vec::new(),
            nacked_faces: Vec::new(),
            outstanding_forwards: 0,
            is_session: false,
        }
    }

    /// Downstreams awaiting an answer, as `(face_id, is_local)` pairs.
    pub fn downstreams(&self) -> impl Iterator<Item = (FaceId, bool)> + '_ {
        self.in_faces.iter().copied().zip(self.local.iter().copied())
    }

    pub fn downstream_count(&self) -> usize {
        self.in_faces.len()
    }

    pub fn has_downstream(&self, face_id: FaceId) -> bool {
        self.in_faces.contains(&face_id)
    }

    /// Appends `(face_id, local)` unless already present (aggregation,
    /// §3.2/§4.1 step 3: "dedup when the same face appears multiple times").
    pub fn add_downstream(&mut self, face_id: FaceId, local: bool) {
        if !self.in_faces.contains(&face_id) {
            self.in_faces.push(face_id);
            self.local.push(local);
        }
    }

    pub fn refresh_timestamp(&mut self) {
        self.timestamp = Instant::now();
    }

    pub fn add_nacked_face(&mut self, face_id: FaceId) {
        if !self.nacked_faces.contains(&face_id) {
            self.nacked_faces.push(face_id);
        }
    }

    pub fn was_nacked(&self, face_id: FaceId) -> bool {
        self.nacked_faces.contains(&face_id)
    }

    pub fn add_tried_fib(&mut self, snapshot: FibSnapshot) {
        if !self.fibs_tried.contains(&snapshot) {
            self.fibs_tried.push(snapshot);
        }
    }

    /// Drops every local (application-facing) downstream, keeping only
    /// network ones (§4.3 step 6: a partially-local entry survives Nack
    /// propagation so later network retries can still be answered).
    pub fn retain_network_only(&mut self) {
        let mut kept_faces = Vec::with_capacity(self.in_faces.len());
        let mut kept_local = Vec::with_capacity(self.local.len());
        for (face, local) in self.in_faces.iter().zip(self.local.iter()) {
            if !*local {
                kept_faces.push(*face);
                kept_local.push(*local);
            }
        }
        self.in_faces = kept_faces;
        self.local = kept_local;
    }
}

/// Set of [`PitEntry`] keyed by exact name (§3.2).
pub struct Pit {
    node_name: String,
    capacity: usize,
    entries: HashMap<Name, PitEntry>,
}

impl Pit {
    pub fn new(node_name: impl Into<String>, capacity: usize) -> Self {
        Self {
            node_name: node_name.into(),
            capacity,
            entries: HashMap::new(),
        }
    }

    /// Creates a PIT entry for `interest.name`, or aggregates onto an
    /// existing one by refreshing its timestamp and recording the new
    /// downstream. Returns `true` if a new entry was created.
    pub fn insert_or_aggregate(
        &mut self,
        interest: &Interest,
        face_id: FaceId,
        local: bool,
    ) -> bool {
        if let Some(entry) = self.entries.get_mut(&interest.name) {
            entry.refresh_timestamp();
            entry.add_downstream(face_id, local);
            return false;
        }
        if self.entries.len() >= self.capacity {
            // Capacity exhausted: the caller's subsequent FIB lookup will
            // still run, but with no PIT entry to record outstanding state
            // the Nack/aggregation machinery degrades to best-effort.
            return false;
        }
        self.entries.insert(
            interest.name.clone(),
            PitEntry::new(interest.name.clone(), interest.clone(), face_id, local),
        );
        true
    }

    /// Installs a session-flagged entry directly, bypassing the normal
    /// Interest-arrival path (§4.5: the handshake bridge mirrors an
    /// in-flight hop's downstream set under the eventual session name).
    /// Overwrites any existing entry for `name`.
    pub fn insert_session(&mut self, name: Name, interest: Interest, downstreams: Vec<(FaceId, bool)>) {
        let Some((first_face, first_local)) = downstreams.first().copied() else {
            return;
        };
        let mut entry = PitEntry::new(name.clone(), interest, first_face, first_local);
        for (face, local) in downstreams.into_iter().skip(1) {
            entry.add_downstream(face, local);
        }
        entry.is_session = true;
        self.entries.insert(name, entry);
    }

    pub fn get(&self, name: &Name) -> Option<&PitEntry> {
        self.entries.get(name)
    }

    pub fn get_mut(&mut self, name: &Name) -> Option<&mut PitEntry> {
        self.entries.get_mut(name)
    }

    pub fn remove(&mut self, name: &Name) -> Option<PitEntry> {
        self.entries.remove(name)
    }

    pub fn contains(&self, name: &Name) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// One ageing pass (§4.4). For each non-session entry: if it has expired
    /// *and* exhausted its retransmits, it moves to `removed`; otherwise its
    /// retransmit count is bumped and it moves to `retransmit`.
    pub fn ageing(&mut self, pit_timeout: Duration, pit_retransmits: u32) -> (Vec<Name>, Vec<PitEntry>) {
        let mut to_retransmit = Vec::new();
        let mut removed_names = Vec::new();

        for (name, entry) in self.entries.iter_mut() {
            if entry.is_session {
                continue;
            }
            if entry.timestamp.elapsed() <= pit_timeout {
                continue;
            }
            if entry.retransmits > pit_retransmits {
                removed_names.push(name.clone());
            } else {
                entry.retransmits += 1;
                to_retransmit.push(name.clone());
            }
        }

        let mut removed = Vec::with_capacity(removed_names.len());
        for name in &removed_names {
            if let Some(e) = self.entries.remove(name) {
                removed.push(e);
            }
        }

        (to_retransmit, removed)
    }
}

impl fmt::Display for Pit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pit[{}]({} entries)", self.node_name, self.entries.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interest(name: &str) -> Interest {
        Interest::new(Name::from_string(name))
    }

    #[test]
    fn first_insert_creates_entry_second_aggregates() {
        let mut pit = Pit::new("n1", 16);
        let i = interest("/a/b");
        assert!(pit.insert_or_aggregate(&i, FaceId(1), false));
        assert!(!pit.insert_or_aggregate(&i, FaceId(2), false));
        let entry = pit.get(&i.name).unwrap();
        assert_eq!(entry.downstream_count(), 2);
    }

    #[test]
    fn aggregation_dedups_repeated_face() {
        let mut pit = Pit::new("n1", 16);
        let i = interest("/a/b");
        pit.insert_or_aggregate(&i, FaceId(1), false);
        pit.insert_or_aggregate(&i, FaceId(1), false);
        assert_eq!(pit.get(&i.name).unwrap().downstream_count(), 1);
    }

    #[test]
    fn ageing_skips_session_entries() {
        let mut pit = Pit::new("n1", 16);
        let i = interest("/sid/abc");
        pit.insert_or_aggregate(&i, FaceId(1), false);
        pit.get_mut(&i.name).unwrap().is_session = true;
        let (retransmit, removed) = pit.ageing(Duration::from_millis(0), 0);
        assert!(retransmit.is_empty());
        assert!(removed.is_empty());
        assert!(pit.contains(&i.name));
    }

    #[test]
    fn retain_network_only_drops_local_downstreams() {
        let mut pit = Pit::new("n1", 16);
        let i = interest("/a/b");
        pit.insert_or_aggregate(&i, FaceId(1), true);
        pit.insert_or_aggregate(&i, FaceId(2), false);
        let entry = pit.get_mut(&i.name).unwrap();
        entry.retain_network_only();
        assert_eq!(entry.downstream_count(), 1);
        assert!(entry.has_downstream(FaceId(2)));
        assert!(!entry.has_downstream(FaceId(1)));
    }

    #[test]
    fn ageing_removes_after_exhausting_retransmits() {
        let mut pit = Pit::new("n1", 16);
        let i = interest("/orphan");
        pit.insert_or_aggregate(&i, FaceId(1), false);
        for _ in 0..=1 {
            pit.ageing(Duration::from_millis(0), 1);
        }
        let (_, removed) = pit.ageing(Duration::from_millis(0), 1);
        assert_eq!(removed.len(), 1);
        assert!(!pit.contains(&i.name));
    }
}
