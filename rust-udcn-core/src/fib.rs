//! Forwarding Information Base: a longest-prefix-match routing table from
//! name prefix to a set of upstream faces.

use std::fmt;

use rust_udcn_common::ndn::Name;
use rust_udcn_common::types::FaceId;

/// A single FIB entry: a name prefix and the set of upstream faces that can
/// answer it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FibEntry {
    pub name: Name,
    pub upstreams: Vec<FaceId>,
    pub is_static: bool,
    pub is_session: bool,
    /// Recovered from the teacher's kernel FIB value (`FibValue.cost`); used
    /// only to order display output among equal-length prefix ties, never to
    /// change longest-prefix-match semantics.
    pub cost: u8,
}

impl FibEntry {
    pub fn new(name: Name, upstreams: Vec<FaceId>) -> Self {
        Self {
            name,
            upstreams,
            is_static: false,
            is_session: false,
            cost: 0,
        }
    }

    pub fn static_entry(mut self) -> Self {
        self.is_static = true;
        self
    }

    pub fn session_entry(mut self) -> Self {
        self.is_session = true;
        self
    }

    pub fn with_cost(mut self, cost: u8) -> Self {
        self.cost = cost;
        self
    }
}

/// A value-type snapshot of a [`FibEntry`] taken at lookup time.
///
/// PIT entries hold these by value (never by reference) so that later FIB
/// mutations cannot invalidate previously recorded "already tried" state
/// (spec §9).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FibSnapshot {
    pub name: Name,
    pub upstreams: Vec<FaceId>,
}

impl From<&FibEntry> for FibSnapshot {
    fn from(e: &FibEntry) -> Self {
        Self {
            name: e.name.clone(),
            upstreams: e.upstreams.clone(),
        }
    }
}

/// Ordered collection of [`FibEntry`] values, looked up by longest-prefix
/// match.
pub struct Fib {
    node_name: String,
    capacity: usize,
    entries: Vec<FibEntry>,
}

impl Fib {
    pub fn new(node_name: impl Into<String>, capacity: usize) -> Self {
        Self {
            node_name: node_name.into(),
            capacity,
            entries: Vec::new(),
        }
    }

    /// Adds a route, or merges `upstreams` into an existing entry sharing
    /// the same name (§3.3: "no two entries share the same name").
    pub fn add(&mut self, entry: FibEntry) {
        if let Some(existing) = self.entries.iter_mut().find(|e| e.name == entry.name) {
            for face in entry.upstreams {
                if !existing.upstreams.contains(&face) {
                    existing.upstreams.push(face);
                }
            }
            existing.is_static = existing.is_static || entry.is_static;
            existing.is_session = existing.is_session || entry.is_session;
            return;
        }
        if self.entries.len() >= self.capacity {
            return;
        }
        self.entries.push(entry);
    }

    /// Replaces any existing entry for `name` with `entry` (used by the
    /// reconnect protocol, which always installs a fresh incoming face).
    pub fn replace(&mut self, entry: FibEntry) {
        self.entries.retain(|e| e.name != entry.name);
        self.entries.push(entry);
    }

    pub fn remove(&mut self, name: &Name) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.name != *name);
        self.entries.len() != before
    }

    /// Removes all non-static entries.
    pub fn clear(&mut self) {
        self.entries.retain(|e| e.is_static);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &FibEntry> {
        self.entries.iter()
    }

    /// Longest-prefix match for `name`. `exclude_tried` skips entries whose
    /// name+upstream identity appears in the slice (already-exhausted
    /// fallback candidates); `exclude_incoming` skips entries whose entire
    /// upstream set is contained in the incoming-face set (loop avoidance).
    /// Among equal-length prefixes, first insertion wins, then lowest cost.
    pub fn lookup(
        &self,
        name: &Name,
        exclude_tried: &[FibSnapshot],
        exclude_incoming: &[FaceId],
    ) -> Option<&FibEntry> {
        let mut best: Option<&FibEntry> = None;
        let mut best_len = 0usize;
        for entry in &self.entries {
            if !entry.name.is_prefix_of(name) {
                continue;
            }
            let len = entry.name.len();
            if len < best_len {
                continue;
            }
            if exclude_tried
                .iter()
                .any(|s| s.name == entry.name && s.upstreams == entry.upstreams)
            {
                continue;
            }
            if !exclude_incoming.is_empty()
                && entry
                    .upstreams
                    .iter()
                    .all(|u| exclude_incoming.contains(u))
            {
                continue;
            }
            match best {
                Some(current) if len == best_len && entry.cost >= current.cost => continue,
                _ => {
                    best = Some(entry);
                    best_len = len;
                }
            }
        }
        best
    }
}

impl fmt::Display for Fib {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fib[{}]({} entries)", self.node_name, self.entries.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn face(n: u32) -> FaceId {
        FaceId(n)
    }

    #[test]
    fn longest_prefix_wins_over_shorter_match() {
        let mut fib = Fib::new("n1", 16);
        fib.add(FibEntry::new(Name::from_string("/test"), vec![face(1)]));
        fib.add(FibEntry::new(Name::from_string("/test/data"), vec![face(2)]));
        let hit = fib
            .lookup(&Name::from_string("/test/data/object"), &[], &[])
            .unwrap();
        assert_eq!(hit.upstreams, vec![face(2)]);
    }

    #[test]
    fn lookup_excludes_incoming_face_loop() {
        let mut fib = Fib::new("n1", 16);
        fib.add(FibEntry::new(Name::from_string("/x"), vec![face(1)]));
        let hit = fib.lookup(&Name::from_string("/x/y"), &[], &[face(1)]);
        assert!(hit.is_none());
    }

    #[test]
    fn clear_preserves_static_entries() {
        let mut fib = Fib::new("n1", 16);
        fib.add(FibEntry::new(Name::from_string("/a"), vec![face(1)]).static_entry());
        fib.add(FibEntry::new(Name::from_string("/b"), vec![face(2)]));
        fib.clear();
        assert_eq!(fib.len(), 1);
        assert!(fib.lookup(&Name::from_string("/a"), &[], &[]).is_some());
    }

    #[test]
    fn add_merges_upstreams_for_same_name() {
        let mut fib = Fib::new("n1", 16);
        fib.add(FibEntry::new(Name::from_string("/x"), vec![face(1)]));
        fib.add(FibEntry::new(Name::from_string("/x"), vec![face(2)]));
        assert_eq!(fib.len(), 1);
        let hit = fib.lookup(&Name::from_string("/x"), &[], &[]).unwrap();
        assert_eq!(hit.upstreams, vec![face(1), face(2)]);
    }
}
