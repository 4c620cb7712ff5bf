//! Content Store: a bounded, LRU/TTL-evicted cache of `Content` keyed by
//! exact name.

use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

use rust_udcn_common::ndn::{Content, Name};

/// A single Content Store entry.
struct CsEntry {
    content: Content,
    last_access: Instant,
    /// Logical recency counter, used to find the least-recently-used entry
    /// without maintaining a separate ordered index.
    recency: u64,
    /// Static entries are seeded by management and never aged out.
    is_static: bool,
}

/// Cache of recently observed `Content`, indexed by exact name.
///
/// Every entry's name is unique within the store (§3.1); insertion overwrites
/// any prior entry for the same name and counts as a fresh access.
pub struct ContentStore {
    node_name: String,
    capacity: usize,
    default_ttl: Duration,
    entries: HashMap<Name, CsEntry>,
    clock: u64,
}

impl ContentStore {
    pub fn new(node_name: impl Into<String>, capacity: usize, default_ttl: Duration) -> Self {
        Self {
            node_name: node_name.into(),
            capacity,
            default_ttl,
            entries: HashMap::new(),
            clock: 0,
        }
    }

    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    /// Inserts or overwrites the entry for `content.name`. Not static.
    pub fn insert(&mut self, content: Content) {
        self.insert_with(content, false)
    }

    /// Inserts a static entry that `ageing()` never evicts.
    pub fn insert_static(&mut self, content: Content) {
        self.insert_with(content, true)
    }

    fn insert_with(&mut self, content: Content, is_static: bool) {
        if !self.entries.contains_key(&content.name) && self.entries.len() >= self.capacity {
            self.evict_lru();
        }
        let recency = self.tick();
        self.entries.insert(
            content.name.clone(),
            CsEntry {
                content,
                last_access: Instant::now(),
                recency,
                is_static,
            },
        );
    }

    /// Looks up `name`, refreshing the entry's recency and timestamp on hit
    /// (§3.1: "an entry's timestamp advances monotonically on read").
    pub fn get(&mut self, name: &Name) -> Option<Content> {
        let recency = self.clock + 1;
        let entry = self.entries.get_mut(name)?;
        entry.last_access = Instant::now();
        entry.recency = recency;
        self.clock = recency;
        Some(entry.content.clone())
    }

    /// Looks up `name` without affecting recency or timestamp.
    pub fn peek(&self, name: &Name) -> Option<&Content> {
        self.entries.get(name).map(|e| &e.content)
    }

    pub fn remove(&mut self, name: &Name) -> Option<Content> {
        self.entries.remove(name).map(|e| e.content)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn evict_lru(&mut self) {
        let victim = self
            .entries
            .iter()
            .filter(|(_, e)| !e.is_static)
            .min_by_key(|(_, e)| e.recency)
            .map(|(name, _)| name.clone());
        if let Some(name) = victim {
            self.entries.remove(&name);
        }
    }

    /// Evicts non-static entries whose age exceeds the store's default TTL.
    /// Returns the number of entries evicted.
    pub fn ageing(&mut self) -> usize {
        let ttl = self.default_ttl;
        let before = self.entries.len();
        self.entries
            .retain(|_, e| e.is_static || e.last_access.elapsed() <= ttl);
        before - self.entries.len()
    }

    pub fn clear_non_static(&mut self) {
        self.entries.retain(|_, e| e.is_static);
    }
}

impl fmt::Display for ContentStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ContentStore[{}]({} / {})",
            self.node_name,
            self.entries.len(),
            self.capacity
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn content(name: &str, payload: &str) -> Content {
        Content::new(Name::from_string(name), payload.to_string())
    }

    #[test]
    fn insert_then_get_returns_same_payload() {
        let mut cs = ContentStore::new("n1", 16, Duration::from_secs(10));
        cs.insert(content("/test/data/object", "HelloWorld"));
        let got = cs.get(&Name::from_string("/test/data/object")).unwrap();
        assert_eq!(got.payload, "HelloWorld".as_bytes());
    }

    #[test]
    fn insert_same_name_twice_leaves_single_entry() {
        let mut cs = ContentStore::new("n1", 16, Duration::from_secs(10));
        cs.insert(content("/a/b", "v1"));
        cs.insert(content("/a/b", "v2"));
        assert_eq!(cs.len(), 1);
        assert_eq!(
            cs.peek(&Name::from_string("/a/b")).unwrap().payload,
            "v2".as_bytes()
        );
    }

    #[test]
    fn capacity_overflow_evicts_least_recently_used() {
        let mut cs = ContentStore::new("n1", 2, Duration::from_secs(10));
        cs.insert(content("/a", "1"));
        cs.insert(content("/b", "2"));
        // touch /a so /b becomes the LRU victim
        cs.get(&Name::from_string("/a"));
        cs.insert(content("/c", "3"));
        assert!(cs.peek(&Name::from_string("/b")).is_none());
        assert!(cs.peek(&Name::from_string("/a")).is_some());
        assert!(cs.peek(&Name::from_string("/c")).is_some());
    }

    #[test]
    fn static_entries_survive_ageing_and_eviction() {
        let mut cs = ContentStore::new("n1", 1, Duration::from_millis(0));
        cs.insert_static(content("/static/a", "keep"));
        cs.insert(content("/dynamic/b", "drop-me"));
        assert!(cs.peek(&Name::from_string("/static/a")).is_some());
        let evicted = cs.ageing();
        assert_eq!(evicted, 1);
        assert!(cs.peek(&Name::from_string("/static/a")).is_some());
    }
}
