//! Bounded in-process cache with LRU eviction and per-entry TTL.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;

use crate::entry::CacheEntry;

/// Snapshot of L1 counters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct L1Stats {
    pub hits: u64,
    pub misses: u64,
    pub size: usize,
    /// `hits / (hits + misses)`, `0.0` before the first lookup.
    pub hit_rate: f64,
    pub evictions: u64,
    pub expirations: u64,
}

#[derive(Debug)]
struct Node {
    key: String,
    entry: Arc<CacheEntry>,
    expires_at: Instant,
    prev: Option<usize>,
    next: Option<usize>,
}

/// Recency list threaded through a dense node vector.
///
/// `head` is the most recently touched node, `tail` the eviction candidate.
/// Removal swaps the last node into the freed slot so indices stay dense.
#[derive(Debug, Default)]
struct LruState {
    nodes: Vec<Node>,
    index: HashMap<String, usize>,
    head: Option<usize>,
    tail: Option<usize>,
    hits: u64,
    misses: u64,
    evictions: u64,
    expirations: u64,
}

impl LruState {
    fn unlink(&mut self, idx: usize) {
        let (prev, next) = (self.nodes[idx].prev, self.nodes[idx].next);
        match prev {
            Some(p) => self.nodes[p].next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.nodes[n].prev = prev,
            None => self.tail = prev,
        }
        self.nodes[idx].prev = None;
        self.nodes[idx].next = None;
    }

    fn push_front(&mut self, idx: usize) {
        self.nodes[idx].prev = None;
        self.nodes[idx].next = self.head;
        if let Some(head) = self.head {
            self.nodes[head].prev = Some(idx);
        }
        self.head = Some(idx);
        if self.tail.is_none() {
            self.tail = Some(idx);
        }
    }

    fn touch(&mut self, idx: usize) {
        if self.head != Some(idx) {
            self.unlink(idx);
            self.push_front(idx);
        }
    }

    fn remove_at(&mut self, idx: usize) -> Node {
        self.unlink(idx);
        let last = self.nodes.len() - 1;
        let node = self.nodes.swap_remove(idx);
        self.index.remove(&node.key);

        if idx != last {
            // The node formerly at `last` now lives at `idx`.
            let (prev, next) = (self.nodes[idx].prev, self.nodes[idx].next);
            match prev {
                Some(p) => self.nodes[p].next = Some(idx),
                None => self.head = Some(idx),
            }
            match next {
                Some(n) => self.nodes[n].prev = Some(idx),
                None => self.tail = Some(idx),
            }
            if let Some(slot) = self.index.get_mut(&self.nodes[idx].key) {
                *slot = idx;
            }
        }
        node
    }

    fn clear(&mut self) {
        self.nodes.clear();
        self.index.clear();
        self.head = None;
        self.tail = None;
    }
}

/// The L1 tier.
///
/// All operations take one short critical section; none of them awaits.
#[derive(Debug)]
pub struct L1Cache {
    state: Mutex<LruState>,
    max_size: usize,
    ttl: Duration,
}

impl L1Cache {
    /// Create an empty cache holding at most `max_size` entries for `ttl` each.
    pub fn new(max_size: usize, ttl: Duration) -> Self {
        Self {
            state: Mutex::new(LruState::default()),
            max_size: max_size.max(1),
            ttl,
        }
    }

    /// Default lifetime of entries.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Look up a live entry, marking it most recently used.
    ///
    /// An expired entry is removed and counts as a miss.
    pub fn get(&self, key: &str) -> Option<Arc<CacheEntry>> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let Some(&idx) = state.index.get(key) else {
            state.misses += 1;
            return None;
        };

        if state.nodes[idx].expires_at <= Instant::now() {
            state.remove_at(idx);
            state.expirations += 1;
            state.misses += 1;
            return None;
        }

        state.touch(idx);
        state.hits += 1;
        Some(Arc::clone(&state.nodes[idx].entry))
    }

    /// Look up a live entry without touching recency or counters.
    pub fn peek(&self, key: &str) -> Option<Arc<CacheEntry>> {
        let state = self.state.lock();
        let idx = *state.index.get(key)?;
        let node = &state.nodes[idx];
        (node.expires_at > Instant::now()).then(|| Arc::clone(&node.entry))
    }

    /// Insert or replace an entry with the default TTL.
    pub fn set(&self, key: &str, entry: impl Into<Arc<CacheEntry>>) {
        self.set_with_ttl(key, entry, self.ttl);
    }

    /// Insert or replace an entry that expires after `ttl`.
    ///
    /// Replacing refreshes both recency and expiry. Inserting a new key
    /// into a full cache evicts exactly the least recently used entry.
    pub fn set_with_ttl(&self, key: &str, entry: impl Into<Arc<CacheEntry>>, ttl: Duration) {
        let entry = entry.into();
        let expires_at = Instant::now() + ttl;
        let mut guard = self.state.lock();
        let state = &mut *guard;

        if let Some(&idx) = state.index.get(key) {
            let node = &mut state.nodes[idx];
            node.entry = entry;
            node.expires_at = expires_at;
            state.touch(idx);
            return;
        }

        let idx = state.nodes.len();
        state.nodes.push(Node {
            key: key.to_string(),
            entry,
            expires_at,
            prev: None,
            next: None,
        });
        state.index.insert(key.to_string(), idx);
        state.push_front(idx);

        if state.nodes.len() > self.max_size {
            if let Some(tail) = state.tail {
                let evicted = state.remove_at(tail);
                if evicted.expires_at <= Instant::now() {
                    state.expirations += 1;
                } else {
                    state.evictions += 1;
                }
            }
        }
    }

    /// Remove an entry. Returns whether it was present.
    pub fn delete(&self, key: &str) -> bool {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        match state.index.get(key).copied() {
            Some(idx) => {
                state.remove_at(idx);
                true
            }
            None => false,
        }
    }

    /// Drop every entry. Counters are kept.
    pub fn clear(&self) {
        self.state.lock().clear();
    }

    /// Remove expired entries, walking from the least recently used end.
    ///
    /// The walk stops at the first live entry, so an expired entry that was
    /// touched recently waits for its lookup or a later sweep.
    pub fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let mut removed = 0;
        while let Some(tail) = state.tail {
            if state.nodes[tail].expires_at > now {
                break;
            }
            state.remove_at(tail);
            removed += 1;
        }
        state.expirations += removed as u64;
        removed
    }

    /// Up to `limit` live keys, most recently used first.
    pub fn keys(&self, limit: usize) -> Vec<String> {
        let now = Instant::now();
        let state = self.state.lock();
        let mut keys = Vec::with_capacity(limit.min(state.nodes.len()));
        let mut cursor = state.head;
        while let Some(idx) = cursor {
            if keys.len() >= limit {
                break;
            }
            let node = &state.nodes[idx];
            if node.expires_at > now {
                keys.push(node.key.clone());
            }
            cursor = node.next;
        }
        keys
    }

    /// Number of stored entries, including expired ones not yet removed.
    pub fn len(&self) -> usize {
        self.state.lock().nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get_stats(&self) -> L1Stats {
        let state = self.state.lock();
        let lookups = state.hits + state.misses;
        L1Stats {
            hits: state.hits,
            misses: state.misses,
            size: state.nodes.len(),
            hit_rate: if lookups == 0 {
                0.0
            } else {
                state.hits as f64 / lookups as f64
            },
            evictions: state.evictions,
            expirations: state.expirations,
        }
    }
}
