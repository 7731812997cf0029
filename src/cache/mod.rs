//! Process-local memo of verification outcomes.
//!
//! Entries expire lazily: a lookup treats anything at least as old as its TTL
//! as missing. Probe failures get a shorter TTL than conclusive outcomes, and
//! the map is capped; inserting past the cap first drops expired entries and
//! then the oldest one.

mod clock;
mod options;

pub use clock::{Clock, SystemClock};
pub use options::CacheOptions;

#[cfg(test)]
pub(crate) use clock::ManualClock;

use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

use parking_lot::Mutex;

use crate::verifier::Status;

#[derive(Debug, Clone)]
struct CacheEntry {
    status: Status,
    stored_at: Instant,
    /// `None` when `stored_at + ttl` is not representable.
    expires_at: Option<Instant>,
    seq: u64,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|expires_at| now >= expires_at)
    }
}

/// Entries plus two orderings over them, so eviction never scans the map.
/// `seq` disambiguates entries stored at the same instant.
#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<String, CacheEntry>,
    by_age: BTreeMap<(Instant, u64), String>,
    by_expiry: BTreeMap<(Instant, u64), String>,
    next_seq: u64,
}

impl CacheState {
    fn insert(&mut self, address: &str, status: Status, stored_at: Instant, options: &CacheOptions) {
        self.remove(address);
        let seq = self.next_seq;
        self.next_seq += 1;
        let expires_at = stored_at.checked_add(options.ttl_for(&status));
        self.by_age.insert((stored_at, seq), address.to_string());
        if let Some(expires_at) = expires_at {
            self.by_expiry.insert((expires_at, seq), address.to_string());
        }
        self.entries.insert(
            address.to_string(),
            CacheEntry {
                status,
                stored_at,
                expires_at,
                seq,
            },
        );
    }

    fn remove(&mut self, address: &str) -> Option<CacheEntry> {
        let entry = self.entries.remove(address)?;
        self.unindex(&entry);
        Some(entry)
    }

    fn unindex(&mut self, entry: &CacheEntry) {
        self.by_age.remove(&(entry.stored_at, entry.seq));
        if let Some(expires_at) = entry.expires_at {
            self.by_expiry.remove(&(expires_at, entry.seq));
        }
    }

    fn evict_expired(&mut self, now: Instant) {
        while let Some(slot) = self.by_expiry.first_entry() {
            if slot.key().0 > now {
                break;
            }
            let address = slot.remove();
            if let Some(entry) = self.entries.remove(&address) {
                self.by_age.remove(&(entry.stored_at, entry.seq));
            }
        }
    }

    fn evict_oldest(&mut self) -> bool {
        let Some((_, address)) = self.by_age.pop_first() else {
            return false;
        };
        tracing::debug!(evicted = %address, "cache at capacity");
        if let Some(entry) = self.entries.remove(&address) {
            if let Some(expires_at) = entry.expires_at {
                self.by_expiry.remove(&(expires_at, entry.seq));
            }
        }
        true
    }
}

/// Thread-safe map from normalized address to its last outcome.
#[derive(Debug)]
pub struct VerificationCache {
    options: CacheOptions,
    state: Mutex<CacheState>,
}

impl Default for VerificationCache {
    fn default() -> Self {
        Self::new(CacheOptions::default())
    }
}

impl VerificationCache {
    pub fn new(options: CacheOptions) -> Self {
        Self {
            options,
            state: Mutex::new(CacheState::default()),
        }
    }

    pub fn options(&self) -> &CacheOptions {
        &self.options
    }

    /// Fresh status for `address` at `now`, or `None` when absent or stale.
    pub fn lookup(&self, address: &str, now: Instant) -> Option<Status> {
        let state = self.state.lock();
        let entry = state.entries.get(address)?;
        if entry.is_expired(now) {
            return None;
        }
        Some(entry.status.clone())
    }

    /// Record `status` for `address`, overwriting any previous entry.
    pub fn store(&self, address: &str, status: Status, stored_at: Instant) {
        if self.options.capacity == 0 || matches!(status, Status::Cancelled) {
            return;
        }
        let mut state = self.state.lock();
        if !state.entries.contains_key(address) && state.entries.len() >= self.options.capacity {
            state.evict_expired(stored_at);
            while state.entries.len() >= self.options.capacity && state.evict_oldest() {}
        }
        state.insert(address, status, stored_at, &self.options);
    }

    /// Forget `address`; the next verification probes again.
    pub fn invalidate(&self, address: &str) -> bool {
        self.state.lock().remove(address).is_some()
    }

    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.entries.clear();
        state.by_age.clear();
        state.by_expiry.clear();
    }

    /// Number of stored entries, stale ones included.
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
