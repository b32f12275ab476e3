//! # TTL Cache
//!
//! Keyed cache where every entry carries an expiry deadline. Reading an
//! entry pushes the deadline out again, so hot chunks stay resident.
//!
//! A random jitter is added to every deadline so a burst of chunks loaded
//! together does not expire in the same cleanup pass. The jitter stream is
//! seeded by the owner, which keeps tests reproducible.
//!
//! Eviction is explicit: nothing happens until `cleanup` is called.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

/// Deadline used when `now + ttl` does not fit in an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(60 * 60 * 24 * 365 * 30);

/// Cache with per-entry time-to-live and a soft size cap.
pub struct TtlCache<K, V> {
    entries: BTreeMap<K, Entry<V>>,
    ttl: Duration,
    jitter: Duration,
    max_size: usize,
    rng: ChaCha8Rng,
}

impl<K: Ord + Clone, V> TtlCache<K, V> {
    /// Creates an empty cache. `max_size == 0` means unbounded.
    #[must_use]
    pub fn new(ttl: Duration, jitter: Duration, max_size: usize, jitter_seed: u64) -> Self {
        Self {
            entries: BTreeMap::new(),
            ttl,
            jitter,
            max_size,
            rng: ChaCha8Rng::seed_from_u64(jitter_seed),
        }
    }

    fn deadline(&mut self, now: Instant) -> Instant {
        let jitter_ms = u64::try_from(self.jitter.as_millis()).unwrap_or(u64::MAX);
        let extra = if jitter_ms == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(self.rng.gen_range(0..=jitter_ms))
        };
        now.checked_add(self.ttl.saturating_add(extra))
            .or_else(|| now.checked_add(FAR_FUTURE))
            .unwrap_or(now)
    }

    /// Returns an entry and refreshes its deadline.
    pub fn get(&mut self, key: &K) -> Option<&V> {
        self.get_mut(key).map(|v| &*v)
    }

    /// Mutable access; refreshes the deadline.
    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        if !self.entries.contains_key(key) {
            return None;
        }
        let deadline = self.deadline(Instant::now());
        self.entries.get_mut(key).map(|entry| {
            entry.expires_at = deadline;
            &mut entry.value
        })
    }

    /// Returns an entry without touching its deadline.
    #[must_use]
    pub fn peek(&self, key: &K) -> Option<&V> {
        self.entries.get(key).map(|entry| &entry.value)
    }

    /// Returns true if `key` is resident.
    #[must_use]
    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// Inserts or replaces an entry, returning the previous value.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        let expires_at = self.deadline(Instant::now());
        self.entries
            .insert(key, Entry { value, expires_at })
            .map(|old| old.value)
    }

    /// Removes an entry.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.entries.remove(key).map(|entry| entry.value)
    }

    /// Evicts expired entries, then the soonest-expiring entries until the
    /// cache fits `max_size`. Returns evicted keys in eviction order.
    pub fn cleanup(&mut self) -> Vec<K> {
        self.cleanup_at(Instant::now())
    }

    /// [`Self::cleanup`] against an explicit clock reading.
    pub fn cleanup_at(&mut self, now: Instant) -> Vec<K> {
        let mut evicted: Vec<K> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.expires_at <= now)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &evicted {
            self.entries.remove(key);
        }

        if self.max_size > 0 && self.entries.len() > self.max_size {
            let mut by_deadline: Vec<(Instant, K)> = self
                .entries
                .iter()
                .map(|(key, entry)| (entry.expires_at, key.clone()))
                .collect();
            by_deadline.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));

            let excess = self.entries.len() - self.max_size;
            for (_, key) in by_deadline.into_iter().take(excess) {
                self.entries.remove(&key);
                evicted.push(key);
            }
        }

        evicted
    }

    /// Resident keys in order.
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.entries.keys()
    }

    /// Number of resident entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is resident.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
