use std::{
    collections::{BTreeMap, HashMap},
    hash::{BuildHasher, RandomState},
};

use crossbeam_utils::CachePadded;
use parking_lot::RwLock;

use crate::{CachedMapping, shared_cache_key};

const SHARDS: usize = 16;

/// Identity of a mapping inside the resolver's caches.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) struct CacheKey {
    pub(crate) tenant_id: i64,
    pub(crate) type_name: String,
    pub(crate) public_id: String,
}

impl CacheKey {
    pub(crate) fn new(tenant_id: i64, type_name: &str, public_id: &str) -> Self {
        Self {
            tenant_id,
            type_name: type_name.to_owned(),
            public_id: public_id.to_owned(),
        }
    }

    pub(crate) fn shared_key(&self) -> String {
        shared_cache_key(self.tenant_id, &self.type_name, &self.public_id)
    }
}

#[derive(Clone, Copy, Debug)]
struct Entry {
    mapping: CachedMapping,
    expires_at_ms: u64,
    seq: u64,
}

#[derive(Debug, Default)]
struct Shard {
    entries: HashMap<CacheKey, Entry>,
    /// Every entry keyed by `(expires_at_ms, seq)`, soonest expiry first.
    expiry: BTreeMap<(u64, u64), CacheKey>,
    next_seq: u64,
}

impl Shard {
    fn remove(&mut self, key: &CacheKey) -> Option<Entry> {
        let entry = self.entries.remove(key)?;
        self.expiry.remove(&(entry.expires_at_ms, entry.seq));
        Some(entry)
    }

    /// Drops expired entries, then the soonest-expiring ones until a new
    /// entry fits.
    fn make_room(&mut self, now_ms: u64, capacity: usize) {
        while let Some(first) = self.expiry.first_entry() {
            let (expires_at_ms, _) = *first.key();
            if expires_at_ms > now_ms && self.entries.len() < capacity {
                break;
            }
            let key = first.remove();
            self.entries.remove(&key);
        }
    }

    fn insert(&mut self, key: CacheKey, mapping: CachedMapping, expires_at_ms: u64) {
        let seq = self.next_seq;
        self.next_seq = self.next_seq.wrapping_add(1);
        self.expiry.insert((expires_at_ms, seq), key.clone());
        self.entries.insert(
            key,
            Entry {
                mapping,
                expires_at_ms,
                seq,
            },
        );
    }
}

/// Bounded in-process map with per-entry expiry.
///
/// Keys are spread over a fixed number of shards; readers take the shard's
/// shared lock and writers its exclusive lock, never more than one shard at a
/// time. Each shard indexes its entries by expiry, so a full shard drops its
/// expired entries and then the entry closest to expiry in `O(log n)` per
/// entry.
#[derive(Debug)]
pub(crate) struct LocalCache {
    shards: Box<[CachePadded<RwLock<Shard>>]>,
    shard_capacity: usize,
    hasher: RandomState,
}

impl LocalCache {
    pub(crate) fn new(max_entries: usize) -> Self {
        Self::with_shards(SHARDS, max_entries)
    }

    fn with_shards(shards: usize, max_entries: usize) -> Self {
        let shards = shards.max(1);
        Self {
            shards: (0..shards)
                .map(|_| CachePadded::new(RwLock::new(Shard::default())))
                .collect(),
            shard_capacity: max_entries.div_ceil(shards).max(1),
            hasher: RandomState::new(),
        }
    }

    #[inline]
    fn shard(&self, key: &CacheKey) -> &RwLock<Shard> {
        let index = (self.hasher.hash_one(key) as usize) % self.shards.len();
        &self.shards[index]
    }

    pub(crate) fn get(&self, key: &CacheKey, now_ms: u64) -> Option<CachedMapping> {
        let shard = self.shard(key).read();
        shard
            .entries
            .get(key)
            .filter(|entry| entry.expires_at_ms > now_ms)
            .map(|entry| entry.mapping)
    }

    pub(crate) fn put(&self, key: CacheKey, mapping: CachedMapping, now_ms: u64, ttl_ms: u64) {
        let expires_at_ms = now_ms.saturating_add(ttl_ms);
        let mut shard = self.shard(&key).write();
        shard.remove(&key);
        shard.make_room(now_ms, self.shard_capacity);
        shard.insert(key, mapping, expires_at_ms);
    }

    pub(crate) fn evict(&self, key: &CacheKey) {
        self.shard(key).write().remove(key);
    }

    pub(crate) fn len(&self) -> usize {
        self.shards.iter().map(|shard| shard.read().entries.len()).sum()
    }
}
