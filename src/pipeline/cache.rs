use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::video::{FrameBuffer, FrameFingerprint};

/// Identifies one transformed frame: which effect, which active parameter
/// values, which input content.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub effect_id: Arc<str>,
    pub params_digest: u64,
    pub fingerprint: FrameFingerprint,
}

impl CacheKey {
    pub fn new(effect_id: Arc<str>, params_digest: u64, fingerprint: FrameFingerprint) -> Self {
        Self {
            effect_id,
            params_digest,
            fingerprint,
        }
    }
}

#[derive(Debug)]
struct CacheEntry {
    output: Arc<FrameBuffer>,
    last_access: u64,
}

/// Bounded least-recently-used cache of effect outputs
///
/// Recency is tracked with a monotonically increasing access tick; the
/// `recency` index maps each entry's tick back to its key so the oldest entry
/// is always the first one in the map. A capacity of zero disables caching.
#[derive(Debug)]
pub struct FrameCache {
    capacity: usize,
    entries: HashMap<CacheKey, CacheEntry>,
    recency: BTreeMap<u64, CacheKey>,
    tick: u64,
    evictions: u64,
}

impl FrameCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: HashMap::with_capacity(capacity),
            recency: BTreeMap::new(),
            tick: 0,
            evictions: 0,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.capacity > 0
    }

    /// Look up an entry and mark it most recently used
    pub fn get(&mut self, key: &CacheKey) -> Option<Arc<FrameBuffer>> {
        let entry = self.entries.get_mut(key)?;
        self.tick += 1;
        self.recency.remove(&entry.last_access);
        entry.last_access = self.tick;
        self.recency.insert(self.tick, key.clone());
        Some(Arc::clone(&entry.output))
    }

    /// Insert an output, returning whatever was pushed out to make room
    pub fn insert(&mut self, key: CacheKey, output: Arc<FrameBuffer>) -> Vec<Arc<FrameBuffer>> {
        let mut displaced = Vec::new();
        if !self.is_enabled() {
            return displaced;
        }

        self.tick += 1;
        if let Some(old) = self.entries.remove(&key) {
            self.recency.remove(&old.last_access);
            displaced.push(old.output);
        }

        while self.entries.len() >= self.capacity {
            let Some((_, oldest)) = self.recency.pop_first() else {
                break;
            };
            if let Some(evicted) = self.entries.remove(&oldest) {
                self.evictions += 1;
                displaced.push(evicted.output);
            }
        }

        self.recency.insert(self.tick, key.clone());
        self.entries.insert(
            key,
            CacheEntry {
                output,
                last_access: self.tick,
            },
        );
        displaced
    }

    /// Drop every entry produced by one effect
    pub fn invalidate_effect(&mut self, effect_id: &str) -> Vec<Arc<FrameBuffer>> {
        let stale: Vec<CacheKey> = self
            .entries
            .keys()
            .filter(|k| &*k.effect_id == effect_id)
            .cloned()
            .collect();

        stale
            .into_iter()
            .filter_map(|key| {
                let entry = self.entries.remove(&key)?;
                self.recency.remove(&entry.last_access);
                Some(entry.output)
            })
            .collect()
    }

    pub fn clear(&mut self) -> Vec<Arc<FrameBuffer>> {
        self.recency.clear();
        self.entries.drain().map(|(_, entry)| entry.output).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Entries dropped to respect the capacity
    pub fn evictions(&self) -> u64 {
        self.evictions
    }
}
