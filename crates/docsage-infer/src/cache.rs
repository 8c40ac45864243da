//! Bounded query-embedding cache.
//!
//! Repeated questions in a chat session skip model inference. Entries expire
//! after a TTL and the least recently used entry is evicted at capacity.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use ndarray::Array1;
use parking_lot::Mutex;

struct CacheEntry {
    embedding: Array1<f32>,
    inserted_at: Instant,
}

/// Hit/miss counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

/// Thread-safe LRU cache keyed by query text.
pub struct QueryCache {
    inner: Mutex<CacheInner>,
}

struct CacheInner {
    entries: HashMap<String, CacheEntry>,
    /// Least recently used at the front.
    recency: VecDeque<String>,
    capacity: usize,
    ttl: Duration,
    hits: u64,
    misses: u64,
}

impl CacheInner {
    fn touch(&mut self, key: &str) {
        if let Some(pos) = self.recency.iter().position(|k| k == key) {
            if let Some(k) = self.recency.remove(pos) {
                self.recency.push_back(k);
            }
        }
    }

    fn evict(&mut self, key: &str) {
        self.entries.remove(key);
        self.recency.retain(|k| k != key);
    }
}

impl QueryCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                entries: HashMap::with_capacity(capacity),
                recency: VecDeque::with_capacity(capacity),
                capacity: capacity.max(1),
                ttl,
                hits: 0,
                misses: 0,
            }),
        }
    }

    /// 1000 entries, one hour TTL.
    pub fn default_cache() -> Self {
        Self::new(1000, Duration::from_secs(3600))
    }

    pub fn get(&self, query: &str) -> Option<Array1<f32>> {
        let mut inner = self.inner.lock();
        let ttl = inner.ttl;

        let lookup = inner
            .entries
            .get(query)
            .map(|e| (e.inserted_at.elapsed() < ttl, e.embedding.clone()));

        match lookup {
            Some((true, embedding)) => {
                inner.touch(query);
                inner.hits += 1;
                Some(embedding)
            }
            Some((false, _)) => {
                inner.evict(query);
                inner.misses += 1;
                None
            }
            None => {
                inner.misses += 1;
                None
            }
        }
    }

    pub fn put(&self, query: String, embedding: Array1<f32>) {
        let mut inner = self.inner.lock();

        if inner.entries.contains_key(&query) {
            inner.touch(&query);
        } else {
            while inner.entries.len() >= inner.capacity {
                match inner.recency.pop_front() {
                    Some(oldest) => {
                        inner.entries.remove(&oldest);
                    }
                    None => break,
                }
            }
            inner.recency.push_back(query.clone());
        }

        inner.entries.insert(
            query,
            CacheEntry {
                embedding,
                inserted_at: Instant::now(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        CacheStats {
            hits: inner.hits,
            misses: inner.misses,
            entries: inner.entries.len(),
        }
    }
}
