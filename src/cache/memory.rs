//! In-process cache store.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use super::{effective_ttl, CacheStore};
use crate::error::Result;

struct MemoryEntry {
    value: Vec<u8>,
    expires_at: Option<Instant>,
    seq: u64,
}

impl MemoryEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.map(|at| now >= at).unwrap_or(false)
    }
}

#[derive(Default)]
struct Inner {
    entries: HashMap<String, MemoryEntry>,
    next_seq: u64,
}

/// Same TTL and threshold rules as [`FileSystemCache`](super::FileSystemCache),
/// with insertion order standing in for file age.
pub struct MemoryCache {
    inner: Mutex<Inner>,
    threshold: usize,
    default_ttl: Option<Duration>,
}

impl MemoryCache {
    pub fn new(threshold: usize, default_ttl: Option<Duration>) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            threshold,
            default_ttl,
        }
    }

    fn prune(inner: &mut Inner, threshold: usize) {
        if threshold == 0 || inner.entries.len() < threshold {
            return;
        }
        let now = Instant::now();
        inner.entries.retain(|_, entry| !entry.is_expired(now));
        while inner.entries.len() >= threshold {
            let oldest = inner
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.seq)
                .map(|(key, _)| key.clone());
            match oldest {
                Some(key) => {
                    inner.entries.remove(&key);
                }
                None => break,
            }
        }
    }
}

impl CacheStore for MemoryCache {
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        let mut inner = self.inner.lock().ok()?;
        let now = Instant::now();
        if inner.entries.get(key)?.is_expired(now) {
            inner.entries.remove(key);
            return None;
        }
        inner.entries.get(key).map(|entry| entry.value.clone())
    }

    fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<()> {
        let Ok(mut inner) = self.inner.lock() else {
            log::warn!("Memory cache lock poisoned, dropping write for {}", key);
            return Ok(());
        };
        if !inner.entries.contains_key(key) {
            Self::prune(&mut inner, self.threshold);
        }
        let seq = inner.next_seq;
        inner.next_seq += 1;
        let expires_at = effective_ttl(ttl, self.default_ttl).map(|ttl| Instant::now() + ttl);
        inner.entries.insert(
            key.to_string(),
            MemoryEntry {
                value: value.to_vec(),
                expires_at,
                seq,
            },
        );
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<bool> {
        Ok(self
            .inner
            .lock()
            .map(|mut inner| inner.entries.remove(key).is_some())
            .unwrap_or(false))
    }

    fn clear(&self) -> Result<()> {
        if let Ok(mut inner) = self.inner.lock() {
            inner.entries.clear();
        }
        Ok(())
    }

    fn len(&self) -> usize {
        self.inner.lock().map(|inner| inner.entries.len()).unwrap_or(0)
    }
}
