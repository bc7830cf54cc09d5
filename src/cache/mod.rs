//! Two-tier cache: serialized metadata and raw downloaded blobs.
//!
//! Both tiers sit on top of a [`CacheStore`], a string-keyed byte store with
//! per-entry TTL and an optional entry-count threshold. The cache is a pure
//! performance layer: every read has a network fallback at the call site, so
//! unreadable or undecodable entries behave like misses and failed writes are
//! only logged.

pub mod fs;
pub mod keys;
pub mod memory;

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

use crate::config::CacheConfig;
use crate::error::Result;
use crate::models::{Chapter, ChapterImage, Manga};

pub use fs::FileSystemCache;
pub use memory::MemoryCache;

/// String-keyed byte store with expiry.
///
/// `ttl: None` uses the store's default timeout, `Some(Duration::ZERO)` never
/// expires. Implementations must tolerate concurrent use; the last write for
/// a key wins.
pub trait CacheStore: Send + Sync {
    fn get(&self, key: &str) -> Option<Vec<u8>>;
    fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<()>;
    fn delete(&self, key: &str) -> Result<bool>;
    fn clear(&self) -> Result<()>;
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Resolve the effective TTL for a write, `None` meaning the entry never expires.
pub(crate) fn effective_ttl(ttl: Option<Duration>, default: Option<Duration>) -> Option<Duration> {
    match ttl {
        Some(ttl) if ttl.is_zero() => None,
        Some(ttl) => Some(ttl),
        None => default,
    }
}

/// Metadata tier: search results, chapter and image lists, single entities.
pub struct MetadataCache {
    store: Box<dyn CacheStore>,
    list_ttl: Duration,
}

impl MetadataCache {
    pub fn new(store: Box<dyn CacheStore>, list_ttl: Duration) -> Self {
        Self { store, list_ttl }
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.store.get(key)?;
        match serde_json::from_slice(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                log::debug!("Discarding undecodable cache entry {}: {}", key, e);
                None
            }
        }
    }

    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl: Option<Duration>) {
        let encoded = match serde_json::to_vec(value) {
            Ok(encoded) => encoded,
            Err(e) => {
                log::warn!("Could not encode cache entry {}: {}", key, e);
                return;
            }
        };
        if let Err(e) = self.store.set(key, &encoded, ttl) {
            log::warn!("Could not write cache entry {}: {}", key, e);
        }
    }

    /// Cached record for a manga URL seen in an earlier search
    pub fn manga(&self, url: &str) -> Option<Manga> {
        self.get(url)
    }

    /// Cached record for a chapter URL seen in an earlier listing
    pub fn chapter(&self, url: &str) -> Option<Chapter> {
        self.get(url)
    }

    pub fn search_results(&self, key: &str) -> Option<Vec<Manga>> {
        self.get(key)
    }

    /// Store a search result list and every manga under its own URL.
    pub fn put_search_results(&self, key: &str, mangas: &[Manga]) {
        self.set(key, mangas, Some(self.list_ttl));
        for manga in mangas {
            self.set(&manga.url, manga, None);
        }
    }

    pub fn chapters(&self, manga_url: &str) -> Option<Vec<Chapter>> {
        self.get(&keys::chapters_key(manga_url))
    }

    /// Store a chapter list and every chapter under its own URL.
    pub fn put_chapters(&self, manga_url: &str, chapters: &[Chapter]) {
        self.set(&keys::chapters_key(manga_url), chapters, Some(self.list_ttl));
        for chapter in chapters {
            self.set(&chapter.url, chapter, None);
        }
    }

    pub fn images(&self, chapter_url: &str) -> Option<Vec<ChapterImage>> {
        self.get(&keys::images_key(chapter_url))
    }

    pub fn put_images(&self, chapter_url: &str, images: &[ChapterImage]) {
        self.set(&keys::images_key(chapter_url), images, Some(self.list_ttl));
    }

    pub fn store(&self) -> &dyn CacheStore {
        self.store.as_ref()
    }
}

/// Blob tier: raw bytes keyed by their remote URL.
pub struct BlobCache {
    store: Box<dyn CacheStore>,
}

impl BlobCache {
    pub fn new(store: Box<dyn CacheStore>) -> Self {
        Self { store }
    }

    pub fn get(&self, url: &str) -> Option<Vec<u8>> {
        self.store.get(url)
    }

    pub fn set(&self, url: &str, bytes: &[u8]) {
        if let Err(e) = self.store.set(url, bytes, None) {
            log::warn!("Could not write blob {}: {}", url, e);
        }
    }

    pub fn store(&self) -> &dyn CacheStore {
        self.store.as_ref()
    }
}

/// Both cache tiers, built once at startup and shared by reference.
pub struct CacheLayer {
    pub metadata: MetadataCache,
    pub blobs: BlobCache,
}

impl CacheLayer {
    pub fn new(metadata: MetadataCache, blobs: BlobCache) -> Self {
        Self { metadata, blobs }
    }

    /// Filesystem-backed stores under `config.dir`
    pub fn from_config(config: &CacheConfig) -> Result<Self> {
        let metadata = FileSystemCache::new(
            config.metadata_dir(),
            config.metadata_threshold,
            ttl_from_secs(config.metadata_default_ttl_secs),
        )?;
        let blobs = FileSystemCache::new(
            config.blobs_dir(),
            config.blob_threshold,
            ttl_from_secs(config.blob_ttl_secs),
        )?;
        log::info!(
            "Cache ready at {} (blob threshold {})",
            config.dir.display(),
            config.blob_threshold
        );
        Ok(Self::new(
            MetadataCache::new(Box::new(metadata), Duration::from_secs(config.list_ttl_secs)),
            BlobCache::new(Box::new(blobs)),
        ))
    }

    /// Memory-backed stores with the same TTLs and thresholds
    pub fn in_memory(config: &CacheConfig) -> Self {
        let metadata = MemoryCache::new(config.metadata_threshold, ttl_from_secs(config.metadata_default_ttl_secs));
        let blobs = MemoryCache::new(config.blob_threshold, ttl_from_secs(config.blob_ttl_secs));
        Self::new(
            MetadataCache::new(Box::new(metadata), Duration::from_secs(config.list_ttl_secs)),
            BlobCache::new(Box::new(blobs)),
        )
    }
}

fn ttl_from_secs(secs: u64) -> Option<Duration> {
    if secs == 0 {
        None
    } else {
        Some(Duration::from_secs(secs))
    }
}
