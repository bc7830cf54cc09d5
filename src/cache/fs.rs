//! Directory-backed cache store, one file per key.
//!
//! File names are the SHA-256 of the key. Each file starts with the expiry
//! time as 8 big-endian bytes of unix milliseconds (0 for never) followed by
//! the payload. Writes land in a temporary file first and are renamed over
//! the target, so readers never see a partial entry.

use chrono::Utc;
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, SystemTime};
use tempfile::NamedTempFile;

use super::{effective_ttl, CacheStore};
use crate::error::Result;

const HEADER_LEN: usize = 8;

pub struct FileSystemCache {
    dir: PathBuf,
    threshold: usize,
    default_ttl: Option<Duration>,
    // serialises writers, pruning and expiry removal within the process
    writes: Mutex<()>,
}

impl FileSystemCache {
    /// `threshold == 0` disables eviction, `default_ttl == None` never expires.
    pub fn new(dir: impl Into<PathBuf>, threshold: usize, default_ttl: Option<Duration>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            threshold,
            default_ttl,
            writes: Mutex::new(()),
        })
    }

    fn write_guard(&self) -> MutexGuard<'_, ()> {
        self.writes.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let digest = Sha256::digest(key.as_bytes());
        let name: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
        self.dir.join(name)
    }

    fn now_millis() -> u64 {
        Utc::now().timestamp_millis().max(0) as u64
    }

    /// Entry files, skipping in-flight temporary files
    fn entries(&self) -> Vec<PathBuf> {
        let Ok(read_dir) = fs::read_dir(&self.dir) else {
            return Vec::new();
        };
        read_dir
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
            .filter(|entry| !entry.file_name().to_string_lossy().starts_with('.'))
            .map(|entry| entry.path())
            .collect()
    }

    /// Only the header is read, payloads can be large
    fn read_expiry(path: &Path) -> Option<u64> {
        let mut header = [0u8; HEADER_LEN];
        File::open(path).ok()?.read_exact(&mut header).ok()?;
        Some(u64::from_be_bytes(header))
    }

    fn is_expired(expiry: u64, now: u64) -> bool {
        expiry != 0 && now >= expiry
    }

    fn remove(path: &Path) -> Result<bool> {
        match fs::remove_file(path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Drop an entry seen expired, unless a writer has replaced it since
    fn remove_if_expired(&self, path: &Path) -> bool {
        let _guard = self.write_guard();
        let still_expired = Self::read_expiry(path)
            .map(|expiry| Self::is_expired(expiry, Self::now_millis()))
            .unwrap_or(false);
        still_expired && Self::remove(path).unwrap_or(false)
    }

    /// Make room for one more entry: expired entries go first, then the
    /// least recently written ones.
    fn prune(&self) -> Result<()> {
        if self.threshold == 0 {
            return Ok(());
        }
        let mut entries = self.entries();
        if entries.len() < self.threshold {
            return Ok(());
        }

        let now = Self::now_millis();
        let mut removed = 0usize;
        entries.retain(|path| match Self::read_expiry(path) {
            Some(expiry) if !Self::is_expired(expiry, now) => true,
            _ => {
                if Self::remove(path).unwrap_or(false) {
                    removed += 1;
                }
                false
            }
        });

        if entries.len() >= self.threshold {
            let mut by_age: Vec<(SystemTime, PathBuf)> = entries
                .into_iter()
                .map(|path| {
                    let modified = fs::metadata(&path)
                        .and_then(|m| m.modified())
                        .unwrap_or(SystemTime::UNIX_EPOCH);
                    (modified, path)
                })
                .collect();
            by_age.sort_by(|a, b| a.0.cmp(&b.0));
            let excess = by_age.len() + 1 - self.threshold;
            for (_, path) in by_age.into_iter().take(excess) {
                if Self::remove(&path)? {
                    removed += 1;
                }
            }
        }

        log::debug!("Pruned {} entries from {}", removed, self.dir.display());
        Ok(())
    }
}

impl CacheStore for FileSystemCache {
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        let path = self.path_for(key);
        let mut raw = fs::read(&path).ok()?;
        if raw.len() < HEADER_LEN {
            return None;
        }
        let header: [u8; HEADER_LEN] = raw[..HEADER_LEN].try_into().ok()?;
        if Self::is_expired(u64::from_be_bytes(header), Self::now_millis()) {
            self.remove_if_expired(&path);
            return None;
        }
        Some(raw.split_off(HEADER_LEN))
    }

    fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<()> {
        let path = self.path_for(key);
        let _guard = self.write_guard();
        // overwriting never makes room at another key's expense
        if !path.exists() {
            self.prune()?;
        }
        let expiry = match effective_ttl(ttl, self.default_ttl) {
            Some(ttl) => Self::now_millis().saturating_add(ttl.as_millis() as u64),
            None => 0,
        };

        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(&expiry.to_be_bytes())?;
        tmp.write_all(value)?;
        tmp.flush()?;
        tmp.persist(path).map_err(|e| e.error)?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<bool> {
        let _guard = self.write_guard();
        Self::remove(&self.path_for(key))
    }

    fn clear(&self) -> Result<()> {
        let _guard = self.write_guard();
        for path in self.entries() {
            Self::remove(&path)?;
        }
        Ok(())
    }

    fn len(&self) -> usize {
        self.entries().len()
    }
}
