/// Metrics for manga sites and the cache layer
///
/// Tracks success rates, error categories and response times per site, plus
/// cache hit ratios per tier

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::error::MangaError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteMetrics {
    pub site_name: String,
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub network_failures: u64,
    pub upstream_failures: u64,
    pub last_success: Option<DateTime<Utc>>,
    pub last_failure: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub average_response_time_ms: f64,
    pub total_response_time_ms: u64,
}

impl SiteMetrics {
    pub fn new(site_name: String) -> Self {
        Self {
            site_name,
            total_requests: 0,
            successful_requests: 0,
            failed_requests: 0,
            network_failures: 0,
            upstream_failures: 0,
            last_success: None,
            last_failure: None,
            last_error: None,
            average_response_time_ms: 0.0,
            total_response_time_ms: 0,
        }
    }

    pub fn success_rate(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            (self.successful_requests as f64 / self.total_requests as f64) * 100.0
        }
    }

    pub fn record_success(&mut self, response_time: Duration) {
        self.total_requests += 1;
        self.successful_requests += 1;
        self.last_success = Some(Utc::now());

        let response_ms = response_time.as_millis() as u64;
        self.total_response_time_ms += response_ms;
        self.average_response_time_ms =
            self.total_response_time_ms as f64 / self.successful_requests as f64;
    }

    pub fn record_failure(&mut self, error: &MangaError) {
        self.total_requests += 1;
        self.failed_requests += 1;
        self.last_failure = Some(Utc::now());
        self.last_error = Some(error.to_string());

        match error {
            MangaError::Network(_) => self.network_failures += 1,
            MangaError::Upstream { .. } => self.upstream_failures += 1,
            _ => {}
        }
    }
}

/// Hit/miss counters of one cache tier
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheCounters {
    pub hits: u64,
    pub misses: u64,
}

impl CacheCounters {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheTier {
    Metadata,
    Blobs,
}

#[derive(Default)]
struct Inner {
    sites: HashMap<String, SiteMetrics>,
    metadata: CacheCounters,
    blobs: CacheCounters,
}

/// Shared tracker, one per pipeline
#[derive(Default)]
pub struct MetricsTracker {
    inner: Mutex<Inner>,
}

impl MetricsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    // counters stay usable after a panicking writer
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn record_success(&self, site_name: &str, response_time: Duration) {
        let mut inner = self.lock();
        let site = inner
            .sites
            .entry(site_name.to_string())
            .or_insert_with(|| SiteMetrics::new(site_name.to_string()));
        site.record_success(response_time);

        log::debug!(
            "[{}] Success - Response time: {}ms - Success rate: {:.2}%",
            site_name,
            response_time.as_millis(),
            site.success_rate()
        );
    }

    pub fn record_failure(&self, site_name: &str, error: &MangaError) {
        let mut inner = self.lock();
        let site = inner
            .sites
            .entry(site_name.to_string())
            .or_insert_with(|| SiteMetrics::new(site_name.to_string()));
        site.record_failure(error);

        log::warn!(
            "[{}] Failure - Error: {} - Success rate: {:.2}%",
            site_name,
            error,
            site.success_rate()
        );
    }

    pub fn record_cache(&self, tier: CacheTier, hit: bool) {
        let mut inner = self.lock();
        let counters = match tier {
            CacheTier::Metadata => &mut inner.metadata,
            CacheTier::Blobs => &mut inner.blobs,
        };
        if hit {
            counters.hits += 1;
        } else {
            counters.misses += 1;
        }
    }

    pub fn get_metrics(&self, site_name: &str) -> Option<SiteMetrics> {
        self.lock().sites.get(site_name).cloned()
    }

    pub fn get_all_metrics(&self) -> Vec<SiteMetrics> {
        self.lock().sites.values().cloned().collect()
    }

    pub fn cache_counters(&self, tier: CacheTier) -> CacheCounters {
        let inner = self.lock();
        match tier {
            CacheTier::Metadata => inner.metadata,
            CacheTier::Blobs => inner.blobs,
        }
    }

    /// Log one line per site, best success rate first
    pub fn log_summary(&self) {
        let inner = self.lock();
        let mut sorted: Vec<_> = inner.sites.values().collect();
        sorted.sort_by(|a, b| b.success_rate().total_cmp(&a.success_rate()));

        for m in sorted {
            log::info!(
                "{}: {:.2}% success ({} ok, {} network, {} upstream), avg {:.2}ms{}",
                m.site_name,
                m.success_rate(),
                m.successful_requests,
                m.network_failures,
                m.upstream_failures,
                m.average_response_time_ms,
                m.last_error
                    .as_ref()
                    .map(|e| format!(", last error: {}", e))
                    .unwrap_or_default()
            );
        }
        log::info!(
            "cache hit rate: metadata {:.2}%, blobs {:.2}%",
            inner.metadata.hit_rate(),
            inner.blobs.hit_rate()
        );
    }

    pub fn export_json(&self) -> String {
        let inner = self.lock();
        let snapshot = serde_json::json!({
            "sites": &inner.sites,
            "cache": {
                "metadata": inner.metadata,
                "blobs": inner.blobs,
            },
        });
        serde_json::to_string_pretty(&snapshot).unwrap_or_else(|_| "{}".to_string())
    }
}

/// Time a site operation and record its outcome
pub fn track_request<T>(
    tracker: &MetricsTracker,
    site_name: &str,
    operation: impl FnOnce() -> Result<T, MangaError>,
) -> Result<T, MangaError> {
    let start = Instant::now();
    let result = operation();
    let duration = start.elapsed();

    match &result {
        Ok(_) => tracker.record_success(site_name, duration),
        Err(e) => tracker.record_failure(site_name, e),
    }

    result
}
