use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{MangaError, Result};
use crate::http_client::{HttpClient, HttpClientConfig};

const MIB: u64 = 1024 * 1024;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub download: DownloadConfig,
    #[serde(default)]
    pub bot: BotConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    /// Timeout for every request in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Fixed user agent; a browser-like one is picked when unset
    #[serde(default)]
    pub user_agent: Option<String>,

    #[serde(default = "default_true")]
    pub enable_cookies: bool,

    /// Enable gzip/brotli compression
    #[serde(default = "default_true")]
    pub enable_compression: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    /// Directory holding the `cache/` and `blobs_cache/` stores
    #[serde(default = "default_cache_dir")]
    pub dir: PathBuf,

    /// TTL for single entities looked up by URL
    #[serde(default = "default_metadata_ttl")]
    pub metadata_default_ttl_secs: u64,

    /// TTL for search results, chapter lists and image lists
    #[serde(default = "default_list_ttl")]
    pub list_ttl_secs: u64,

    #[serde(default = "default_blob_ttl")]
    pub blob_ttl_secs: u64,

    /// Maximum number of entries before old ones are evicted, 0 for unbounded
    #[serde(default)]
    pub metadata_threshold: usize,

    #[serde(default = "default_blob_threshold")]
    pub blob_threshold: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DownloadConfig {
    /// Pause after every image that had to be downloaded
    #[serde(default = "default_image_delay")]
    pub image_delay_ms: u64,

    /// Default maximum size of one PDF part in bytes
    #[serde(default = "default_max_size")]
    pub pdf_max_size: u64,

    /// Default maximum size of one HTML part in bytes
    #[serde(default = "default_max_size")]
    pub html_max_size: u64,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct BotConfig {
    /// Address the generated links send commands to
    #[serde(default)]
    pub bot_addr: String,
}

fn default_true() -> bool { true }
fn default_timeout() -> u64 { 30 }
fn default_cache_dir() -> PathBuf { PathBuf::from("manga_cache") }
fn default_metadata_ttl() -> u64 { 60 * 60 * 24 * 60 }
fn default_list_ttl() -> u64 { 60 * 60 }
fn default_blob_ttl() -> u64 { 60 * 60 * 24 * 7 }
fn default_blob_threshold() -> usize { 9000 }
fn default_image_delay() -> u64 { 100 }
fn default_max_size() -> u64 { 10 * MIB }

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
            user_agent: None,
            enable_cookies: true,
            enable_compression: true,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: default_cache_dir(),
            metadata_default_ttl_secs: default_metadata_ttl(),
            list_ttl_secs: default_list_ttl(),
            blob_ttl_secs: default_blob_ttl(),
            metadata_threshold: 0,
            blob_threshold: default_blob_threshold(),
        }
    }
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            image_delay_ms: default_image_delay(),
            pdf_max_size: default_max_size(),
            html_max_size: default_max_size(),
        }
    }
}

impl Config {
    /// Load `config.toml` from the working directory, falling back to defaults
    pub fn load() -> Self {
        let path = Path::new("config.toml");
        if path.exists() {
            match Self::from_path(path) {
                Ok(cfg) => return cfg,
                Err(e) => log::warn!("Ignoring {}: {}", path.display(), e),
            }
        }
        Self::default()
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str::<Config>(content).map_err(|e| MangaError::Config(e.to_string()))
    }
}

impl HttpConfig {
    /// Create the shared HTTP session from this configuration
    pub fn create_http_client(&self) -> std::result::Result<HttpClient, reqwest::Error> {
        HttpClient::with_config(HttpClientConfig {
            timeout: Duration::from_secs(self.timeout_secs),
            user_agent: self.user_agent.clone(),
            enable_cookies: self.enable_cookies,
            enable_gzip: self.enable_compression,
        })
    }
}

impl CacheConfig {
    pub fn metadata_dir(&self) -> PathBuf {
        self.dir.join("cache")
    }

    pub fn blobs_dir(&self) -> PathBuf {
        self.dir.join("blobs_cache")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.http.timeout_secs, 30);
        assert_eq!(cfg.cache.list_ttl_secs, 3600);
        assert_eq!(cfg.cache.blob_ttl_secs, 7 * 24 * 3600);
        assert_eq!(cfg.cache.blob_threshold, 9000);
        assert_eq!(cfg.download.image_delay_ms, 100);
        assert_eq!(cfg.download.pdf_max_size, 10 * 1024 * 1024);
        assert_eq!(cfg.download.html_max_size, 10 * 1024 * 1024);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let cfg = Config::parse(
            r#"
            [download]
            pdf_max_size = 2048

            [bot]
            bot_addr = "bot@example.org"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.download.pdf_max_size, 2048);
        assert_eq!(cfg.download.html_max_size, 10 * 1024 * 1024);
        assert_eq!(cfg.bot.bot_addr, "bot@example.org");
        assert_eq!(cfg.http.timeout_secs, 30);
    }

    #[test]
    fn test_malformed_file_is_config_error() {
        let err = Config::parse("[download]\npdf_max_size = \"big\"").unwrap_err();
        assert!(matches!(err, MangaError::Config(_)));
    }

    #[test]
    fn test_cache_dirs() {
        let cache = CacheConfig {
            dir: PathBuf::from("/tmp/x"),
            ..Default::default()
        };
        assert_eq!(cache.metadata_dir(), PathBuf::from("/tmp/x/cache"));
        assert_eq!(cache.blobs_dir(), PathBuf::from("/tmp/x/blobs_cache"));
    }
}
