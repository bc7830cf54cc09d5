//! Scoped preference storage
//!
//! Preferences live either in the plugin scope (shared defaults) or in a
//! per-user scope keyed by the sender address. User values win.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::{MangaError, Result};

/// Scope shared by every user of the plugin
pub const PLUGIN_SCOPE: &str = "rust_manga_reader";

pub const PDF_MAX_SIZE: &str = "pdf_max_size";
pub const HTML_MAX_SIZE: &str = "html_max_size";

/// Key/value preference store provided by the host bot
pub trait PreferenceStore: Send + Sync {
    fn get(&self, key: &str, scope: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str, scope: &str);
}

/// In-process preference store
#[derive(Default)]
pub struct MemoryPreferences {
    values: RwLock<HashMap<(String, String), String>>,
}

impl MemoryPreferences {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceStore for MemoryPreferences {
    fn get(&self, key: &str, scope: &str) -> Option<String> {
        let values = self.values.read().ok()?;
        values.get(&(scope.to_string(), key.to_string())).cloned()
    }

    fn set(&self, key: &str, value: &str, scope: &str) {
        if let Ok(mut values) = self.values.write() {
            values.insert((scope.to_string(), key.to_string()), value.to_string());
        }
    }
}

/// Read a plugin-scoped value, storing `default` first when it is missing.
pub fn get_or_init_default(store: &dyn PreferenceStore, key: &str, default: &str) -> String {
    match store.get(key, PLUGIN_SCOPE) {
        Some(value) => value,
        None => {
            store.set(key, default, PLUGIN_SCOPE);
            default.to_string()
        }
    }
}

/// Resolve a byte size for `user`: user scope, then plugin scope, then `default`.
pub fn resolve_size(store: &dyn PreferenceStore, key: &str, user: Option<&str>, default: u64) -> Result<u64> {
    let raw = user
        .and_then(|addr| store.get(key, addr))
        .unwrap_or_else(|| get_or_init_default(store, key, &default.to_string()));
    raw.trim()
        .parse::<u64>()
        .map_err(|_| MangaError::InvalidArgument(format!("{} is not a size in bytes: {}", key, raw)))
}
