mod key;
mod memory;
mod store;

pub use key::CacheKey;
pub use memory::MemoryCache;
pub use store::SqliteStore;

use std::sync::Mutex;

use tracing::{debug, warn};

use crate::config::CacheConfig;

/// Translation cache with an in-memory layer over an optional SQLite file.
///
/// Store failures never abort a run: the cache logs a warning and keeps
/// going memory-only.
pub struct TranslationCache {
    memory: MemoryCache,
    store: Mutex<Option<SqliteStore>>,
}

impl TranslationCache {
    /// Build the cache described by `config`.
    ///
    /// If the store cannot be opened the cache degrades to memory-only.
    pub fn open(config: &CacheConfig) -> Self {
        let store = config
            .path
            .as_ref()
            .and_then(|path| match SqliteStore::open(path) {
                Ok(store) => Some(store),
                Err(e) => {
                    warn!("Translation cache unavailable, continuing without it: {}", e);
                    None
                }
            });

        Self {
            memory: MemoryCache::new(config.memory_max_entries),
            store: Mutex::new(store),
        }
    }

    /// A cache that only lives for this process.
    pub fn in_memory(max_entries: u64) -> Self {
        Self {
            memory: MemoryCache::new(max_entries),
            store: Mutex::new(None),
        }
    }

    /// Whether a durable store is attached.
    pub fn is_persistent(&self) -> bool {
        self.store.lock().is_ok_and(|guard| guard.is_some())
    }

    /// Get a cached translation
    pub async fn get(&self, key: &CacheKey) -> Option<String> {
        let key_str = key.as_str();

        if let Some(value) = self.memory.get(key_str).await {
            return Some(value);
        }

        let stored = self.with_store(|store| store.get(key_str)).flatten();
        if let Some(value) = stored {
            // Populate memory on store hit
            self.memory.insert(key_str.to_string(), value.clone()).await;
            return Some(value);
        }

        None
    }

    /// Record translations and commit them to the store before returning.
    pub async fn insert_many(&self, entries: Vec<(CacheKey, String)>) {
        if entries.is_empty() {
            return;
        }

        let rows: Vec<(String, String)> = entries
            .into_iter()
            .map(|(k, v)| (k.as_str().to_string(), v))
            .collect();

        for (key, value) in &rows {
            self.memory.insert(key.clone(), value.clone()).await;
        }

        if self.with_store(|store| store.put_many(&rows)).is_some() {
            debug!("Committed {} cache entries", rows.len());
        }
    }

    /// Close the durable store. Safe to call more than once.
    pub fn close(&self) {
        let Ok(mut guard) = self.store.lock() else {
            return;
        };
        if let Some(store) = guard.take() {
            let path = store.path().display().to_string();
            match store.close() {
                Ok(()) => debug!("Closed translation cache at {}", path),
                Err(e) => warn!("Closing translation cache failed: {}", e),
            }
        }
    }

    /// Run `op` against the store; on error, warn and detach the store.
    fn with_store<T>(
        &self,
        op: impl FnOnce(&mut SqliteStore) -> crate::error::Result<T>,
    ) -> Option<T> {
        let mut guard = self.store.lock().ok()?;
        let store = guard.as_mut()?;
        match op(store) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Translation cache error, continuing memory-only: {}", e);
                *guard = None;
                None
            }
        }
    }
}

impl Drop for TranslationCache {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::Lang;

    fn key(text: &str) -> CacheKey {
        CacheKey::new(text, &Lang::new("en"), &Lang::new("fa"))
    }

    #[tokio::test]
    async fn test_memory_only_cache() {
        let cache = TranslationCache::in_memory(16);
        assert!(!cache.is_persistent());
        assert_eq!(cache.get(&key("Hello")).await, None);

        cache
            .insert_many(vec![(key("Hello"), "سلام".to_string())])
            .await;
        assert_eq!(cache.get(&key("Hello")).await.as_deref(), Some("سلام"));
    }

    #[tokio::test]
    async fn test_persistent_cache_survives_new_instance() {
        let dir = tempfile::tempdir().unwrap();
        let config = CacheConfig {
            path: Some(dir.path().join("cache.sqlite3")),
            ..CacheConfig::default()
        };

        let cache = TranslationCache::open(&config);
        assert!(cache.is_persistent());
        cache
            .insert_many(vec![(key("World"), "دنیا".to_string())])
            .await;
        cache.close();
        assert!(!cache.is_persistent());

        let reopened = TranslationCache::open(&config);
        assert_eq!(reopened.get(&key("World")).await.as_deref(), Some("دنیا"));
    }

    #[tokio::test]
    async fn test_unopenable_store_degrades_to_memory() {
        let dir = tempfile::tempdir().unwrap();
        // A directory is not a valid database file
        let config = CacheConfig {
            path: Some(dir.path().to_path_buf()),
            ..CacheConfig::default()
        };

        let cache = TranslationCache::open(&config);
        assert!(!cache.is_persistent());
        cache.insert_many(vec![(key("x"), "y".to_string())]).await;
        assert_eq!(cache.get(&key("x")).await.as_deref(), Some("y"));
    }
}
