use moka::future::Cache;

/// In-memory shadow of the translation store, bounded by entry count.
pub struct MemoryCache {
    cache: Cache<String, String>,
}

impl MemoryCache {
    pub fn new(max_entries: u64) -> Self {
        Self {
            cache: Cache::builder().max_capacity(max_entries.max(1)).build(),
        }
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        self.cache.get(key).await
    }

    pub async fn insert(&self, key: String, value: String) {
        self.cache.insert(key, value).await;
    }
}
