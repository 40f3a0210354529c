//! Response cache shared by concurrent callers of a backend client
//!
//! Entries are immutable and replaced wholesale on re-fetch. Expiry is
//! per entry; a bounded capacity is available as an opt-in knob.

use crate::config::CacheSettings;
use crate::network::HttpMethod;
use chrono::{DateTime, Utc};
use moka::future::Cache;
use moka::Expiry;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::{Duration, Instant};
use url::Url;

/// A stored response body
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: String,
    pub body: Arc<[u8]>,
    pub stored_at: DateTime<Utc>,
    /// `None` means the entry never expires
    pub ttl: Option<Duration>,
}

struct EntryExpiry;

impl Expiry<String, CacheEntry> for EntryExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &CacheEntry,
        _created_at: Instant,
    ) -> Option<Duration> {
        value.ttl
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &CacheEntry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        value.ttl
    }
}

/// Cache for backend response bodies
#[derive(Clone)]
pub struct ResponseCache {
    cache: Cache<String, CacheEntry>,
    default_ttl: Option<Duration>,
}

impl ResponseCache {
    /// Create a cache; `max_capacity` bounds the entry count when set
    pub fn new(default_ttl: Option<Duration>, max_capacity: Option<u64>) -> Self {
        let mut builder = Cache::<String, CacheEntry>::builder().expire_after(EntryExpiry);
        if let Some(capacity) = max_capacity {
            builder = builder.max_capacity(capacity);
        }

        Self {
            cache: builder.build(),
            default_ttl,
        }
    }

    pub fn from_settings(settings: &CacheSettings) -> Self {
        Self::new(
            settings.ttl_seconds.map(Duration::from_secs),
            settings.max_entries,
        )
    }

    /// Get a cached body
    pub async fn get(&self, key: &str) -> Option<Arc<[u8]>> {
        self.cache.get(key).await.map(|entry| entry.body)
    }

    /// Get the full cached entry
    pub async fn get_entry(&self, key: &str) -> Option<CacheEntry> {
        self.cache.get(key).await
    }

    /// Store a body, replacing any previous entry
    pub async fn put(&self, key: String, body: impl Into<Arc<[u8]>>, ttl: Option<Duration>) {
        let entry = CacheEntry {
            key: key.clone(),
            body: body.into(),
            stored_at: Utc::now(),
            ttl,
        };
        self.cache.insert(key, entry).await;
    }

    /// Store a body with the default TTL
    pub async fn put_default(&self, key: String, body: impl Into<Arc<[u8]>>) {
        self.put(key, body, self.default_ttl).await;
    }

    /// Remove a cached entry
    pub async fn invalidate(&self, key: &str) {
        self.cache.invalidate(key).await;
    }

    /// Clear the entire cache
    pub fn clear(&self) {
        self.cache.invalidate_all();
    }

    /// Approximate number of entries
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(Some(Duration::from_secs(300)), None)
    }
}

/// Cache key for a request: method, normalized URL and sorted query params
pub fn cache_key(method: HttpMethod, url: &Url) -> String {
    let mut base = url.clone();
    base.set_query(None);
    base.set_fragment(None);

    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    params.sort();

    let mut hasher = Sha256::new();
    hasher.update(method.as_str().as_bytes());
    hasher.update(b" ");
    hasher.update(base.as_str().as_bytes());
    for (key, value) in &params {
        hasher.update(b"\0");
        hasher.update(key.as_bytes());
        hasher.update(b"=");
        hasher.update(value.as_bytes());
    }

    format!("{:x}", hasher.finalize())
}
