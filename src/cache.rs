use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use crate::fetcher::FetchResult;

#[derive(Debug, Clone)]
struct CacheEntry {
    result: FetchResult,
    fetched_at: Instant,
}

/// Time-boxed store of fetch outcomes, keyed by endpoint + query params.
///
/// Clones share the same entries. Expiry is checked on read; stale entries
/// linger until overwritten or the whole store is cleared.
#[derive(Clone)]
pub struct ResponseCache {
    inner: Arc<RwLock<HashMap<String, CacheEntry>>>,
    ttl: Duration,
}

impl ResponseCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn get(&self, key: &str) -> Option<FetchResult> {
        self.get_at(key, Instant::now())
    }

    pub fn get_at(&self, key: &str, now: Instant) -> Option<FetchResult> {
        let guard = self.inner.read();
        let entry = guard.get(key)?;
        if now.saturating_duration_since(entry.fetched_at) < self.ttl {
            Some(entry.result.clone())
        } else {
            None
        }
    }

    pub fn insert(&self, key: &str, result: FetchResult) {
        self.insert_at(key, result, Instant::now());
    }

    pub fn insert_at(&self, key: &str, result: FetchResult, fetched_at: Instant) {
        self.inner
            .write()
            .insert(key.to_string(), CacheEntry { result, fetched_at });
    }

    pub fn clear(&self) {
        self.inner.write().clear();
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }
}

/// Cache key for a GET: the url followed by its params in the order given.
pub fn cache_key(url: &str, params: &[(&str, &str)]) -> String {
    if params.is_empty() {
        return url.to_string();
    }
    let query = params
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");
    format!("{url}?{query}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn entry_is_served_until_ttl_elapses() {
        let cache = ResponseCache::new(Duration::from_secs(60));
        let t0 = Instant::now();
        cache.insert_at("k", FetchResult::Ok(json!([1, 2])), t0);

        let hit = cache.get_at("k", t0 + Duration::from_secs(59));
        assert_eq!(hit, Some(FetchResult::Ok(json!([1, 2]))));

        assert_eq!(cache.get_at("k", t0 + Duration::from_secs(60)), None);
        assert_eq!(cache.get_at("k", t0 + Duration::from_secs(600)), None);
    }

    #[test]
    fn clear_drops_everything() {
        let cache = ResponseCache::new(Duration::from_secs(60));
        cache.insert("a", FetchResult::Ok(json!({})));
        cache.insert("b", FetchResult::Ok(json!([])));
        assert_eq!(cache.len(), 2);

        cache.clear();
        assert_eq!(cache.len(), 0);
        assert_eq!(cache.get("a"), None);
    }

    #[test]
    fn clones_share_entries() {
        let cache = ResponseCache::new(Duration::from_secs(60));
        let other = cache.clone();
        other.insert("k", FetchResult::Ok(json!(1)));
        assert!(cache.get("k").is_some());
    }

    #[test]
    fn key_includes_params_in_order() {
        assert_eq!(cache_key("http://x/p", &[]), "http://x/p");
        assert_eq!(
            cache_key("http://x/p", &[("ids", "a,b"), ("vs_currencies", "usd")]),
            "http://x/p?ids=a,b&vs_currencies=usd"
        );
    }
}
