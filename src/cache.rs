use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::debug;

struct Entry {
    stored_at: Instant,
    fetched_at: DateTime<Utc>,
    value: Value,
}

/// Process-wide TTL cache for list responses. Mutations never update entries
/// in place; any successful write invalidates the whole cache, because
/// derived views (e.g. "gurukuls with milestones") span entity types.
pub struct ListCache {
    ttl: Duration,
    entries: HashMap<String, Entry>,
}

impl ListCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn get(&mut self, key: &str) -> Option<Value> {
        let expired = match self.entries.get(key) {
            Some(entry) => entry.stored_at.elapsed() >= self.ttl,
            None => return None,
        };
        if expired {
            self.entries.remove(key);
            return None;
        }
        self.entries.get(key).map(|e| e.value.clone())
    }

    pub fn put(&mut self, key: &str, value: Value) {
        self.entries.insert(
            key.to_string(),
            Entry {
                stored_at: Instant::now(),
                fetched_at: Utc::now(),
                value,
            },
        );
    }

    pub fn invalidate_all(&mut self) {
        if !self.entries.is_empty() {
            debug!(entries = self.entries.len(), "cache invalidated");
        }
        self.entries.clear();
    }

    /// (key, fetched_at) pairs for the health report.
    pub fn snapshot(&self) -> Vec<(String, DateTime<Utc>)> {
        let mut out: Vec<_> = self
            .entries
            .iter()
            .map(|(k, e)| (k.clone(), e.fetched_at))
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn hit_then_invalidate_all_clears_every_key() {
        let mut cache = ListCache::new(Duration::from_secs(60));
        cache.put("gurukuls", json!([{"gid": 1}]));
        cache.put("subjects", json!([{"subid": 7}]));

        assert_eq!(cache.get("gurukuls"), Some(json!([{"gid": 1}])));
        cache.invalidate_all();
        assert_eq!(cache.get("gurukuls"), None);
        assert_eq!(cache.get("subjects"), None);
    }

    #[test]
    fn expired_entries_are_dropped() {
        let mut cache = ListCache::new(Duration::from_millis(10));
        cache.put("topics", json!([]));
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(cache.get("topics"), None);
        assert!(cache.snapshot().is_empty());
    }
}
