// Copyright 2026 Storysearch Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Time-bounded cache for upstream responses, partitioned by locale.

use std::collections::HashMap;
use std::time::Duration;
use std::time::Instant;

use parking_lot::Mutex;
use tracing::trace;

struct CacheEntry<V> {
    value: V,
    created: Instant,
}

pub struct ContentCache<V> {
    ttl: Duration,
    entries: Mutex<HashMap<(String, String), CacheEntry<V>>>,
}

impl<V: Clone> ContentCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn get(&self, locale: &str, key: &str) -> Option<V> {
        let mut entries = self.entries.lock();
        let cache_key = (locale.to_string(), key.to_string());
        match entries.get(&cache_key) {
            Some(entry) if entry.created.elapsed() < self.ttl => {
                trace!(locale = %locale, key = %key, "cache hit");
                Some(entry.value.clone())
            }
            Some(_) => {
                entries.remove(&cache_key);
                trace!(locale = %locale, key = %key, "cache expired");
                None
            }
            None => {
                trace!(locale = %locale, key = %key, "cache miss");
                None
            }
        }
    }

    pub fn insert(&self, locale: &str, key: &str, value: V) {
        if self.ttl.is_zero() {
            return;
        }
        self.entries.lock().insert(
            (locale.to_string(), key.to_string()),
            CacheEntry {
                value,
                created: Instant::now(),
            },
        );
    }

    pub fn invalidate_locale(&self, locale: &str) {
        self.entries.lock().retain(|(entry_locale, _), _| entry_locale != locale);
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_are_partitioned_by_locale() {
        let cache = ContentCache::new(Duration::from_secs(60));
        cache.insert("en", "home", 1);
        cache.insert("de", "home", 2);
        assert_eq!(cache.get("en", "home"), Some(1));
        assert_eq!(cache.get("de", "home"), Some(2));

        cache.invalidate_locale("en");
        assert_eq!(cache.get("en", "home"), None);
        assert_eq!(cache.get("de", "home"), Some(2));

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn expired_entries_are_dropped() {
        let cache = ContentCache::new(Duration::from_millis(1));
        cache.insert("en", "home", "value".to_string());
        std::thread::sleep(Duration::from_millis(10));
        assert_eq!(cache.get("en", "home"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn zero_ttl_disables_caching() {
        let cache = ContentCache::new(Duration::ZERO);
        cache.insert("en", "home", 1);
        assert_eq!(cache.get("en", "home"), None);
    }
}
