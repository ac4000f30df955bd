use std::collections::HashMap;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::debug;

use crate::error::StoreError;
use crate::store::Store;

/// Entries expire this long after their last write unless configured
/// otherwise.
pub const DEFAULT_EXPIRATION: Duration = Duration::from_secs(60 * 60);

const MAX_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

struct Entry<V> {
    value: V,
    written_at: Instant,
}

struct Shared<V> {
    entries: Mutex<HashMap<String, Entry<V>>>,
    ttl: Duration,
    shutdown: Mutex<bool>,
    wakeup: Condvar,
}

impl<V> Shared<V> {
    fn expired(&self, entry: &Entry<V>, now: Instant) -> bool {
        now.duration_since(entry.written_at) >= self.ttl
    }
}

/// In-memory store whose entries expire a fixed duration after last write.
///
/// Expiry is enforced twice: reads treat stale entries as absent immediately,
/// and a background sweeper thread reclaims memory for entries nobody reads
/// again. The sweeper stops when the store is dropped.
pub struct TtlStore<V> {
    shared: Arc<Shared<V>>,
    reaper: Option<JoinHandle<()>>,
}

impl<V: Send + 'static> TtlStore<V> {
    pub fn new() -> Self {
        Self::with_expiration(DEFAULT_EXPIRATION)
    }

    /// A zero duration selects the default expiration.
    pub fn with_expiration(ttl: Duration) -> Self {
        let ttl = if ttl.is_zero() { DEFAULT_EXPIRATION } else { ttl };
        let shared = Arc::new(Shared {
            entries: Mutex::new(HashMap::new()),
            ttl,
            shutdown: Mutex::new(false),
            wakeup: Condvar::new(),
        });
        let reaper = {
            let shared = Arc::clone(&shared);
            std::thread::Builder::new()
                .name("stately-ttl-sweeper".into())
                .spawn(move || sweep_loop(&shared))
                .ok()
        };
        Self { shared, reaper }
    }

    #[cfg(test)]
    fn raw_len(&self) -> usize {
        self.shared.entries.lock().len()
    }
}

impl<V: Send + 'static> Default for TtlStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Drop for TtlStore<V> {
    fn drop(&mut self) {
        *self.shared.shutdown.lock() = true;
        self.shared.wakeup.notify_all();
        if let Some(reaper) = self.reaper.take() {
            let _ = reaper.join();
        }
    }
}

fn sweep_loop<V>(shared: &Shared<V>) {
    let interval = shared.ttl.min(MAX_SWEEP_INTERVAL);
    let mut shutdown = shared.shutdown.lock();
    while !*shutdown {
        let _ = shared.wakeup.wait_for(&mut shutdown, interval);
        if *shutdown {
            break;
        }
        let now = Instant::now();
        let mut entries = shared.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| !shared.expired(entry, now));
        let evicted = before - entries.len();
        if evicted > 0 {
            debug!(evicted, "swept expired entries");
        }
    }
}

impl<V: Clone + Send + 'static> Store<V> for TtlStore<V> {
    fn get(&self, key: &str) -> Result<Option<V>, StoreError> {
        let mut entries = self.shared.entries.lock();
        let now = Instant::now();
        match entries.get(key) {
            Some(entry) if self.shared.expired(entry, now) => {
                entries.remove(key);
                Ok(None)
            }
            Some(entry) => Ok(Some(entry.value.clone())),
            None => Ok(None),
        }
    }

    fn put(&self, key: &str, value: V) -> Result<(), StoreError> {
        self.shared.entries.lock().insert(
            key.to_owned(),
            Entry {
                value,
                written_at: Instant::now(),
            },
        );
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.shared.entries.lock().remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        self.shared.entries.lock().clear();
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StoreError> {
        let entries = self.shared.entries.lock();
        let now = Instant::now();
        Ok(entries
            .iter()
            .filter(|(_, entry)| !self.shared.expired(entry, now))
            .map(|(key, _)| key.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_get_roundtrip() {
        let store: TtlStore<String> = TtlStore::new();
        store.put("k", "v".into()).unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("v"));
        assert_eq!(store.get("missing").unwrap(), None);
    }

    #[test]
    fn remove_and_clear() {
        let store: TtlStore<String> = TtlStore::new();
        store.put("a", "1".into()).unwrap();
        store.put("b", "2".into()).unwrap();
        store.remove("a").unwrap();
        store.remove("a").unwrap(); // absent key is a no-op
        assert_eq!(store.get("a").unwrap(), None);
        store.clear().unwrap();
        assert!(store.keys().unwrap().is_empty());
    }

    #[test]
    fn zero_duration_selects_default() {
        let store: TtlStore<String> = TtlStore::with_expiration(Duration::ZERO);
        assert_eq!(store.shared.ttl, DEFAULT_EXPIRATION);
    }

    #[test]
    fn read_after_expiry_is_absent() {
        let store: TtlStore<String> = TtlStore::with_expiration(Duration::from_millis(20));
        store.put("k", "v".into()).unwrap();
        std::thread::sleep(Duration::from_millis(40));
        assert_eq!(store.get("k").unwrap(), None);
    }

    #[test]
    fn overwrite_refreshes_the_clock() {
        let store: TtlStore<String> = TtlStore::with_expiration(Duration::from_millis(60));
        store.put("k", "v1".into()).unwrap();
        std::thread::sleep(Duration::from_millis(40));
        store.put("k", "v2".into()).unwrap();
        std::thread::sleep(Duration::from_millis(40));
        // 80ms after the first write but only 40ms after the second.
        assert_eq!(store.get("k").unwrap().as_deref(), Some("v2"));
    }

    #[test]
    fn keys_excludes_expired_entries() {
        let store: TtlStore<String> = TtlStore::with_expiration(Duration::from_millis(20));
        store.put("old", "v".into()).unwrap();
        std::thread::sleep(Duration::from_millis(40));
        store.put("fresh", "v".into()).unwrap();
        assert_eq!(store.keys().unwrap(), vec!["fresh".to_string()]);
    }

    #[test]
    fn sweeper_reclaims_without_reads() {
        let store: TtlStore<String> = TtlStore::with_expiration(Duration::from_millis(20));
        store.put("k", "v".into()).unwrap();
        // Wait for the sweeper (cadence = ttl here) to reap the entry.
        for _ in 0..50 {
            if store.raw_len() == 0 {
                return;
            }
            std::thread::sleep(Duration::from_millis(20));
        }
        panic!("sweeper did not reclaim the expired entry");
    }
}
