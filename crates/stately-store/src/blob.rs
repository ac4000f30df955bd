use std::collections::HashMap;
use std::marker::PhantomData;

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use crate::error::StoreError;
use crate::store::Store;

/// Byte-oriented durable backend. Same shape as [`Store`], one level down.
pub trait BlobStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;
    fn put(&self, key: &str, value: &[u8]) -> Result<(), StoreError>;
    fn remove(&self, key: &str) -> Result<(), StoreError>;
    fn clear(&self) -> Result<(), StoreError>;
    fn keys(&self) -> Result<Vec<String>, StoreError>;
}

/// [`Store`] adapter serializing values as JSON into any [`BlobStore`].
///
/// Write-side failures (serialization or backend) propagate. On the read
/// side, backend failures propagate too, but a blob that no longer decodes is
/// reported absent: one corrupt entry must not wedge every lookup that
/// touches it. The warn log is the only trace the data leaves behind.
pub struct JsonBlobStore<V> {
    blobs: Box<dyn BlobStore>,
    _value: PhantomData<fn() -> V>,
}

impl<V> JsonBlobStore<V> {
    pub fn new(blobs: Box<dyn BlobStore>) -> Self {
        Self {
            blobs,
            _value: PhantomData,
        }
    }
}

impl<V: Serialize + DeserializeOwned> Store<V> for JsonBlobStore<V> {
    fn get(&self, key: &str) -> Result<Option<V>, StoreError> {
        match self.blobs.get(key)? {
            None => Ok(None),
            Some(bytes) => match serde_json::from_slice(&bytes) {
                Ok(value) => Ok(Some(value)),
                Err(e) => {
                    warn!(key, error = %e, "dropping undecodable blob, treating as absent");
                    Ok(None)
                }
            },
        }
    }

    fn put(&self, key: &str, value: V) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(&value)?;
        self.blobs.put(key, &bytes)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.blobs.remove(key)
    }

    fn clear(&self) -> Result<(), StoreError> {
        self.blobs.clear()
    }

    fn keys(&self) -> Result<Vec<String>, StoreError> {
        self.blobs.keys()
    }
}

/// Map-backed [`BlobStore`], for tests and single-run embedding.
#[derive(Default)]
pub struct InMemoryBlobStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BlobStore for InMemoryBlobStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.blobs.lock().get(key).cloned())
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.blobs.lock().insert(key.to_owned(), value.to_vec());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.blobs.lock().remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        self.blobs.lock().clear();
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.blobs.lock().keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    struct Record {
        name: String,
        count: u64,
    }

    fn store() -> JsonBlobStore<Record> {
        JsonBlobStore::new(Box::new(InMemoryBlobStore::new()))
    }

    #[test]
    fn roundtrip_through_bytes() {
        let store = store();
        let record = Record {
            name: "checkout".into(),
            count: 3,
        };
        store.put("checkout", record.clone()).unwrap();
        assert_eq!(store.get("checkout").unwrap(), Some(record));
    }

    #[test]
    fn missing_key_is_none() {
        assert_eq!(store().get("nope").unwrap(), None);
    }

    #[test]
    fn corrupt_blob_reads_as_absent() {
        let blobs = Box::new(InMemoryBlobStore::new());
        blobs.put("broken", b"not json at all").unwrap();
        let store: JsonBlobStore<Record> = JsonBlobStore::new(blobs);
        assert_eq!(store.get("broken").unwrap(), None);
    }

    #[test]
    fn remove_clear_keys_delegate() {
        let store = store();
        store
            .put("a", Record { name: "a".into(), count: 1 })
            .unwrap();
        store
            .put("b", Record { name: "b".into(), count: 2 })
            .unwrap();
        let mut keys = store.keys().unwrap();
        keys.sort();
        assert_eq!(keys, vec!["a", "b"]);

        store.remove("a").unwrap();
        assert_eq!(store.get("a").unwrap(), None);
        store.clear().unwrap();
        assert!(store.keys().unwrap().is_empty());
    }
}
