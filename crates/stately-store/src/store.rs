use crate::error::StoreError;

/// Generic key/value persistence used for contexts. Implementations are
/// internally synchronized; callers needing an atomic read-modify-write hold
/// their own lock around the get/put pair.
pub trait Store<V>: Send + Sync {
    /// Returns an owned value; the live entry is never exposed.
    fn get(&self, key: &str) -> Result<Option<V>, StoreError>;

    fn put(&self, key: &str, value: V) -> Result<(), StoreError>;

    /// Removing an absent key is a no-op.
    fn remove(&self, key: &str) -> Result<(), StoreError>;

    fn clear(&self) -> Result<(), StoreError>;

    /// Snapshot of the known keys at call time.
    fn keys(&self) -> Result<Vec<String>, StoreError>;
}
