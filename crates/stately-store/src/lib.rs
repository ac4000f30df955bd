pub mod blob;
pub mod error;
pub mod sqlite;
pub mod store;
pub mod ttl;

pub use blob::{BlobStore, InMemoryBlobStore, JsonBlobStore};
pub use error::StoreError;
pub use sqlite::SqliteBlobStore;
pub use store::Store;
pub use ttl::{TtlStore, DEFAULT_EXPIRATION};
