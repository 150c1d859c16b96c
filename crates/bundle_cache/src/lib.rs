//! Persistent build-artifact cache.
//!
//! The store is a directory holding three independently clearable
//! collections: modification times of dependency files, emitted build
//! artifacts (content-addressed blobs plus metadata), and free-form build
//! values such as the asset index and the compiler's stats report. All
//! operations are asynchronous; collections are held in memory after
//! [`Store::open`] and written back by [`Store::flush`].

#![warn(missing_docs)]

pub mod blob;
pub mod collection;
pub mod error;
pub mod file_cache;
pub mod ledger;
pub mod store;
pub mod value_cache;

pub use blob::BlobStore;
pub use collection::Collection;
pub use error::CacheError;
pub use file_cache::{ArtifactRecord, FileCache, FileRecord};
pub use ledger::ModTimeLedger;
pub use store::{FlushSummary, Namespace, Store, StoreStats};
pub use value_cache::ValueCache;
