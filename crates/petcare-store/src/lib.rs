//! Embedded JSON-file document store for the PetCare service.
//!
//! Documents are grouped into named collections, each persisted as a single
//! JSON array in `<root>/<collection>.json`. The store is driven directly by
//! concurrent request handlers and background tasks within one process.
//!
//! # Components
//!
//! - [`codec`] -- on-disk representation and timestamp normalization
//! - [`CollectionStore`] -- per-collection file load/save with a cache
//! - [`LockTable`] -- one async lock per collection, created lazily
//! - [`query`] -- equality matching and the `$set` / `$inc` interpreter
//! - [`Repository`] -- the verb surface (`insert_one`, `find`, `find_one`,
//!   `update_one`, `delete_one`, `distinct`)
//!
//! # Design Rules
//!
//! 1. Mutations on one collection are strictly serialized; different
//!    collections proceed in parallel.
//! 2. Every successful mutation rewrites the collection file exactly once,
//!    via temp-file-then-rename.
//! 3. Reads are served from the cache without the lock unless
//!    [`ReadConsistency::Locked`] is configured.
//! 4. A missing collection file is an empty collection; a malformed one is
//!    logged and read as empty.
//! 5. Every document returned to a caller is an independent copy.

pub mod clock;
pub mod codec;
pub mod collection;
pub mod config;
pub mod document;
pub mod error;
pub mod guard;
pub mod query;
pub mod repository;

// Re-export primary types at crate root for ergonomic imports.
pub use clock::TimestampClock;
pub use collection::{validate_collection_name, CollectionStore};
pub use config::{ReadConsistency, StoreConfig};
pub use document::{Document, CREATED_AT, ID_ALIAS, ID_FIELD, UPDATED_AT};
pub use error::{StoreError, StoreResult};
pub use guard::LockTable;
pub use query::{matches, values_equal, Query, Update};
pub use repository::{
    by_id, collections, global, install_global, Collection, DeleteResult, InsertOneResult,
    Repository, UpdateResult,
};
