//! File-backed collection storage.
//!
//! Each collection lives in `<root>/<collection>.json`. Saves write a
//! uniquely named temporary file next to the target, fsync it, then rename it
//! over the target, so a crash mid-write never leaves a torn collection file.
//! The last loaded or saved state of each collection is cached in memory.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::codec;
use crate::document::Document;
use crate::error::{StoreError, StoreResult};

/// Extension of collection files.
pub const COLLECTION_EXT: &str = "json";

const MAX_NAME_LEN: usize = 64;

/// Validate a collection name, returning `Ok(())` if it is usable as a file
/// stem.
///
/// Names must be 1-64 ASCII alphanumerics, `_` or `-`. This rules out path
/// separators, `..` and hidden files.
pub fn validate_collection_name(name: &str) -> StoreResult<()> {
    let reason = if name.is_empty() {
        "must not be empty"
    } else if name.len() > MAX_NAME_LEN {
        "must be at most 64 characters"
    } else if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        "may only contain ASCII letters, digits, '_' and '-'"
    } else {
        return Ok(());
    };
    Err(StoreError::InvalidCollectionName {
        name: name.to_string(),
        reason: reason.into(),
    })
}

/// Per-collection file storage with an in-memory cache.
pub struct CollectionStore {
    root: PathBuf,
    pretty: bool,
    cache: RwLock<HashMap<String, Arc<Vec<Document>>>>,
}

impl CollectionStore {
    pub fn new(root: impl Into<PathBuf>, pretty: bool) -> Self {
        Self {
            root: root.into(),
            pretty,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the backing file for `collection`.
    pub fn path_for(&self, collection: &str) -> PathBuf {
        self.root.join(format!("{collection}.{COLLECTION_EXT}"))
    }

    /// Current contents of `collection`, from the cache when present.
    ///
    /// A missing file is an empty collection. A file that fails to decode is
    /// logged and also read as empty.
    pub async fn load(&self, collection: &str) -> StoreResult<Arc<Vec<Document>>> {
        validate_collection_name(collection)?;
        if let Some(docs) = self.cached(collection) {
            return Ok(docs);
        }
        let docs = Arc::new(self.read_file(collection).await?);
        let mut cache = self.cache.write().expect("collection cache poisoned");
        // A save that landed while we were reading has already populated the
        // entry with newer state; keep it.
        Ok(Arc::clone(
            cache.entry(collection.to_string()).or_insert(docs),
        ))
    }

    /// Read `collection` from disk, bypassing the cache, and refresh the
    /// cache with what was read.
    ///
    /// Callers must hold the collection's lock; this is the load used before
    /// a mutation.
    pub async fn load_fresh(&self, collection: &str) -> StoreResult<Vec<Document>> {
        validate_collection_name(collection)?;
        let docs = self.read_file(collection).await?;
        self.cache
            .write()
            .expect("collection cache poisoned")
            .insert(collection.to_string(), Arc::new(docs.clone()));
        Ok(docs)
    }

    /// Persist the full collection atomically and cache the saved state.
    ///
    /// On failure the temporary file is removed, the previous file is left
    /// as it was, the cache is not touched, and the error is returned.
    pub async fn save(&self, collection: &str, mut documents: Vec<Document>) -> StoreResult<()> {
        validate_collection_name(collection)?;
        documents.iter_mut().for_each(codec::normalize_temporal);
        let bytes = codec::encode(&documents, self.pretty)?;

        let path = self.path_for(collection);
        let temp_path = self
            .root
            .join(format!("{collection}.{COLLECTION_EXT}.{}.tmp", Uuid::new_v4().simple()));

        if let Err(e) = self.write_atomic(&temp_path, &path, &bytes).await {
            error!(collection, error = %e, "failed to save collection");
            if let Err(cleanup) = fs::remove_file(&temp_path).await {
                if cleanup.kind() != ErrorKind::NotFound {
                    warn!(collection, error = %cleanup, "failed to remove temporary file");
                }
            }
            return Err(e.into());
        }

        debug!(collection, count = documents.len(), bytes = bytes.len(), "saved collection");
        self.cache
            .write()
            .expect("collection cache poisoned")
            .insert(collection.to_string(), Arc::new(documents));
        Ok(())
    }

    /// Names of the collections that have a backing file, sorted.
    pub async fn list(&self) -> StoreResult<Vec<String>> {
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(COLLECTION_EXT) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if validate_collection_name(stem).is_ok() && entry.file_type().await?.is_file() {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Cached state of `collection`, if any.
    pub fn cached(&self, collection: &str) -> Option<Arc<Vec<Document>>> {
        self.cache
            .read()
            .expect("collection cache poisoned")
            .get(collection)
            .cloned()
    }

    async fn read_file(&self, collection: &str) -> StoreResult<Vec<Document>> {
        let path = self.path_for(collection);
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(collection, "no collection file; treating as empty");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };
        match codec::decode(&bytes) {
            Ok(docs) => {
                debug!(collection, count = docs.len(), "loaded collection");
                Ok(docs)
            }
            Err(e) => {
                warn!(collection, error = %e, "malformed collection file; treating as empty");
                Ok(Vec::new())
            }
        }
    }

    async fn write_atomic(&self, temp_path: &Path, path: &Path, bytes: &[u8]) -> std::io::Result<()> {
        fs::create_dir_all(&self.root).await?;
        let mut file = fs::File::create(temp_path).await?;
        file.write_all(bytes).await?;
        file.sync_all().await?;
        drop(file);
        fs::rename(temp_path, path).await
    }
}

impl std::fmt::Debug for CollectionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let cached = self.cache.read().map(|c| c.len()).unwrap_or(0);
        f.debug_struct("CollectionStore")
            .field("root", &self.root)
            .field("cached_collections", &cached)
            .finish()
    }
}
