//! The repository facade: the verb surface callers use.
//!
//! Every mutating verb takes the collection's lock for its whole
//! load-modify-save sequence and rewrites the collection file exactly once on
//! success. Read verbs follow [`ReadConsistency`]. Every document handed back
//! is an owned copy, so callers can never alias cached or persisted state.

use std::path::Path;
use std::sync::{Arc, OnceLock};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::clock::{format_timestamp, TimestampClock};
use crate::collection::{validate_collection_name, CollectionStore};
use crate::config::{ReadConsistency, StoreConfig};
use crate::document::{Document, CREATED_AT, ID_FIELD, UPDATED_AT};
use crate::error::StoreResult;
use crate::guard::LockTable;
use crate::query::{compare_values, matches, values_equal, Query, Update};

/// Well-known collection names.
pub mod collections {
    pub const PETS: &str = "pets";
    pub const VIDEOS: &str = "videos";
    pub const USERS: &str = "users";
    pub const PRODUCTS: &str = "products";
}

/// Outcome of [`Repository::insert_one`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsertOneResult {
    pub inserted_id: String,
}

/// Outcome of [`Repository::update_one`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateResult {
    pub matched_count: u64,
    pub modified_count: u64,
}

/// Outcome of [`Repository::delete_one`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteResult {
    pub deleted_count: u64,
}

/// Embedded JSON-file document store.
///
/// Share one instance per process (behind an `Arc`) so every caller goes
/// through the same lock table and cache.
#[derive(Debug)]
pub struct Repository {
    config: StoreConfig,
    collections: CollectionStore,
    locks: LockTable,
    clock: TimestampClock,
}

impl Repository {
    /// Create a repository. The root directory is created on first save.
    pub fn new(config: StoreConfig) -> Self {
        let collections = CollectionStore::new(config.root.clone(), config.pretty);
        Self {
            config,
            collections,
            locks: LockTable::new(),
            clock: TimestampClock::new(),
        }
    }

    /// Create a repository, creating its root directory now.
    pub async fn open(config: StoreConfig) -> StoreResult<Arc<Self>> {
        tokio::fs::create_dir_all(&config.root).await?;
        debug!(root = %config.root.display(), "opened document store");
        Ok(Arc::new(Self::new(config)))
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn root(&self) -> &Path {
        self.collections.root()
    }

    /// A handle bound to one collection.
    pub fn collection(self: &Arc<Self>, name: &str) -> StoreResult<Collection> {
        validate_collection_name(name)?;
        Ok(Collection {
            repo: Arc::clone(self),
            name: name.to_string(),
        })
    }

    pub fn pets(self: &Arc<Self>) -> Collection {
        self.known(collections::PETS)
    }

    pub fn videos(self: &Arc<Self>) -> Collection {
        self.known(collections::VIDEOS)
    }

    pub fn users(self: &Arc<Self>) -> Collection {
        self.known(collections::USERS)
    }

    pub fn products(self: &Arc<Self>) -> Collection {
        self.known(collections::PRODUCTS)
    }

    fn known(self: &Arc<Self>, name: &'static str) -> Collection {
        Collection {
            repo: Arc::clone(self),
            name: name.to_string(),
        }
    }

    // ---- Mutating verbs ----

    /// Insert a document, assigning `_id` and timestamps where absent.
    ///
    /// A caller-supplied `id` becomes `_id`. A caller-supplied `_id` is
    /// trusted; uniqueness is only guaranteed for generated identifiers.
    pub async fn insert_one(&self, collection: &str, mut document: Document) -> StoreResult<InsertOneResult> {
        validate_collection_name(collection)?;
        document.normalize_id()?;
        let inserted_id = match document.id() {
            Some(id) => id.to_string(),
            None => {
                let id = Uuid::new_v4().to_string();
                document.insert(ID_FIELD, Value::String(id.clone()));
                id
            }
        };
        let now = self.clock.stamp();
        if !document.contains(CREATED_AT) {
            document.insert(CREATED_AT, Value::String(now.clone()));
        }
        if !document.contains(UPDATED_AT) {
            document.insert(UPDATED_AT, Value::String(now));
        }

        let _guard = self.locks.acquire(collection).await;
        let mut documents = self.collections.load_fresh(collection).await?;
        documents.push(document);
        self.collections.save(collection, documents).await?;

        debug!(collection, id = %inserted_id, "inserted document");
        Ok(InsertOneResult { inserted_id })
    }

    /// Apply `update` to the first document, in stored order, matching
    /// `query`.
    ///
    /// A matched document that already carries `updated_at` has it refreshed.
    /// An update that writes no fields counts as matched but not modified and
    /// does not rewrite the file.
    pub async fn update_one(&self, collection: &str, query: &Query, update: &Update) -> StoreResult<UpdateResult> {
        validate_collection_name(collection)?;
        let _guard = self.locks.acquire(collection).await;
        let mut documents = self.collections.load_fresh(collection).await?;

        let Some(document) = documents.iter_mut().find(|d| matches(d, Some(query))) else {
            return Ok(UpdateResult::default());
        };
        let had_updated_at = document.contains(UPDATED_AT);
        let previous = document
            .get(UPDATED_AT)
            .and_then(Value::as_str)
            .map(str::to_owned);
        if !update.apply(document)? {
            return Ok(UpdateResult {
                matched_count: 1,
                modified_count: 0,
            });
        }
        if had_updated_at {
            let ts = self.clock.now_after(previous.as_deref());
            document.insert(UPDATED_AT, Value::String(format_timestamp(&ts)));
        }
        self.collections.save(collection, documents).await?;

        debug!(collection, "updated document");
        Ok(UpdateResult {
            matched_count: 1,
            modified_count: 1,
        })
    }

    /// Remove the first document, in stored order, matching `query`.
    pub async fn delete_one(&self, collection: &str, query: &Query) -> StoreResult<DeleteResult> {
        validate_collection_name(collection)?;
        let _guard = self.locks.acquire(collection).await;
        let mut documents = self.collections.load_fresh(collection).await?;

        let Some(index) = documents.iter().position(|d| matches(d, Some(query))) else {
            return Ok(DeleteResult::default());
        };
        documents.remove(index);
        self.collections.save(collection, documents).await?;

        debug!(collection, "deleted document");
        Ok(DeleteResult { deleted_count: 1 })
    }

    // ---- Read verbs ----

    /// All documents matching `query`, in stored order. An absent or empty
    /// query returns every document.
    pub async fn find(&self, collection: &str, query: Option<&Query>) -> StoreResult<Vec<Document>> {
        let documents = self.snapshot(collection).await?;
        Ok(documents
            .iter()
            .filter(|d| matches(d, query))
            .cloned()
            .collect())
    }

    /// The first document matching `query`, or `None`.
    pub async fn find_one(&self, collection: &str, query: &Query) -> StoreResult<Option<Document>> {
        let documents = self.snapshot(collection).await?;
        Ok(documents.iter().find(|d| matches(d, Some(query))).cloned())
    }

    /// Sorted, deduplicated values of `field` across the collection.
    ///
    /// Documents without the field, or with it set to `null`, contribute
    /// nothing.
    pub async fn distinct(&self, collection: &str, field: &str) -> StoreResult<Vec<Value>> {
        let documents = self.snapshot(collection).await?;
        let mut values: Vec<Value> = documents
            .iter()
            .filter_map(|d| d.get(field))
            .filter(|v| !v.is_null())
            .cloned()
            .collect();
        values.sort_by(compare_values);
        values.dedup_by(|a, b| values_equal(a, b));
        Ok(values)
    }

    /// Number of documents matching `query`.
    pub async fn count(&self, collection: &str, query: Option<&Query>) -> StoreResult<usize> {
        let documents = self.snapshot(collection).await?;
        Ok(documents.iter().filter(|d| matches(d, query)).count())
    }

    /// Names of collections with a backing file.
    pub async fn collections(&self) -> StoreResult<Vec<String>> {
        self.collections.list().await
    }

    async fn snapshot(&self, collection: &str) -> StoreResult<Arc<Vec<Document>>> {
        validate_collection_name(collection)?;
        match self.config.read_consistency {
            ReadConsistency::Cached => self.collections.load(collection).await,
            ReadConsistency::Locked => {
                let _guard = self.locks.acquire(collection).await;
                Ok(Arc::new(self.collections.load_fresh(collection).await?))
            }
        }
    }
}

/// A [`Repository`] handle bound to one collection.
#[derive(Clone, Debug)]
pub struct Collection {
    repo: Arc<Repository>,
    name: String,
}

impl Collection {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn repository(&self) -> &Arc<Repository> {
        &self.repo
    }

    pub async fn insert_one(&self, document: Document) -> StoreResult<InsertOneResult> {
        self.repo.insert_one(&self.name, document).await
    }

    pub async fn find(&self, query: Option<&Query>) -> StoreResult<Vec<Document>> {
        self.repo.find(&self.name, query).await
    }

    pub async fn find_one(&self, query: &Query) -> StoreResult<Option<Document>> {
        self.repo.find_one(&self.name, query).await
    }

    /// Find by `_id`.
    pub async fn get(&self, id: &str) -> StoreResult<Option<Document>> {
        self.repo.find_one(&self.name, &by_id(id)).await
    }

    pub async fn update_one(&self, query: &Query, update: &Update) -> StoreResult<UpdateResult> {
        self.repo.update_one(&self.name, query, update).await
    }

    pub async fn delete_one(&self, query: &Query) -> StoreResult<DeleteResult> {
        self.repo.delete_one(&self.name, query).await
    }

    pub async fn distinct(&self, field: &str) -> StoreResult<Vec<Value>> {
        self.repo.distinct(&self.name, field).await
    }

    pub async fn count(&self, query: Option<&Query>) -> StoreResult<usize> {
        self.repo.count(&self.name, query).await
    }
}

/// Query selecting a document by `_id`.
pub fn by_id(id: &str) -> Query {
    let mut query = Query::new();
    query.insert(ID_FIELD.to_string(), Value::String(id.to_string()));
    query
}

static GLOBAL: OnceLock<Arc<Repository>> = OnceLock::new();

/// The process-wide repository, built from [`StoreConfig::default`] on first
/// access unless one was installed with [`install_global`].
pub fn global() -> Arc<Repository> {
    Arc::clone(GLOBAL.get_or_init(|| Arc::new(Repository::new(StoreConfig::default()))))
}

/// Install `repo` as the process-wide repository.
///
/// Fails, handing `repo` back, if the global was already initialized.
pub fn install_global(repo: Arc<Repository>) -> Result<(), Arc<Repository>> {
    GLOBAL.set(repo)
}
