use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// How read verbs (`find`, `find_one`, `distinct`, `count`) see a collection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadConsistency {
    /// Serve reads from the cache without taking the collection lock. A read
    /// may observe state that an in-flight mutation is about to replace.
    #[default]
    Cached,
    /// Take the collection lock and reload from disk for every read.
    Locked,
}

/// Configuration for a [`Repository`](crate::Repository).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory holding one `<collection>.json` file per collection.
    pub root: PathBuf,
    pub read_consistency: ReadConsistency,
    /// Pretty-print collection files.
    pub pretty: bool,
}

impl StoreConfig {
    /// Default configuration rooted at `root`.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("data"),
            read_consistency: ReadConsistency::Cached,
            pretty: true,
        }
    }
}
