/// Errors from document store operations.
///
/// Not-found conditions are not errors: they surface as `None` or zero
/// counts. A malformed collection file is not an error either; it is read as
/// an empty collection.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// I/O error from the underlying filesystem.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A collection could not be encoded for writing.
    #[error("codec error: {0}")]
    Codec(String),

    /// The collection name is not usable as a file name.
    #[error("invalid collection name {name:?}: {reason}")]
    InvalidCollectionName { name: String, reason: String },

    /// The document cannot be stored.
    #[error("invalid document: {0}")]
    InvalidDocument(String),

    /// The update payload cannot be applied.
    #[error("invalid update: {0}")]
    InvalidUpdate(String),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
