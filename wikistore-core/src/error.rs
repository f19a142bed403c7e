//! Error taxonomy for the persistence engine
//!
//! Every store operation returns [`Result`]. Backend failures are surfaced
//! as-is and never retried by this layer.

/// Result type for store operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur during store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A value's shape does not match the kind declared by the class schema.
    /// The whole write is rejected; no partial row group is committed.
    #[error("Type mismatch for property '{name}': {detail}")]
    TypeMismatch { name: String, detail: String },

    /// Load on an identity that was never written.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A stored row is malformed for its declared kind.
    #[error("Cannot decode property '{name}': {reason}")]
    Decode { name: String, reason: String },

    /// begin-while-open or end-while-idle. Always caller misuse.
    #[error("Transaction state error: {0}")]
    TransactionState(&'static str),

    /// Connectivity or constraint failure from the underlying database.
    #[error("Database error: {0}")]
    Backend(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    pub fn not_found(what: impl Into<String>) -> Self {
        StoreError::NotFound(what.into())
    }

    pub fn type_mismatch(name: impl Into<String>, detail: impl Into<String>) -> Self {
        StoreError::TypeMismatch {
            name: name.into(),
            detail: detail.into(),
        }
    }

    pub fn decode(name: impl Into<String>, reason: impl Into<String>) -> Self {
        StoreError::Decode {
            name: name.into(),
            reason: reason.into(),
        }
    }
}
