use housing_shared::CryptoError;
use thiserror::Error;

/// Errors produced by the store layer.
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite error.
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Failed to determine a platform data directory.
    #[error("Could not determine application data directory")]
    NoDataDir,

    /// Generic I/O error (e.g. creating the database directory).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Migration failure.
    #[error("Migration error: {0}")]
    Migration(String),

    /// A stored payload or an imported snapshot is not valid JSON.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Sealing or unsealing the persisted payload failed.
    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// Writing a storage key failed; nothing was committed.
    #[error("Failed to persist '{key}': {source}")]
    Persistence {
        key: &'static str,
        #[source]
        source: Box<StoreError>,
    },

    /// An edit would give a second record this national ID.
    #[error("National ID {0} already belongs to another application")]
    DuplicateNationalId(String),

    /// Simulated backend failure (in-memory backend only).
    #[error("Storage unavailable: {0}")]
    Unavailable(&'static str),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;
