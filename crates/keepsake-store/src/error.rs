use thiserror::Error;

/// Errors produced by the store layer.
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite error.
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Generic I/O error (e.g. creating the database directory).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// No photo with the given id.
    #[error("Photo not found: {0}")]
    NotFound(String),

    /// A record with this id already exists.
    #[error("Photo already exists: {0}")]
    Duplicate(String),

    /// The requested status change is not allowed (approval is one-way).
    #[error("Cannot move photo {id} from {from} to {to}")]
    InvalidTransition {
        id: String,
        from: String,
        to: String,
    },

    /// Migration failure.
    #[error("Migration error: {0}")]
    Migration(String),

    /// A previous holder of the store lock panicked.
    #[error("Store lock poisoned")]
    LockPoisoned,
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;
