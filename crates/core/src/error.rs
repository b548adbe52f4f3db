//! Error types for storage access and engine mutations
//!
//! Permission checks never surface these: storage failures are absorbed at the
//! store boundary and turned into "absent". Only the mutating operations of
//! [`PermissionEngine`](crate::PermissionEngine) return them, so a command layer
//! can tell its user what went wrong.

use crate::player::PlayerId;

/// Error returned by a [`PermissionStorage`](crate::storage::PermissionStorage) backend
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    /// The backend could not be reached or the query failed
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// The write conflicts with existing data (e.g. duplicate group name)
    #[error("Storage conflict: {0}")]
    Conflict(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Error returned by mutating engine operations
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// No group with this name exists in cache or storage
    #[error("Group not found: {0}")]
    GroupNotFound(String),

    /// A group with this name already exists
    #[error("Group already exists: {0}")]
    GroupExists(String),

    /// The player has no record in storage
    #[error("Player not found: {0}")]
    PlayerNotFound(PlayerId),

    /// The paired storage write failed; the cache was left untouched
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Result type for engine mutations
pub type EngineResult<T> = Result<T, EngineError>;
