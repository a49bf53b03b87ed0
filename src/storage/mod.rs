//! Persistence for usage entries.
//!
//! [`StorageBackend`] is the contract both persistence mechanisms satisfy;
//! [`Storage`] is the facade the rest of the application talks to. The
//! backend is chosen once at startup from configuration and callers never
//! branch on which one is active.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::domain::EntryId;
use crate::models::{NewUsageEntry, UsageEntry, UsageEntryPatch, ValidationError};

pub mod csv;
pub mod facade;
pub mod legacy;

pub use self::csv::CsvBackend;
pub use facade::Storage;

/// Errors surfaced by storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Entry not found: {0}")]
    NotFound(EntryId),

    /// The underlying file or database failed. Nothing partial is visible.
    #[error("Storage I/O error: {0}")]
    Io(String),

    #[error("Unknown storage backend '{0}' (expected 'SQLite' or 'CSV')")]
    UnknownBackend(String),
}

impl From<sea_orm::DbErr> for StorageError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<::csv::Error> for StorageError {
    fn from(err: ::csv::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<tokio::task::JoinError> for StorageError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Io(format!("storage task failed: {err}"))
    }
}

/// Which persistence mechanism is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    #[default]
    Sqlite,
    Csv,
}

impl BackendKind {
    /// Resolves the configured selector.
    ///
    /// Unset selects SQLite. An unrecognized value is an error in strict
    /// mode and falls back to SQLite with a warning otherwise.
    pub fn resolve(selector: Option<&str>, strict: bool) -> Result<Self, StorageError> {
        let Some(raw) = selector.map(str::trim).filter(|s| !s.is_empty()) else {
            return Ok(Self::default());
        };

        match raw.parse() {
            Ok(kind) => Ok(kind),
            Err(err) if strict => Err(err),
            Err(_) => {
                tracing::warn!(
                    "Unrecognized storage backend '{raw}', falling back to {}",
                    Self::default()
                );
                Ok(Self::default())
            }
        }
    }
}

impl FromStr for BackendKind {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("sqlite") {
            Ok(Self::Sqlite)
        } else if s.eq_ignore_ascii_case("csv") {
            Ok(Self::Csv)
        } else {
            Err(StorageError::UnknownBackend(s.to_string()))
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sqlite => f.write_str("SQLite"),
            Self::Csv => f.write_str("CSV"),
        }
    }
}

/// CRUD contract shared by every backend.
///
/// Implementations must produce the same logical results for the same
/// sequence of calls. Each call is atomic on its own; there are no
/// multi-call transactions.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// One-time schema upgrade run at startup. Must be idempotent and must
    /// never discard existing rows.
    async fn migrate(&self) -> Result<(), StorageError>;

    /// Assigns a fresh id, stamps `created_at = updated_at = now` and
    /// persists the entry.
    async fn create(&self, entry: NewUsageEntry) -> Result<UsageEntry, StorageError>;

    /// Every entry in stable order (insertion order for the flat file,
    /// primary-key order for the database).
    async fn read_all(&self) -> Result<Vec<UsageEntry>, StorageError>;

    async fn read_by_id(&self, id: EntryId) -> Result<UsageEntry, StorageError>;

    /// Entries created at or after `since`, oldest first.
    async fn read_since(&self, since: DateTime<Utc>) -> Result<Vec<UsageEntry>, StorageError>;

    async fn update(
        &self,
        id: EntryId,
        patch: UsageEntryPatch,
    ) -> Result<UsageEntry, StorageError>;

    /// Removes the entry. Deleting an id that is already gone is
    /// [`StorageError::NotFound`].
    async fn delete(&self, id: EntryId) -> Result<(), StorageError>;

    async fn count(&self) -> Result<u64, StorageError>;
}
