//! Record store: canonical durable storage of resources and tags.
//!
//! # Responsibility
//! - Provide point lookups, full scans and upserts keyed by `Resource.id`
//!   and `Tag.name`.
//! - Keep SQL details inside the persistence boundary.
//!
//! # Invariants
//! - Every single-entity write is all-or-nothing.
//! - Full scans are ordered by key, giving callers a stable snapshot order.
//! - The store is the source of truth; nothing else is durable.

use crate::db::DbError;
use crate::model::resource::Resource;
use crate::model::tag::Tag;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod sqlite_store;

pub use sqlite_store::SqliteRecordStore;

pub type StoreResult<T> = Result<T, StoreError>;

/// Storage-layer error for record persistence and decoding.
#[derive(Debug)]
pub enum StoreError {
    Db(DbError),
    /// Record could not be encoded for persistence.
    Encode(String),
    /// Persisted row cannot be converted to a valid record.
    InvalidData(String),
    /// A writer panicked while holding the connection lock.
    LockPoisoned,
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Encode(message) => write!(f, "unable to encode record: {message}"),
            Self::InvalidData(message) => write!(f, "invalid persisted record: {message}"),
            Self::LockPoisoned => write!(f, "record store connection lock poisoned"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Encode(_) | Self::InvalidData(_) | Self::LockPoisoned => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Key-value style access to canonical records.
///
/// Absence is reported as `Ok(None)`; callers decide whether that is an error.
pub trait RecordStore: Send + Sync {
    fn get_resource(&self, id: &str) -> StoreResult<Option<Resource>>;
    fn get_all_resources(&self) -> StoreResult<Vec<Resource>>;
    /// Full overwrite with upsert semantics.
    fn put_resource(&self, resource: &Resource) -> StoreResult<()>;
    fn get_tag(&self, name: &str) -> StoreResult<Option<Tag>>;
    fn get_all_tags(&self) -> StoreResult<Vec<Tag>>;
    /// Full overwrite with upsert semantics.
    fn put_tag(&self, tag: &Tag) -> StoreResult<()>;
}
