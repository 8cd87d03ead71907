//! Repository error kinds surfaced to callers.

use crate::index::IndexError;
use crate::model::ValidationError;
use crate::store::StoreError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RepoResult<T> = Result<T, RepoError>;

/// Entity namespace for not-found reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Resource,
    Tag,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Resource => "resource",
            Self::Tag => "tag",
        }
    }
}

/// Error kinds returned by repository operations.
#[derive(Debug)]
pub enum RepoError {
    /// Entity absent from the record store.
    NotFound { entity: EntityKind, key: String },
    /// Create on an id that already exists.
    Conflict(String),
    /// Missing or malformed field on create.
    Invalid(ValidationError),
    /// Record store I/O or decoding failure.
    Storage(StoreError),
    /// Relationship index write or traversal failure.
    Query(IndexError),
    /// Startup index rebuild failed; the repository must not serve traffic.
    Rebuild(Box<RepoError>),
}

impl RepoError {
    pub(crate) fn resource_not_found(id: &str) -> Self {
        Self::NotFound {
            entity: EntityKind::Resource,
            key: id.to_string(),
        }
    }

    pub(crate) fn tag_not_found(name: &str) -> Self {
        Self::NotFound {
            entity: EntityKind::Tag,
            key: name.to_string(),
        }
    }

    /// Stable short code used in log lines and boundary responses.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::Conflict(_) => "conflict",
            Self::Invalid(_) => "invalid",
            Self::Storage(_) => "storage_error",
            Self::Query(_) => "query_error",
            Self::Rebuild(_) => "rebuild_failed",
        }
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound { entity, key } => write!(f, "{} not found: {key}", entity.as_str()),
            Self::Conflict(id) => write!(f, "resource already exists: {id}"),
            Self::Invalid(err) => write!(f, "invalid entity: {err}"),
            Self::Storage(err) => write!(f, "storage error: {err}"),
            Self::Query(err) => write!(f, "index error: {err}"),
            Self::Rebuild(err) => write!(f, "index rebuild failed: {err}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Invalid(err) => Some(err),
            Self::Storage(err) => Some(err),
            Self::Query(err) => Some(err),
            Self::Rebuild(err) => Some(err.as_ref()),
            Self::NotFound { .. } | Self::Conflict(_) => None,
        }
    }
}

impl From<ValidationError> for RepoError {
    fn from(value: ValidationError) -> Self {
        Self::Invalid(value)
    }
}

impl From<StoreError> for RepoError {
    fn from(value: StoreError) -> Self {
        Self::Storage(value)
    }
}

impl From<IndexError> for RepoError {
    fn from(value: IndexError) -> Self {
        Self::Query(value)
    }
}
