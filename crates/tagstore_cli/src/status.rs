//! Maps repository errors to response statuses and process exit codes.

use serde::Serialize;
use tagstore_core::RepoError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    BadRequest,
    NotFound,
    Conflict,
    Internal,
}

impl Status {
    pub fn of(err: &RepoError) -> Self {
        match err {
            RepoError::Invalid(_) => Self::BadRequest,
            RepoError::NotFound { .. } => Self::NotFound,
            RepoError::Conflict(_) => Self::Conflict,
            RepoError::Storage(_) | RepoError::Query(_) | RepoError::Rebuild(_) => Self::Internal,
        }
    }

    pub fn http_code(self) -> u16 {
        match self {
            Self::BadRequest => 400,
            Self::NotFound => 404,
            Self::Conflict => 409,
            Self::Internal => 500,
        }
    }

    /// Exit code 2 is shared with clap usage errors.
    pub fn exit_code(self) -> u8 {
        match self {
            Self::Internal => 1,
            Self::BadRequest => 2,
            Self::NotFound => 3,
            Self::Conflict => 4,
        }
    }
}

/// Error body printed to stderr.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub status: u16,
    pub error: &'static str,
    pub message: String,
}

impl ErrorBody {
    pub fn from_repo(err: &RepoError) -> Self {
        Self {
            status: Status::of(err).http_code(),
            error: err.code(),
            message: err.to_string(),
        }
    }
}
