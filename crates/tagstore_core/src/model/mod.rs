//! Domain model for tagged resources.
//!
//! # Responsibility
//! - Define canonical `Resource` and `Tag` records shared by store and index.
//! - Define query parameter shapes used by filtered lookups.
//!
//! # Invariants
//! - `Resource.id` and `Tag.name` are the identities of their records.
//! - A stored resource carries fully materialized tags (name + color).

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod color;
pub mod resource;
pub mod tag;

/// Validation failure for entities entering the repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Required field is empty or whitespace-only.
    MissingField(&'static str),
    /// Color is not a `#RRGGBB` hex string.
    InvalidColor(String),
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingField(field) => write!(f, "missing required field `{field}`"),
            Self::InvalidColor(value) => {
                write!(f, "invalid color `{value}`; expected #RRGGBB hex")
            }
        }
    }
}

impl Error for ValidationError {}
