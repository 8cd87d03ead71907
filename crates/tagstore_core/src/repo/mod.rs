//! Repository layer: the consistency boundary between canonical records and
//! the derived relationship index.
//!
//! # Responsibility
//! - Own the record store and relationship index handles exclusively.
//! - Translate store/index failures into caller-facing error kinds.
//!
//! # Invariants
//! - Store first, index second for every mutation.
//! - The hydration-miss truncation in filtered finds is the only failure that
//!   is not reported to the caller; it is logged instead.

pub mod error;
pub mod repository;

pub use error::{EntityKind, RepoError, RepoResult};
pub use repository::Repository;
