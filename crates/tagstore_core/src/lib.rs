//! Core of the tagstore service.
//!
//! Resources carry free-form tags; a durable record store holds the canonical
//! records and a rebuildable relationship index answers filtered lookups. The
//! [`Repository`] keeps both consistent and is the only API callers use.

pub mod config;
pub mod db;
pub mod index;
pub mod logging;
pub mod model;
pub mod repo;
pub mod store;

pub use config::{open_repository, AppRepository, Configuration, StartupError};
pub use index::{open_index, IndexError, MemoryIndex, RelationshipIndex, SqliteIndex};
pub use logging::{
    default_log_level, init_logging, init_logging_from_config, logging_status, LogSettings,
    LoggingError,
};
pub use model::color::{pick_color, random_color, Color, PALETTE};
pub use model::resource::{NewResource, Resource, ResourceParams};
pub use model::tag::{NewTag, Tag, TagParams};
pub use model::ValidationError;
pub use repo::{EntityKind, RepoError, RepoResult, Repository};
pub use store::{RecordStore, SqliteRecordStore, StoreError};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
