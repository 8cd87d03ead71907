//! Versioned DDL for both database roles.
//!
//! # Invariants
//! - Versions are strictly increasing within one schema.
//! - All pending steps commit in one transaction together with the new
//!   `user_version`.

use crate::db::{DbError, DbResult};
use log::info;
use rusqlite::Connection;

/// `(version, ddl)` pairs in application order.
type Steps = &'static [(u32, &'static str)];

const RECORD_STORE_STEPS: Steps = &[(1, include_str!("0001_record_store.sql"))];

const RELATIONSHIP_INDEX_STEPS: Steps = &[(1, include_str!("0001_relationship_index.sql"))];

/// Database role selecting which migration set applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schema {
    /// Canonical `resources` and `tags` tables.
    RecordStore,
    /// Derived `edges` table of the relationship index.
    RelationshipIndex,
}

impl Schema {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RecordStore => "record_store",
            Self::RelationshipIndex => "relationship_index",
        }
    }

    fn steps(self) -> Steps {
        match self {
            Self::RecordStore => RECORD_STORE_STEPS,
            Self::RelationshipIndex => RELATIONSHIP_INDEX_STEPS,
        }
    }
}

/// Highest version this build can create for `schema`.
pub fn latest_version(schema: Schema) -> u32 {
    schema.steps().iter().map(|(version, _)| *version).max().unwrap_or(0)
}

/// Brings `conn` up to [`latest_version`] for `schema`.
///
/// # Errors
/// - `DbError::SchemaTooNew` when the file is ahead of this build.
pub fn apply_migrations(conn: &mut Connection, schema: Schema) -> DbResult<()> {
    let found: u32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    let supported = latest_version(schema);
    if found > supported {
        return Err(DbError::SchemaTooNew {
            schema,
            found,
            supported,
        });
    }

    let pending: Vec<_> = schema
        .steps()
        .iter()
        .filter(|(version, _)| *version > found)
        .collect();
    if pending.is_empty() {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for (_, ddl) in &pending {
        tx.execute_batch(ddl)?;
    }
    tx.pragma_update(None, "user_version", supported)?;
    tx.commit()?;

    info!(
        "event=db_migrate module=db status=ok schema={} from={} to={} steps={}",
        schema.as_str(),
        found,
        supported,
        pending.len()
    );
    Ok(())
}
