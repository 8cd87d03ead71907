//! SQLite-backed relationship index.
//!
//! Same query semantics as [`super::MemoryIndex`]; the composite primary key
//! on `edges` makes the edge set a set, and multi-edge writes share one
//! transaction.

use super::{
    intersect_filters, resource_edges, resource_tag_edges, tag_edges, Edge, IndexError,
    IndexResult, Node, NodeKind, Predicate, RelationshipIndex, RESOURCE_FILTERS, TAG_FILTERS,
};
use crate::db::{open_db, open_db_in_memory, Schema};
use crate::model::resource::{Resource, ResourceParams};
use crate::model::tag::{Tag, TagParams};
use rusqlite::{params, Connection, TransactionBehavior};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

pub struct SqliteIndex {
    conn: Mutex<Connection>,
}

impl SqliteIndex {
    /// Opens a file-backed index, or an in-memory one when `path` is `None`.
    pub fn open(path: Option<&Path>) -> IndexResult<Self> {
        let conn = match path {
            Some(path) => open_db(path, Schema::RelationshipIndex)?,
            None => open_db_in_memory(Schema::RelationshipIndex)?,
        };
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> IndexResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| IndexError::LockPoisoned)
    }

    fn insert_all(&self, edges: impl IntoIterator<Item = Edge>) -> IndexResult<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO edges (subject_kind, subject, predicate, object_kind, object)
                 VALUES (?1, ?2, ?3, ?4, ?5);",
            )?;
            for edge in edges {
                stmt.execute(edge_params(&edge))?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn remove_all(&self, edges: impl IntoIterator<Item = Edge>) -> IndexResult<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        {
            let mut stmt = tx.prepare(
                "DELETE FROM edges
                 WHERE subject_kind = ?1
                   AND subject = ?2
                   AND predicate = ?3
                   AND object_kind = ?4
                   AND object = ?5;",
            )?;
            for edge in edges {
                stmt.execute(edge_params(&edge))?;
            }
        }
        tx.commit()?;
        Ok(())
    }
}

fn edge_params(edge: &Edge) -> [&str; 5] {
    [
        edge.subject.kind.as_str(),
        edge.subject.value.as_str(),
        edge.predicate.as_str(),
        edge.object.kind.as_str(),
        edge.object.value.as_str(),
    ]
}

fn objects_of(
    conn: &Connection,
    subject: &Node,
    predicate: Predicate,
) -> IndexResult<BTreeSet<String>> {
    let mut stmt = conn.prepare_cached(
        "SELECT object_kind, object
         FROM edges
         WHERE subject_kind = ?1
           AND subject = ?2
           AND predicate = ?3;",
    )?;
    let mut rows = stmt.query(params![
        subject.kind.as_str(),
        subject.value.as_str(),
        predicate.as_str()
    ])?;

    let mut objects = BTreeSet::new();
    while let Some(row) = rows.next()? {
        let kind_text: String = row.get(0)?;
        if NodeKind::parse(&kind_text).is_none() {
            return Err(IndexError::InvalidData(format!(
                "invalid node kind `{kind_text}` in edges.object_kind"
            )));
        }
        objects.insert(row.get::<_, String>(1)?);
    }
    Ok(objects)
}

impl RelationshipIndex for SqliteIndex {
    fn reset(&self) -> IndexResult<()> {
        self.lock()?.execute("DELETE FROM edges;", [])?;
        Ok(())
    }

    fn create_resource(&self, resource: &Resource) -> IndexResult<()> {
        self.insert_all(resource_edges(resource))
    }

    fn create_tag(&self, tag: &Tag) -> IndexResult<()> {
        self.insert_all(tag_edges(tag))
    }

    fn add_resource_tag(&self, resource: &Resource, tag_name: &str) -> IndexResult<()> {
        self.insert_all(resource_tag_edges(&resource.id, tag_name))
    }

    fn delete_resource_tag(&self, resource: &Resource, tag_name: &str) -> IndexResult<()> {
        self.remove_all(resource_tag_edges(&resource.id, tag_name))
    }

    fn find_all_resources(&self, params: &ResourceParams) -> IndexResult<Vec<String>> {
        let conn = self.lock()?;
        intersect_filters(RESOURCE_FILTERS, params, Predicate::Resource, |node, target| {
            objects_of(&conn, node, target)
        })
    }

    fn find_all_tags(&self, params: &TagParams) -> IndexResult<Vec<String>> {
        let conn = self.lock()?;
        intersect_filters(TAG_FILTERS, params, Predicate::Tag, |node, target| {
            objects_of(&conn, node, target)
        })
    }

    fn edge_count(&self) -> IndexResult<usize> {
        let count: i64 = self
            .lock()?
            .query_row("SELECT COUNT(*) FROM edges;", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or_default())
    }
}
