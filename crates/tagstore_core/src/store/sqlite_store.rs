//! SQLite-backed record store.
//!
//! Resources keep their materialized tag list as a JSON array column so one
//! row read yields the full record, mirroring how tags are embedded in the
//! serialized resource.

use super::{RecordStore, StoreError, StoreResult};
use crate::db::{open_db, open_db_in_memory, Schema};
use crate::model::color::Color;
use crate::model::resource::Resource;
use crate::model::tag::Tag;
use log::error;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const RESOURCE_SELECT_SQL: &str = "SELECT id, name, type, tags FROM resources";
const TAG_SELECT_SQL: &str = "SELECT name, color FROM tags";

/// Record store over one SQLite connection guarded by a mutex.
pub struct SqliteRecordStore {
    conn: Mutex<Connection>,
}

impl SqliteRecordStore {
    /// Opens a file-backed store, or an in-memory one when `path` is `None`.
    pub fn open(path: Option<&Path>) -> StoreResult<Self> {
        let conn = match path {
            Some(path) => open_db(path, Schema::RecordStore)?,
            None => open_db_in_memory(Schema::RecordStore)?,
        };
        Ok(Self::from_connection(conn))
    }

    /// Wraps an already migrated connection.
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }
}

impl RecordStore for SqliteRecordStore {
    fn get_resource(&self, id: &str) -> StoreResult<Option<Resource>> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                &format!("{RESOURCE_SELECT_SQL} WHERE id = ?1;"),
                [id],
                read_resource_columns,
            )
            .optional()?;
        row.map(decode_resource).transpose()
    }

    fn get_all_resources(&self) -> StoreResult<Vec<Resource>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!("{RESOURCE_SELECT_SQL} ORDER BY id ASC;"))?;
        let mut rows = stmt.query([])?;
        let mut resources = Vec::new();
        while let Some(row) = rows.next()? {
            resources.push(decode_resource(read_resource_columns(row)?)?);
        }
        Ok(resources)
    }

    fn put_resource(&self, resource: &Resource) -> StoreResult<()> {
        let tags_json = serde_json::to_string(&resource.tags).map_err(|err| {
            error!(
                "event=record_put module=store status=error entity=resource error_code=encode_failed error={}",
                err
            );
            StoreError::Encode(err.to_string())
        })?;

        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute(
            "INSERT INTO resources (id, name, type, tags)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                type = excluded.type,
                tags = excluded.tags,
                updated_at = (strftime('%s', 'now') * 1000);",
            params![
                resource.id.as_str(),
                resource.name.as_str(),
                resource.kind.as_str(),
                tags_json
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn get_tag(&self, name: &str) -> StoreResult<Option<Tag>> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                &format!("{TAG_SELECT_SQL} WHERE name = ?1;"),
                [name],
                read_tag_columns,
            )
            .optional()?;
        row.map(decode_tag).transpose()
    }

    fn get_all_tags(&self) -> StoreResult<Vec<Tag>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!("{TAG_SELECT_SQL} ORDER BY name ASC;"))?;
        let mut rows = stmt.query([])?;
        let mut tags = Vec::new();
        while let Some(row) = rows.next()? {
            tags.push(decode_tag(read_tag_columns(row)?)?);
        }
        Ok(tags)
    }

    fn put_tag(&self, tag: &Tag) -> StoreResult<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute(
            "INSERT INTO tags (name, color)
             VALUES (?1, ?2)
             ON CONFLICT(name) DO UPDATE SET
                color = excluded.color,
                updated_at = (strftime('%s', 'now') * 1000);",
            params![tag.name.as_str(), tag.color.as_str()],
        )?;
        tx.commit()?;
        Ok(())
    }
}

struct ResourceColumns {
    id: String,
    name: String,
    kind: String,
    tags: String,
}

fn read_resource_columns(row: &Row<'_>) -> rusqlite::Result<ResourceColumns> {
    Ok(ResourceColumns {
        id: row.get("id")?,
        name: row.get("name")?,
        kind: row.get("type")?,
        tags: row.get("tags")?,
    })
}

fn decode_resource(columns: ResourceColumns) -> StoreResult<Resource> {
    let tags: Vec<Tag> = serde_json::from_str(&columns.tags).map_err(|err| {
        StoreError::InvalidData(format!(
            "invalid tags value for resource `{}` in resources.tags: {err}",
            columns.id
        ))
    })?;
    for tag in &tags {
        check_color(&tag.color, "resources.tags")?;
    }

    Ok(Resource {
        id: columns.id,
        name: columns.name,
        kind: columns.kind,
        tags,
    })
}

fn read_tag_columns(row: &Row<'_>) -> rusqlite::Result<(String, String)> {
    Ok((row.get("name")?, row.get("color")?))
}

fn decode_tag((name, color): (String, String)) -> StoreResult<Tag> {
    let color = Color::parse(&color).map_err(|_| {
        StoreError::InvalidData(format!("invalid color `{color}` in tags.color"))
    })?;
    Ok(Tag { name, color })
}

fn check_color(color: &Color, column: &str) -> StoreResult<()> {
    Color::parse(color.as_str())
        .map(|_| ())
        .map_err(|_| StoreError::InvalidData(format!("invalid color `{color}` in {column}")))
}
