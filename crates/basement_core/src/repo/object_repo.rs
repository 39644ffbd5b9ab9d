//! Object repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Insert, look up and delete object rows.
//! - Read and replace primitive fields, primitive lists and links.
//!
//! # Invariants
//! - Deleting an object removes its fields and every link pointing at it.
//! - Writes replace whole lists; positions are strictly increasing and may
//!   have gaps after a link target is deleted.

use crate::error::{StoreError, StoreResult};
use crate::model::id::ObjectId;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, Connection, OptionalExtension};

/// Engine operations consumed by the store layer.
pub trait ObjectRepository {
    fn exists(&self, id: &ObjectId) -> StoreResult<bool>;
    fn insert_object(&self, id: &ObjectId) -> StoreResult<()>;
    /// Inserts the object row unless it exists. Returns whether it was created.
    fn ensure_object(&self, id: &ObjectId) -> StoreResult<bool>;
    fn delete_object(&self, id: &ObjectId) -> StoreResult<()>;
    fn delete_all_objects(&self) -> StoreResult<usize>;
    fn list_keys(&self, kind: &str) -> StoreResult<Vec<String>>;
    fn count(&self, kind: &str) -> StoreResult<usize>;
    fn read_field(&self, id: &ObjectId, name: &str) -> StoreResult<SqlValue>;
    fn write_field(&self, id: &ObjectId, name: &str, value: SqlValue) -> StoreResult<()>;
    fn read_values(&self, id: &ObjectId, name: &str) -> StoreResult<Vec<SqlValue>>;
    fn write_values(&self, id: &ObjectId, name: &str, values: &[SqlValue]) -> StoreResult<()>;
    fn read_links(&self, id: &ObjectId, name: &str) -> StoreResult<Vec<ObjectId>>;
    fn write_links(&self, id: &ObjectId, name: &str, targets: &[ObjectId]) -> StoreResult<()>;
    fn append_link(&self, id: &ObjectId, name: &str, target: &ObjectId) -> StoreResult<()>;
}

/// SQLite-backed object repository.
pub struct SqliteObjectRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteObjectRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl ObjectRepository for SqliteObjectRepository<'_> {
    fn exists(&self, id: &ObjectId) -> StoreResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM objects WHERE kind = ?1 AND key = ?2);",
            params![id.kind, id.key],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    fn insert_object(&self, id: &ObjectId) -> StoreResult<()> {
        if !self.ensure_object(id)? {
            return Err(StoreError::DuplicateKey {
                kind: id.kind.clone(),
                key: id.key.clone(),
            });
        }
        Ok(())
    }

    fn ensure_object(&self, id: &ObjectId) -> StoreResult<bool> {
        let changed = self.conn.execute(
            "INSERT INTO objects (kind, key) VALUES (?1, ?2)
             ON CONFLICT(kind, key) DO NOTHING;",
            params![id.kind, id.key],
        )?;
        Ok(changed == 1)
    }

    fn delete_object(&self, id: &ObjectId) -> StoreResult<()> {
        let changed = self.conn.execute(
            "DELETE FROM objects WHERE kind = ?1 AND key = ?2;",
            params![id.kind, id.key],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound {
                kind: id.kind.clone(),
                key: id.key.clone(),
            });
        }
        Ok(())
    }

    fn delete_all_objects(&self) -> StoreResult<usize> {
        let changed = self.conn.execute("DELETE FROM objects;", [])?;
        Ok(changed)
    }

    fn list_keys(&self, kind: &str) -> StoreResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT key FROM objects WHERE kind = ?1 ORDER BY rowid ASC;")?;
        let keys = stmt
            .query_map([kind], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(keys)
    }

    fn count(&self, kind: &str) -> StoreResult<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM objects WHERE kind = ?1;",
            [kind],
            |row| row.get(0),
        )?;
        usize::try_from(count).map_err(|_| StoreError::InvalidData(format!("count {count}")))
    }

    fn read_field(&self, id: &ObjectId, name: &str) -> StoreResult<SqlValue> {
        let value = self
            .conn
            .prepare_cached(
                "SELECT value FROM object_fields WHERE kind = ?1 AND key = ?2 AND name = ?3;",
            )?
            .query_row(params![id.kind, id.key, name], |row| row.get::<_, SqlValue>(0))
            .optional()?;
        Ok(value.unwrap_or(SqlValue::Null))
    }

    fn write_field(&self, id: &ObjectId, name: &str, value: SqlValue) -> StoreResult<()> {
        self.conn
            .prepare_cached(
                "INSERT INTO object_fields (kind, key, name, value) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(kind, key, name) DO UPDATE SET value = excluded.value;",
            )?
            .execute(params![id.kind, id.key, name, value])?;
        Ok(())
    }

    fn read_values(&self, id: &ObjectId, name: &str) -> StoreResult<Vec<SqlValue>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT value FROM object_values
             WHERE kind = ?1 AND key = ?2 AND name = ?3
             ORDER BY position ASC;",
        )?;
        let values = stmt
            .query_map(params![id.kind, id.key, name], |row| row.get::<_, SqlValue>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(values)
    }

    fn write_values(&self, id: &ObjectId, name: &str, values: &[SqlValue]) -> StoreResult<()> {
        self.conn.execute(
            "DELETE FROM object_values WHERE kind = ?1 AND key = ?2 AND name = ?3;",
            params![id.kind, id.key, name],
        )?;
        let mut stmt = self.conn.prepare_cached(
            "INSERT INTO object_values (kind, key, name, position, value)
             VALUES (?1, ?2, ?3, ?4, ?5);",
        )?;
        for (position, value) in values.iter().enumerate() {
            stmt.execute(params![id.kind, id.key, name, position as i64, value])?;
        }
        Ok(())
    }

    fn read_links(&self, id: &ObjectId, name: &str) -> StoreResult<Vec<ObjectId>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT target_kind, target_key FROM object_links
             WHERE kind = ?1 AND key = ?2 AND name = ?3
             ORDER BY position ASC;",
        )?;
        let targets = stmt
            .query_map(params![id.kind, id.key, name], |row| {
                Ok(ObjectId::new(row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(targets)
    }

    fn write_links(&self, id: &ObjectId, name: &str, targets: &[ObjectId]) -> StoreResult<()> {
        self.conn.execute(
            "DELETE FROM object_links WHERE kind = ?1 AND key = ?2 AND name = ?3;",
            params![id.kind, id.key, name],
        )?;
        let mut stmt = self.conn.prepare_cached(
            "INSERT INTO object_links (kind, key, name, position, target_kind, target_key)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
        )?;
        for (position, target) in targets.iter().enumerate() {
            stmt.execute(params![
                id.kind,
                id.key,
                name,
                position as i64,
                target.kind,
                target.key
            ])?;
        }
        Ok(())
    }

    fn append_link(&self, id: &ObjectId, name: &str, target: &ObjectId) -> StoreResult<()> {
        self.conn.execute(
            "INSERT INTO object_links (kind, key, name, position, target_kind, target_key)
             SELECT ?1, ?2, ?3, COALESCE(MAX(position) + 1, 0), ?4, ?5
             FROM object_links
             WHERE kind = ?1 AND key = ?2 AND name = ?3;",
            params![id.kind, id.key, name, target.kind, target.key],
        )?;
        Ok(())
    }
}
