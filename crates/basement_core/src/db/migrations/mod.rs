//! Object layout migration registry and executor.
//!
//! # Responsibility
//! - Register layout migrations in strictly increasing order.
//! - Apply pending migrations atomically.
//!
//! # Invariants
//! - `version` values must remain monotonic.
//! - Applied migration version is mirrored to `PRAGMA user_version`.

use crate::db::{OpenError, OpenResult};
use rusqlite::Connection;

#[derive(Debug, Clone, Copy)]
struct Migration {
    version: u32,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    sql: include_str!("0001_objects.sql"),
}];

/// Returns the latest layout version known by this binary.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |migration| migration.version)
}

/// Applies all pending migrations on the provided connection.
pub fn apply_migrations(conn: &mut Connection) -> OpenResult<()> {
    let current_version = current_layout_version(conn)?;
    let latest = latest_version();

    if current_version > latest {
        return Err(OpenError::UnsupportedLayoutVersion {
            db_version: current_version,
            latest_supported: latest,
        });
    }

    if current_version == latest {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for migration in MIGRATIONS {
        if migration.version <= current_version {
            continue;
        }

        tx.execute_batch(migration.sql)?;
        tx.execute_batch(&format!("PRAGMA user_version = {};", migration.version))?;
    }
    tx.commit()?;

    Ok(())
}

/// Fails unless the layout is exactly the latest one.
///
/// Used for read-only stores, which cannot be migrated.
pub fn require_latest(conn: &Connection) -> OpenResult<()> {
    let current_version = current_layout_version(conn)?;
    let latest = latest_version();
    if current_version != latest {
        return Err(OpenError::UnsupportedLayoutVersion {
            db_version: current_version,
            latest_supported: latest,
        });
    }
    Ok(())
}

pub fn current_layout_version(conn: &Connection) -> OpenResult<u32> {
    let version = conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
    Ok(version)
}
