//! Connection bootstrap for one store handle.
//!
//! # Responsibility
//! - Open file or named in-memory SQLite connections for a `Configuration`.
//! - Configure connection pragmas required by the object layer.
//! - Trigger layout migrations and schema version checks before returning.
//!
//! # Invariants
//! - Returned connections have `foreign_keys=ON`.
//! - Writable file stores run in WAL mode so other contexts can read while
//!   one context commits.

use super::migrations::{apply_migrations, require_latest};
use super::{OpenError, OpenResult};
use crate::config::{Configuration, StoreLocation};
use log::{error, info};
use rusqlite::{Connection, OpenFlags, OptionalExtension};
use std::time::Instant;

const SCHEMA_VERSION_KEY: &str = "schema_version";

/// Opens the store described by `configuration` and prepares it for use.
///
/// # Side effects
/// - May create the store file and its parent folder.
/// - Emits `store_open` logging events with duration and status.
pub fn open_connection(configuration: &Configuration) -> OpenResult<Connection> {
    let started_at = Instant::now();
    let mode = mode_label(configuration.location());
    info!("event=store_open module=db status=start mode={mode}");

    match open_and_bootstrap(configuration) {
        Ok(conn) => {
            info!(
                "event=store_open module=db status=ok mode={mode} duration_ms={}",
                started_at.elapsed().as_millis()
            );
            Ok(conn)
        }
        Err(err) => {
            error!(
                "event=store_open module=db status=error mode={mode} duration_ms={} error_code={} error={}",
                started_at.elapsed().as_millis(),
                error_code(&err),
                err
            );
            Err(err)
        }
    }
}

fn open_and_bootstrap(configuration: &Configuration) -> OpenResult<Connection> {
    configuration.schema().validate()?;

    let read_only = configuration.is_read_only();
    let mut flags = if read_only {
        OpenFlags::SQLITE_OPEN_READ_ONLY
    } else {
        OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE
    };
    flags |= OpenFlags::SQLITE_OPEN_NO_MUTEX;

    let mut conn = match configuration.location() {
        StoreLocation::File(path) => {
            if !read_only {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent)?;
                }
            }
            Connection::open_with_flags(path, flags)?
        }
        StoreLocation::Memory(identifier) => Connection::open_with_flags(
            format!("file:{identifier}?mode=memory&cache=shared"),
            flags | OpenFlags::SQLITE_OPEN_URI,
        )?,
    };

    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(configuration.busy_timeout())?;

    if read_only {
        require_latest(&conn)?;
        check_schema_version(&conn, configuration.schema_version())?;
        return Ok(conn);
    }

    if matches!(configuration.location(), StoreLocation::File(_)) {
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
            row.get::<_, String>(0)
        })?;
    }
    apply_migrations(&mut conn)?;
    record_schema_version(&conn, configuration.schema_version())?;
    Ok(conn)
}

fn stored_schema_version(conn: &Connection) -> OpenResult<Option<u32>> {
    let version = conn
        .query_row(
            "SELECT value FROM store_meta WHERE name = ?1;",
            [SCHEMA_VERSION_KEY],
            |row| row.get::<_, u32>(0),
        )
        .optional()?;
    Ok(version)
}

fn check_schema_version(conn: &Connection, requested: u32) -> OpenResult<Option<u32>> {
    let on_disk = stored_schema_version(conn)?;
    match on_disk {
        Some(on_disk) if on_disk > requested => {
            Err(OpenError::SchemaVersionMismatch { on_disk, requested })
        }
        other => Ok(other),
    }
}

fn record_schema_version(conn: &Connection, requested: u32) -> OpenResult<()> {
    if check_schema_version(conn, requested)? == Some(requested) {
        return Ok(());
    }
    conn.execute(
        "INSERT INTO store_meta (name, value) VALUES (?1, ?2)
         ON CONFLICT(name) DO UPDATE SET value = excluded.value;",
        rusqlite::params![SCHEMA_VERSION_KEY, requested],
    )?;
    Ok(())
}

fn mode_label(location: &StoreLocation) -> &'static str {
    match location {
        StoreLocation::File(_) => "file",
        StoreLocation::Memory(_) => "memory",
    }
}

fn error_code(err: &OpenError) -> &'static str {
    match err {
        OpenError::Sqlite(_) => "store_open_failed",
        OpenError::Io(_) => "store_folder_failed",
        OpenError::InvalidSchema(_) => "invalid_schema",
        OpenError::UnsupportedLayoutVersion { .. } => "unsupported_layout",
        OpenError::SchemaVersionMismatch { .. } => "schema_version_mismatch",
    }
}
