//! SQLite engine bootstrap behind every store handle.
//!
//! # Responsibility
//! - Open and configure SQLite connections for a `Configuration`.
//! - Apply the internal object layout migrations in deterministic order.
//! - Reconcile the caller's schema version with the one recorded on disk.
//!
//! # Invariants
//! - Layout version is tracked via `PRAGMA user_version`.
//! - No object data is read or written before migrations succeed.

use crate::model::schema::SchemaError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod migrations;
mod open;

pub use open::open_connection;

pub type OpenResult<T> = Result<T, OpenError>;

/// Failure to open or create a store.
#[derive(Debug)]
pub enum OpenError {
    Sqlite(rusqlite::Error),
    Io(std::io::Error),
    InvalidSchema(SchemaError),
    UnsupportedLayoutVersion {
        db_version: u32,
        latest_supported: u32,
    },
    SchemaVersionMismatch {
        on_disk: u32,
        requested: u32,
    },
}

impl Display for OpenError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::Io(err) => write!(f, "{err}"),
            Self::InvalidSchema(err) => write!(f, "invalid schema: {err}"),
            Self::UnsupportedLayoutVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "store layout version {db_version} does not match supported {latest_supported}"
            ),
            Self::SchemaVersionMismatch { on_disk, requested } => write!(
                f,
                "store schema version {on_disk} is newer than requested {requested}"
            ),
        }
    }
}

impl Error for OpenError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::Io(err) => Some(err),
            Self::InvalidSchema(err) => Some(err),
            Self::UnsupportedLayoutVersion { .. } | Self::SchemaVersionMismatch { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for OpenError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

impl From<std::io::Error> for OpenError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<SchemaError> for OpenError {
    fn from(value: SchemaError) -> Self {
        Self::InvalidSchema(value)
    }
}
