//! Error taxonomy of the container layer.
//!
//! # Responsibility
//! - Classify failures by the operation that caused them.
//! - Keep engine (SQLite) errors attached as sources.
//!
//! # Invariants
//! - No global error state: every failure belongs to exactly one call.
//! - `TransactionError` is only produced after the transaction rolled back.

use crate::config::StoreLocation;
use crate::db::OpenError;
use crate::model::schema::SchemaError;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub type StoreResult<T> = Result<T, StoreError>;
pub type TxResult<T> = Result<T, TransactionError>;
pub type ContainerResult<T> = Result<T, ContainerError>;

/// Failure while reading or mutating objects through a handle.
#[derive(Debug)]
pub enum StoreError {
    Sqlite(rusqlite::Error),
    Schema(SchemaError),
    DuplicateKey { kind: String, key: String },
    NotFound { kind: String, key: String },
    InvalidData(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::Schema(err) => write!(f, "{err}"),
            Self::DuplicateKey { kind, key } => write!(f, "object {kind}[{key}] already exists"),
            Self::NotFound { kind, key } => write!(f, "object {kind}[{key}] not found"),
            Self::InvalidData(message) => write!(f, "invalid persisted object data: {message}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::Schema(err) => Some(err),
            Self::DuplicateKey { .. }
            | Self::NotFound { .. }
            | Self::InvalidData(_) => None,
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

impl From<SchemaError> for StoreError {
    fn from(value: SchemaError) -> Self {
        Self::Schema(value)
    }
}

/// Failure inside a write transaction. The transaction has been rolled back.
#[derive(Debug)]
pub enum TransactionError {
    Store(StoreError),
    /// The handle already has an open write transaction.
    NestedWrite,
    ReadOnly,
    /// The object passed to the write belongs to another handle.
    ForeignObject { kind: String, key: String },
    /// The object could not be rebound on the target context.
    ObjectInvalidated { kind: String, key: String },
    /// The caller's block gave up.
    Aborted(Box<dyn Error + Send + Sync>),
}

impl TransactionError {
    /// Builds an `Aborted` error from any caller-side failure.
    pub fn abort(reason: impl Into<Box<dyn Error + Send + Sync>>) -> Self {
        Self::Aborted(reason.into())
    }
}

impl Display for TransactionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Store(err) => write!(f, "{err}"),
            Self::NestedWrite => write!(f, "a write transaction is already open on this handle"),
            Self::ReadOnly => write!(f, "store is opened read-only"),
            Self::ForeignObject { kind, key } => {
                write!(f, "object {kind}[{key}] belongs to a different handle")
            }
            Self::ObjectInvalidated { kind, key } => {
                write!(f, "object {kind}[{key}] no longer exists in the store")
            }
            Self::Aborted(reason) => write!(f, "write aborted: {reason}"),
        }
    }
}

impl Error for TransactionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            Self::Aborted(reason) => Some(reason.as_ref()),
            Self::NestedWrite
            | Self::ReadOnly
            | Self::ForeignObject { .. }
            | Self::ObjectInvalidated { .. } => None,
        }
    }
}

impl From<StoreError> for TransactionError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

impl From<rusqlite::Error> for TransactionError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Store(StoreError::Sqlite(value))
    }
}

impl From<SchemaError> for TransactionError {
    fn from(value: SchemaError) -> Self {
        Self::Store(StoreError::Schema(value))
    }
}

/// Top-level error returned by `Container` operations.
#[derive(Debug)]
pub enum ContainerError {
    Open(OpenError),
    Transaction(TransactionError),
    /// Read failure outside of a write.
    Store(StoreError),
    /// Residual entries remained after cleaning a folder.
    NotEmpty { path: PathBuf, remaining: Vec<PathBuf> },
    /// Live handles still reference the store.
    StillReferenced { location: StoreLocation, handles: usize },
    Io(std::io::Error),
}

impl Display for ContainerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open(err) => write!(f, "cannot open store: {err}"),
            Self::Transaction(err) => write!(f, "write failed: {err}"),
            Self::Store(err) => write!(f, "read failed: {err}"),
            Self::NotEmpty { path, remaining } => write!(
                f,
                "folder `{}` still holds {} entries after cleanup",
                path.display(),
                remaining.len()
            ),
            Self::StillReferenced { location, handles } => {
                write!(f, "store {location:?} is still referenced by {handles} handles")
            }
            Self::Io(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ContainerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Open(err) => Some(err),
            Self::Transaction(err) => Some(err),
            Self::Store(err) => Some(err),
            Self::Io(err) => Some(err),
            Self::NotEmpty { .. } | Self::StillReferenced { .. } => None,
        }
    }
}

impl From<OpenError> for ContainerError {
    fn from(value: OpenError) -> Self {
        Self::Open(value)
    }
}

impl From<TransactionError> for ContainerError {
    fn from(value: TransactionError) -> Self {
        Self::Transaction(value)
    }
}

impl From<StoreError> for ContainerError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

impl From<std::io::Error> for ContainerError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}
