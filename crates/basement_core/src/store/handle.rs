//! Live, context-confined store handle.
//!
//! # Responsibility
//! - Own one engine connection for one execution context.
//! - Serve object lookups against the configured schema.
//!
//! # Invariants
//! - `StoreHandle` is neither `Send` nor `Sync`: a handle and everything
//!   derived from it stay on the context that opened it.
//! - At most one write transaction is open per handle.
//! - The handle stays counted in the `StoreRegistry` until its last clone drops.

use super::object::{ObjectRef, Results};
use super::registry::{Registration, StoreRegistry};
use crate::config::Configuration;
use crate::db::{open_connection, OpenResult};
use crate::error::StoreResult;
use crate::model::id::ObjectId;
use crate::model::schema::{ObjectSchema, SchemaError};
use crate::queue::ContextId;
use crate::repo::object_repo::{ObjectRepository, SqliteObjectRepository};
use rusqlite::Connection;
use std::cell::Cell;
use std::fmt::{Debug, Formatter};
use std::rc::Rc;

/// Cheap-to-clone reference to one open store connection.
#[derive(Clone)]
pub struct StoreHandle {
    inner: Rc<HandleInner>,
}

struct HandleInner {
    // Declared first so the connection closes before the registration drops.
    conn: Connection,
    configuration: Configuration,
    context: ContextId,
    in_write: Cell<bool>,
    _registration: Registration,
}

impl StoreHandle {
    /// Opens a new handle confined to the current context.
    pub(crate) fn open(configuration: &Configuration) -> OpenResult<Self> {
        let registration = StoreRegistry::global().register(configuration.location());
        let conn = open_connection(configuration)?;
        Ok(Self {
            inner: Rc::new(HandleInner {
                conn,
                configuration: configuration.clone(),
                context: ContextId::current(),
                in_write: Cell::new(false),
                _registration: registration,
            }),
        })
    }

    pub fn configuration(&self) -> &Configuration {
        &self.inner.configuration
    }

    /// Context this handle is confined to.
    pub fn context(&self) -> ContextId {
        self.inner.context
    }

    /// Returns whether both values refer to the same underlying handle.
    pub fn same_handle(&self, other: &StoreHandle) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn is_in_write(&self) -> bool {
        self.inner.in_write.get()
    }

    /// Looks up one object by primary key. Absent keys yield `Ok(None)`.
    pub fn item(&self, kind: &str, key: &str) -> StoreResult<Option<ObjectRef>> {
        self.object_schema(kind)?;
        let id = ObjectId::new(kind, key);
        if !self.repo().exists(&id)? {
            return Ok(None);
        }
        Ok(Some(ObjectRef::new(self.clone(), id)))
    }

    /// Live view over every object of `kind`.
    pub fn items(&self, kind: &str) -> StoreResult<Results> {
        self.object_schema(kind)?;
        Ok(Results::new(self.clone(), kind.to_string()))
    }

    pub fn object_schema(&self, kind: &str) -> Result<&ObjectSchema, SchemaError> {
        self.inner
            .configuration
            .schema()
            .object(kind)
            .ok_or_else(|| SchemaError::UnknownKind(kind.to_string()))
    }

    pub(crate) fn connection(&self) -> &Connection {
        &self.inner.conn
    }

    pub(crate) fn repo(&self) -> SqliteObjectRepository<'_> {
        SqliteObjectRepository::new(&self.inner.conn)
    }

    pub(crate) fn set_in_write(&self, in_write: bool) {
        self.inner.in_write.set(in_write);
    }
}

impl Debug for StoreHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreHandle")
            .field("location", self.inner.configuration.location())
            .field("context", &self.inner.context)
            .field("in_write", &self.inner.in_write.get())
            .finish()
    }
}
