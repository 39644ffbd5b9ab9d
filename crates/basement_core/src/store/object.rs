//! Thread-confined live objects and collections.
//!
//! # Responsibility
//! - Read typed property values of one stored object.
//! - Expose a lazily evaluated view over all objects of a kind.
//!
//! # Invariants
//! - Every read goes to the store; nothing is cached on the object.
//! - Reads validate the property shape against the handle's schema.
//! - Reading a deleted object fails with `StoreError::NotFound`.

use super::handle::StoreHandle;
use crate::error::{StoreError, StoreResult};
use crate::model::id::ObjectId;
use crate::model::schema::{ObjectSchema, Property, PropertyKind, SchemaError};
use crate::model::value::{Value, ValueType};
use crate::repo::object_repo::ObjectRepository;
use std::fmt::{Debug, Formatter};

/// Live object bound to the handle it was read from.
#[derive(Clone)]
pub struct ObjectRef {
    handle: StoreHandle,
    id: ObjectId,
}

impl ObjectRef {
    pub(crate) fn new(handle: StoreHandle, id: ObjectId) -> Self {
        Self { handle, id }
    }

    pub fn id(&self) -> &ObjectId {
        &self.id
    }

    pub fn kind(&self) -> &str {
        &self.id.kind
    }

    pub fn key(&self) -> &str {
        &self.id.key
    }

    pub fn handle(&self) -> &StoreHandle {
        &self.handle
    }

    /// Returns whether the object still exists in the store.
    pub fn is_valid(&self) -> bool {
        self.handle.repo().exists(&self.id).unwrap_or(false)
    }

    pub fn schema(&self) -> Result<&ObjectSchema, SchemaError> {
        self.handle.object_schema(&self.id.kind)
    }

    /// Reads a primitive property. Unset properties read as `Value::Null`.
    pub fn get(&self, name: &str) -> StoreResult<Value> {
        let value_type = match self.readable(name)?.kind {
            PropertyKind::Value(value_type) => value_type,
            _ => return Err(self.shape_mismatch(name, "value")),
        };
        let stored = self.handle.repo().read_field(&self.id, name)?;
        self.decode(name, stored, value_type)
    }

    /// Reads a primitive list property in stored order.
    pub fn values(&self, name: &str) -> StoreResult<Vec<Value>> {
        let value_type = match self.readable(name)?.kind {
            PropertyKind::List(value_type) => value_type,
            _ => return Err(self.shape_mismatch(name, "list")),
        };
        self.handle
            .repo()
            .read_values(&self.id, name)?
            .into_iter()
            .map(|stored| self.decode(name, stored, value_type))
            .collect()
    }

    /// Follows a to-one relationship.
    pub fn link(&self, name: &str) -> StoreResult<Option<ObjectRef>> {
        if !matches!(self.readable(name)?.kind, PropertyKind::ToOne(_)) {
            return Err(self.shape_mismatch(name, "to_one"));
        }
        let target = self.handle.repo().read_links(&self.id, name)?.into_iter().next();
        Ok(target.map(|id| ObjectRef::new(self.handle.clone(), id)))
    }

    /// Follows a to-many relationship, preserving order.
    pub fn links(&self, name: &str) -> StoreResult<Vec<ObjectRef>> {
        if !matches!(self.readable(name)?.kind, PropertyKind::ToMany(_)) {
            return Err(self.shape_mismatch(name, "to_many"));
        }
        Ok(self
            .handle
            .repo()
            .read_links(&self.id, name)?
            .into_iter()
            .map(|id| ObjectRef::new(self.handle.clone(), id))
            .collect())
    }

    fn readable(&self, name: &str) -> StoreResult<&Property> {
        let property = self
            .handle
            .configuration()
            .schema()
            .property(&self.id.kind, name)?;
        if !self.handle.repo().exists(&self.id)? {
            return Err(StoreError::NotFound {
                kind: self.id.kind.clone(),
                key: self.id.key.clone(),
            });
        }
        Ok(property)
    }

    fn decode(
        &self,
        name: &str,
        stored: rusqlite::types::Value,
        value_type: ValueType,
    ) -> StoreResult<Value> {
        Value::from_sql(stored, value_type).ok_or_else(|| {
            StoreError::InvalidData(format!(
                "{}.{name} does not hold a {} value",
                self.id,
                value_type.as_str()
            ))
        })
    }

    fn shape_mismatch(&self, name: &str, expected: &'static str) -> StoreError {
        StoreError::Schema(SchemaError::ShapeMismatch {
            kind: self.id.kind.clone(),
            property: name.to_string(),
            expected,
        })
    }
}

impl Debug for ObjectRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectRef").field("id", &self.id).finish()
    }
}

/// Live view over all objects of one kind, evaluated on every access.
#[derive(Clone)]
pub struct Results {
    handle: StoreHandle,
    kind: String,
}

impl Results {
    pub(crate) fn new(handle: StoreHandle, kind: String) -> Self {
        Self { handle, kind }
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn handle(&self) -> &StoreHandle {
        &self.handle
    }

    pub fn len(&self) -> StoreResult<usize> {
        self.handle.repo().count(&self.kind)
    }

    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Primary keys in insertion order.
    pub fn keys(&self) -> StoreResult<Vec<String>> {
        self.handle.repo().list_keys(&self.kind)
    }

    pub fn get(&self, index: usize) -> StoreResult<Option<ObjectRef>> {
        Ok(self.to_vec()?.into_iter().nth(index))
    }

    /// Snapshot of the current members.
    pub fn to_vec(&self) -> StoreResult<Vec<ObjectRef>> {
        Ok(self
            .keys()?
            .into_iter()
            .map(|key| ObjectRef::new(self.handle.clone(), ObjectId::new(self.kind.clone(), key)))
            .collect())
    }
}

impl Debug for Results {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Results").field("kind", &self.kind).finish()
    }
}
