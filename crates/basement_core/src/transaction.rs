//! Write transactions against one handle.
//!
//! # Responsibility
//! - Scope a mutation block to one atomic engine transaction.
//! - Validate every mutation against the handle's schema.
//!
//! # Invariants
//! - Commit happens only when the block returns `Ok`; any error or panic
//!   rolls the whole transaction back.
//! - A `WriteTransaction` never outlives the block it was handed to.
//! - Objects and link targets must belong to the transaction's handle.

use crate::detach::{DetachedField, DetachedObject};
use crate::error::{TransactionError, TxResult};
use crate::model::id::ObjectId;
use crate::model::schema::{PropertyKind, SchemaError};
use crate::model::value::{Value, ValueType};
use crate::repo::object_repo::ObjectRepository;
use crate::store::{ObjectRef, Results, StoreHandle};
use log::{debug, warn};
use rusqlite::{Transaction, TransactionBehavior};
use std::time::Instant;

/// Capability to mutate the store, valid for one write block.
pub struct WriteTransaction<'h> {
    handle: &'h StoreHandle,
}

/// Clears the handle's write flag on every exit path.
struct WriteFlag<'h>(&'h StoreHandle);

impl Drop for WriteFlag<'_> {
    fn drop(&mut self) {
        self.0.set_in_write(false);
    }
}

impl<'h> WriteTransaction<'h> {
    /// Runs `block` inside a new transaction on `handle`.
    ///
    /// # Errors
    /// - `ReadOnly` for read-only configurations.
    /// - `NestedWrite` when the handle already has an open write.
    /// - Any error returned by `block`, after rollback.
    pub(crate) fn run<T>(
        handle: &'h StoreHandle,
        block: impl FnOnce(&WriteTransaction<'h>) -> TxResult<T>,
    ) -> TxResult<T> {
        if handle.configuration().is_read_only() {
            return Err(TransactionError::ReadOnly);
        }
        if handle.is_in_write() {
            return Err(TransactionError::NestedWrite);
        }

        let started_at = Instant::now();
        let tx = Transaction::new_unchecked(handle.connection(), TransactionBehavior::Immediate)?;
        handle.set_in_write(true);
        let _flag = WriteFlag(handle);

        let scope = WriteTransaction { handle };
        match block(&scope) {
            Ok(value) => {
                tx.commit()?;
                debug!(
                    "event=write_commit module=transaction status=ok duration_ms={}",
                    started_at.elapsed().as_millis()
                );
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback() {
                    warn!(
                        "event=write_rollback module=transaction status=error error={rollback_err}"
                    );
                }
                debug!(
                    "event=write_rollback module=transaction status=ok duration_ms={} error={}",
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err)
            }
        }
    }

    pub fn handle(&self) -> &'h StoreHandle {
        self.handle
    }

    /// Reads inside the transaction observe its uncommitted mutations.
    pub fn item(&self, kind: &str, key: &str) -> TxResult<Option<ObjectRef>> {
        Ok(self.handle.item(kind, key)?)
    }

    pub fn items(&self, kind: &str) -> TxResult<Results> {
        Ok(self.handle.items(kind)?)
    }

    /// Creates an empty object. Fails if the key is already taken.
    pub fn create(&self, kind: &str, key: &str) -> TxResult<ObjectRef> {
        self.handle.object_schema(kind)?;
        let id = ObjectId::new(kind, key);
        self.handle.repo().insert_object(&id)?;
        Ok(self.bind(id))
    }

    pub fn set(&self, object: &ObjectRef, name: &str, value: impl Into<Value>) -> TxResult<()> {
        self.owned(object)?;
        self.write_value(object.id(), name, &value.into())
    }

    /// Replaces a primitive list.
    pub fn set_values(&self, object: &ObjectRef, name: &str, values: Vec<Value>) -> TxResult<()> {
        self.owned(object)?;
        self.write_values(object.id(), name, &values)
    }

    /// Sets or clears a to-one relationship.
    pub fn set_link(
        &self,
        object: &ObjectRef,
        name: &str,
        target: Option<&ObjectRef>,
    ) -> TxResult<()> {
        self.owned(object)?;
        let targets = match target {
            Some(target) => {
                self.owned(target)?;
                vec![target.id().clone()]
            }
            None => Vec::new(),
        };
        self.write_links(object.id(), name, false, &targets)
    }

    /// Replaces a to-many relationship.
    pub fn set_links(&self, object: &ObjectRef, name: &str, targets: &[ObjectRef]) -> TxResult<()> {
        self.owned(object)?;
        let mut ids = Vec::with_capacity(targets.len());
        for target in targets {
            self.owned(target)?;
            ids.push(target.id().clone());
        }
        self.write_links(object.id(), name, true, &ids)
    }

    /// Appends one element to a to-many relationship.
    pub fn append_link(&self, object: &ObjectRef, name: &str, target: &ObjectRef) -> TxResult<()> {
        self.owned(object)?;
        self.owned(target)?;
        self.check_link(object.id(), name, true, target.id())?;
        self.handle
            .repo()
            .append_link(object.id(), name, target.id())?;
        Ok(())
    }

    /// Deletes one object and every link pointing at it.
    pub fn delete(&self, object: &ObjectRef) -> TxResult<()> {
        self.owned(object)?;
        self.handle.repo().delete_object(object.id())?;
        Ok(())
    }

    /// Deletes every object of every kind. Returns the number removed.
    pub fn delete_all(&self) -> TxResult<usize> {
        Ok(self.handle.repo().delete_all_objects()?)
    }

    /// Upserts a detached graph and returns its root as a live object.
    ///
    /// Existing objects keep properties the graph does not mention. Graphs
    /// with dangling node ids fail with `StoreError::InvalidData`.
    pub fn add(&self, graph: &DetachedObject) -> TxResult<ObjectRef> {
        graph.check_links()?;
        for node in graph.nodes() {
            self.handle.object_schema(node.kind())?;
            self.handle.repo().ensure_object(node.object_id())?;
        }

        for node in graph.nodes() {
            let id = node.object_id();
            for (name, field) in node.fields() {
                match field {
                    DetachedField::Value(value) => self.write_value(id, name, value)?,
                    DetachedField::List(values) => self.write_values(id, name, values)?,
                    DetachedField::One(target) => {
                        let targets: Vec<ObjectId> = target
                            .iter()
                            .map(|node| graph.node(*node).object_id().clone())
                            .collect();
                        self.write_links(id, name, false, &targets)?;
                    }
                    DetachedField::Many(targets) => {
                        let targets: Vec<ObjectId> = targets
                            .iter()
                            .map(|node| graph.node(*node).object_id().clone())
                            .collect();
                        self.write_links(id, name, true, &targets)?;
                    }
                }
            }
        }

        Ok(self.bind(graph.root_ref().object_id().clone()))
    }

    fn bind(&self, id: ObjectId) -> ObjectRef {
        ObjectRef::new(self.handle.clone(), id)
    }

    fn owned(&self, object: &ObjectRef) -> TxResult<()> {
        if object.handle().same_handle(self.handle) {
            return Ok(());
        }
        Err(TransactionError::ForeignObject {
            kind: object.kind().to_string(),
            key: object.key().to_string(),
        })
    }

    fn property_kind(&self, id: &ObjectId, name: &str) -> TxResult<PropertyKind> {
        let property = self
            .handle
            .configuration()
            .schema()
            .property(&id.kind, name)?;
        Ok(property.kind.clone())
    }

    fn write_value(&self, id: &ObjectId, name: &str, value: &Value) -> TxResult<()> {
        match self.property_kind(id, name)? {
            PropertyKind::Value(value_type) if value.fits(value_type) => {}
            PropertyKind::Value(value_type) => {
                return Err(type_mismatch(id, name, value_type).into())
            }
            _ => return Err(shape_mismatch(id, name, "value").into()),
        }
        self.handle.repo().write_field(id, name, value.to_sql())?;
        Ok(())
    }

    fn write_values(&self, id: &ObjectId, name: &str, values: &[Value]) -> TxResult<()> {
        let value_type = match self.property_kind(id, name)? {
            PropertyKind::List(value_type) => value_type,
            _ => return Err(shape_mismatch(id, name, "list").into()),
        };
        if !values.iter().all(|value| value.fits(value_type)) {
            return Err(type_mismatch(id, name, value_type).into());
        }
        let stored: Vec<_> = values.iter().map(Value::to_sql).collect();
        self.handle.repo().write_values(id, name, &stored)?;
        Ok(())
    }

    fn write_links(
        &self,
        id: &ObjectId,
        name: &str,
        to_many: bool,
        targets: &[ObjectId],
    ) -> TxResult<()> {
        let expected = self.link_target(id, name, to_many)?;
        for target in targets {
            check_target(id, name, &expected, target)?;
        }
        self.handle.repo().write_links(id, name, targets)?;
        Ok(())
    }

    fn check_link(
        &self,
        id: &ObjectId,
        name: &str,
        to_many: bool,
        target: &ObjectId,
    ) -> TxResult<()> {
        let expected = self.link_target(id, name, to_many)?;
        check_target(id, name, &expected, target)
    }

    /// Kind a relationship property links to, after checking its shape.
    fn link_target(&self, id: &ObjectId, name: &str, to_many: bool) -> TxResult<String> {
        match (self.property_kind(id, name)?, to_many) {
            (PropertyKind::ToOne(expected), false) | (PropertyKind::ToMany(expected), true) => {
                Ok(expected)
            }
            (_, false) => Err(shape_mismatch(id, name, "to_one").into()),
            (_, true) => Err(shape_mismatch(id, name, "to_many").into()),
        }
    }
}

fn check_target(id: &ObjectId, name: &str, expected: &str, target: &ObjectId) -> TxResult<()> {
    if target.kind != expected {
        return Err(SchemaError::TargetMismatch {
            kind: id.kind.clone(),
            property: name.to_string(),
            expected: expected.to_string(),
            actual: target.kind.clone(),
        }
        .into());
    }
    Ok(())
}

fn shape_mismatch(id: &ObjectId, name: &str, expected: &'static str) -> SchemaError {
    SchemaError::ShapeMismatch {
        kind: id.kind.clone(),
        property: name.to_string(),
        expected,
    }
}

fn type_mismatch(id: &ObjectId, name: &str, expected: ValueType) -> SchemaError {
    SchemaError::TypeMismatch {
        kind: id.kind.clone(),
        property: name.to_string(),
        expected,
    }
}
