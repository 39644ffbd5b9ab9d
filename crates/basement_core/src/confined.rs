//! Moving live objects between execution contexts.
//!
//! Live objects are `!Send`. To continue working with one on another context,
//! take a `ThreadSafeReference` on the owning context, send the reference, and
//! resolve it against a handle of the target context.

use crate::config::Configuration;
use crate::error::{TransactionError, TxResult};
use crate::model::id::ObjectId;
use crate::repo::object_repo::ObjectRepository;
use crate::store::{ObjectRef, Results, StoreHandle};
use std::fmt::{Debug, Formatter};
use std::marker::PhantomData;

/// Sendable token naming a thread-confined value.
pub struct ThreadSafeReference<T> {
    configuration: Configuration,
    target: Target,
    _marker: PhantomData<fn() -> T>,
}

#[derive(Debug, Clone)]
enum Target {
    Object(ObjectId),
    Kind(String),
}

impl<T> ThreadSafeReference<T> {
    fn new(configuration: &Configuration, target: Target) -> Self {
        Self {
            configuration: configuration.clone(),
            target,
            _marker: PhantomData,
        }
    }

    pub fn configuration(&self) -> &Configuration {
        &self.configuration
    }

    /// Fails unless `handle` opens the store this reference was taken from.
    fn check_store(&self, handle: &StoreHandle) -> TxResult<()> {
        if handle.configuration() == &self.configuration {
            return Ok(());
        }
        let (kind, key) = match &self.target {
            Target::Object(id) => (id.kind.clone(), id.key.clone()),
            Target::Kind(kind) => (kind.clone(), String::new()),
        };
        Err(TransactionError::ForeignObject { kind, key })
    }
}

impl<T> Clone for ThreadSafeReference<T> {
    fn clone(&self) -> Self {
        Self::new(&self.configuration, self.target.clone())
    }
}

impl<T> Debug for ThreadSafeReference<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadSafeReference")
            .field("location", self.configuration.location())
            .field("target", &self.target)
            .finish()
    }
}

/// Value bound to the handle (and so the context) it was read from.
pub trait ThreadConfined: Sized {
    fn handle(&self) -> &StoreHandle;

    fn thread_safe_reference(&self) -> ThreadSafeReference<Self>;

    /// Rebinds the referenced value to `handle`.
    ///
    /// # Errors
    /// - `ForeignObject` when `handle` opens a different store.
    /// - `ObjectInvalidated` when the object no longer exists.
    fn resolve(reference: ThreadSafeReference<Self>, handle: &StoreHandle) -> TxResult<Self>;
}

impl ThreadConfined for ObjectRef {
    fn handle(&self) -> &StoreHandle {
        ObjectRef::handle(self)
    }

    fn thread_safe_reference(&self) -> ThreadSafeReference<Self> {
        ThreadSafeReference::new(
            ObjectRef::handle(self).configuration(),
            Target::Object(self.id().clone()),
        )
    }

    fn resolve(reference: ThreadSafeReference<Self>, handle: &StoreHandle) -> TxResult<Self> {
        reference.check_store(handle)?;
        let Target::Object(id) = reference.target else {
            return Err(TransactionError::abort("reference does not name an object"));
        };
        if !handle.repo().exists(&id)? {
            return Err(TransactionError::ObjectInvalidated {
                kind: id.kind,
                key: id.key,
            });
        }
        Ok(ObjectRef::new(handle.clone(), id))
    }
}

impl ThreadConfined for Results {
    fn handle(&self) -> &StoreHandle {
        Results::handle(self)
    }

    fn thread_safe_reference(&self) -> ThreadSafeReference<Self> {
        ThreadSafeReference::new(
            Results::handle(self).configuration(),
            Target::Kind(self.kind().to_string()),
        )
    }

    fn resolve(reference: ThreadSafeReference<Self>, handle: &StoreHandle) -> TxResult<Self> {
        reference.check_store(handle)?;
        let Target::Kind(kind) = reference.target else {
            return Err(TransactionError::abort("reference does not name a kind"));
        };
        Ok(handle.items(&kind)?)
    }
}
