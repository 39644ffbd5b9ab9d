//! Write helpers on `Container`.
//!
//! # Invariants
//! - `write` and `write_with` run on the calling context and block until the
//!   transaction commits or rolls back.
//! - `instance_write` runs on a fresh context and blocks until it finishes.
//! - `write_async` never runs its block on the caller and never returns
//!   failures; they all go to the error handler.

use super::Container;
use crate::confined::{ThreadConfined, ThreadSafeReference};
use crate::error::{ContainerError, ContainerResult, TxResult};
use crate::queue::{current_label, WorkQueue};
use crate::store::HandleCache;
use crate::transaction::WriteTransaction;
use log::{debug, error, warn};
use std::panic;
use std::thread;

impl Container {
    /// Runs `block` in a write transaction on the calling context.
    ///
    /// Commits when `block` returns `Ok`; rolls back and returns
    /// `ContainerError::Transaction` otherwise.
    pub fn write<T>(
        &self,
        block: impl FnOnce(&WriteTransaction<'_>) -> TxResult<T>,
    ) -> ContainerResult<T> {
        let handle = self.handle()?;
        Ok(WriteTransaction::run(&handle, block)?)
    }

    /// Like `write`, handing `object` to the block.
    ///
    /// `object` must come from this container's store. When the calling
    /// context's cached handle was replaced since `object` was read, the
    /// object is rebound to the current handle first.
    pub fn write_with<O, T>(
        &self,
        object: &O,
        block: impl FnOnce(&O, &WriteTransaction<'_>) -> TxResult<T>,
    ) -> ContainerResult<T>
    where
        O: ThreadConfined,
    {
        let handle = self.handle()?;
        if object.handle().same_handle(&handle) {
            return Ok(WriteTransaction::run(&handle, |tx| block(object, tx))?);
        }
        let rebound = O::resolve(object.thread_safe_reference(), &handle)?;
        Ok(WriteTransaction::run(&handle, |tx| block(&rebound, tx))?)
    }

    /// Performs `write_with` on a fresh execution context and waits for it.
    ///
    /// `object` is rebound on the new context; an object deleted in the
    /// meantime fails with `TransactionError::ObjectInvalidated`. A panic in
    /// `block` is resumed on the caller.
    pub fn instance_write<O, T, F>(&self, object: &O, block: F) -> ContainerResult<T>
    where
        O: ThreadConfined,
        F: FnOnce(&O, &WriteTransaction<'_>) -> TxResult<T> + Send,
        T: Send,
    {
        let reference = object.thread_safe_reference();
        let instance = self.new_instance(None);
        let label = format!("basement.instance.{}", current_label());

        thread::scope(|scope| {
            let worker = thread::Builder::new()
                .name(label)
                .spawn_scoped(scope, move || {
                    let outcome = instance.write_resolved(reference, block);
                    HandleCache::release();
                    outcome
                })?;
            match worker.join() {
                Ok(outcome) => outcome,
                Err(payload) => panic::resume_unwind(payload),
            }
        })
    }

    /// Schedules a write of `object` on `queue`, this container's queue, or
    /// the shared background queue, in that order of preference.
    ///
    /// Every failure, including handle resolution, goes to `error_handler`
    /// on the target queue. Writes scheduled on one queue run in order. When
    /// no queue is given and the background queue cannot be started,
    /// `error_handler` receives `ContainerError::Io` on the caller instead.
    pub fn write_async<O, F, E>(
        &self,
        object: &O,
        queue: Option<&WorkQueue>,
        block: F,
        error_handler: E,
    ) where
        O: ThreadConfined + 'static,
        F: FnOnce(&O, &WriteTransaction<'_>) -> TxResult<()> + Send + 'static,
        E: FnOnce(ContainerError) + Send + 'static,
    {
        let reference = object.thread_safe_reference();
        let target = match queue.or(self.queue.as_ref()) {
            Some(target) => target.clone(),
            None => match WorkQueue::background() {
                Ok(background) => background.clone(),
                Err(err) => {
                    error!("event=write_async module=container status=error error={err}");
                    error_handler(ContainerError::Io(err));
                    return;
                }
            },
        };
        let container = self.clone();
        debug!(
            "event=write_async module=container status=scheduled queue={}",
            target.label()
        );

        target.dispatch(move || {
            if let Err(err) = container.write_resolved(reference, block) {
                warn!("event=write_async module=container status=error error={err}");
                error_handler(err);
            }
        });
    }

    /// Removes every object of every kind in one transaction.
    pub fn delete_all(&self) -> ContainerResult<usize> {
        self.write(|tx| tx.delete_all())
    }

    fn write_resolved<O, T>(
        &self,
        reference: ThreadSafeReference<O>,
        block: impl FnOnce(&O, &WriteTransaction<'_>) -> TxResult<T>,
    ) -> ContainerResult<T>
    where
        O: ThreadConfined,
    {
        let handle = self.handle()?;
        let object = O::resolve(reference, &handle)?;
        Ok(WriteTransaction::run(&handle, |tx| block(&object, tx))?)
    }
}
