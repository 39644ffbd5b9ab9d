//! Public entry point over thread-confined stores.
//!
//! # Responsibility
//! - Pair a `Configuration` with an optional target queue.
//! - Resolve a valid handle for the calling context before every operation.
//!
//! # Invariants
//! - A `Container` never owns a handle; it is a plain value that can be
//!   cloned and sent to any context.
//! - Containers with equal configurations share one handle per context.
//!
//! # See also
//! - `store::HandleCache`

mod maintenance;
mod write;

use crate::config::Configuration;
use crate::error::ContainerResult;
use crate::queue::WorkQueue;
use crate::store::{HandleCache, ObjectRef, Results, StoreHandle};
use log::warn;

#[derive(Debug, Clone)]
pub struct Container {
    configuration: Configuration,
    queue: Option<WorkQueue>,
}

impl Container {
    pub fn new(configuration: Configuration) -> Self {
        Self {
            configuration,
            queue: None,
        }
    }

    /// Container whose asynchronous writes default to `queue`.
    pub fn with_queue(configuration: Configuration, queue: WorkQueue) -> Self {
        Self {
            configuration,
            queue: Some(queue),
        }
    }

    /// Container over `Configuration::default_configuration()`.
    pub fn with_default_configuration() -> Self {
        Self::new(Configuration::default_configuration())
    }

    /// New container over the same configuration, targeting `queue`.
    pub fn new_instance(&self, queue: Option<WorkQueue>) -> Self {
        Self {
            configuration: self.configuration.clone(),
            queue,
        }
    }

    pub fn configuration(&self) -> &Configuration {
        &self.configuration
    }

    pub fn queue(&self) -> Option<&WorkQueue> {
        self.queue.as_ref()
    }

    /// Handle for the calling context, opened on first use.
    ///
    /// # Errors
    /// - `ContainerError::Open` when the store cannot be opened.
    pub fn handle(&self) -> ContainerResult<StoreHandle> {
        Ok(HandleCache::resolve(&self.configuration)?)
    }

    /// Drops the calling context's cached handle.
    pub fn release_handle(&self) -> bool {
        HandleCache::release()
    }

    /// Looks up one object by primary key.
    ///
    /// Returns `None` for absent keys and when the lookup fails; failures are
    /// logged.
    pub fn item(&self, kind: &str, key: &str) -> Option<ObjectRef> {
        let lookup = self
            .handle()
            .and_then(|handle| Ok(handle.item(kind, key)?));
        match lookup {
            Ok(item) => item,
            Err(err) => {
                warn!("event=item_lookup module=container status=error kind={kind} error={err}");
                None
            }
        }
    }

    /// Live view over every object of `kind`.
    ///
    /// An empty store yields an empty view. Returns `None` only when the handle
    /// cannot be resolved or `kind` is not in the schema.
    pub fn items(&self, kind: &str) -> Option<Results> {
        let lookup = self
            .handle()
            .and_then(|handle| Ok(handle.items(kind)?));
        match lookup {
            Ok(items) => Some(items),
            Err(err) => {
                warn!("event=items_lookup module=container status=error kind={kind} error={err}");
                None
            }
        }
    }
}
