//! Per-context handle cache.
//!
//! # Responsibility
//! - Resolve a `Configuration` to a reusable handle for the current context.
//! - Replace the context's handle when a different configuration is requested.
//!
//! # Invariants
//! - One slot per execution context; a slot is only ever touched by its own
//!   context, so handles never cross threads.
//! - Equal configurations on one context resolve to the same handle.
//! - A slot is replaced, never mutated in place.

use super::handle::StoreHandle;
use crate::config::Configuration;
use crate::db::OpenResult;
use crate::queue::current_label;
use log::debug;
use std::cell::RefCell;

thread_local! {
    static SLOT: RefCell<Option<StoreHandle>> = const { RefCell::new(None) };
}

/// Entry point of the per-context cache.
pub struct HandleCache;

impl HandleCache {
    /// Returns the cached handle for `configuration`, opening one if needed.
    ///
    /// # Errors
    /// - Returns `OpenError` when the engine cannot open or create the store.
    pub fn resolve(configuration: &Configuration) -> OpenResult<StoreHandle> {
        let cached = SLOT.with(|slot| {
            slot.borrow()
                .as_ref()
                .filter(|handle| handle.configuration() == configuration)
                .cloned()
        });
        if let Some(handle) = cached {
            return Ok(handle);
        }

        let handle = StoreHandle::open(configuration)?;
        let previous = SLOT.with(|slot| slot.borrow_mut().replace(handle.clone()));
        debug!(
            "event=handle_cache module=cache status=created context={} replaced={}",
            current_label(),
            previous.is_some()
        );
        drop(previous);
        Ok(handle)
    }

    /// Drops the current context's cached handle. Returns whether one existed.
    ///
    /// Clones held elsewhere stay valid; the store closes with the last one.
    pub fn release() -> bool {
        let previous = SLOT.with(|slot| slot.borrow_mut().take());
        previous.is_some()
    }

    /// Configuration of the current context's cached handle, if any.
    pub fn cached_configuration() -> Option<Configuration> {
        SLOT.with(|slot| {
            slot.borrow()
                .as_ref()
                .map(|handle| handle.configuration().clone())
        })
    }
}
