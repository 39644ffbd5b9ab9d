//! Process-wide registry of live store handles.
//!
//! Counts open handles per store location across every execution context so
//! destructive maintenance can refuse to touch a store that is still in use.
//! File locations are keyed by their normalized path.
//! Uses `parking_lot::Mutex` so a panic on one context cannot poison the map
//! for the others.

use crate::config::StoreLocation;
use crate::error::{ContainerError, ContainerResult};
use log::debug;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;

static REGISTRY: Lazy<StoreRegistry> = Lazy::new(StoreRegistry::default);

#[derive(Debug, Default)]
pub struct StoreRegistry {
    open: Mutex<HashMap<StoreLocation, usize>>,
}

impl StoreRegistry {
    pub fn global() -> &'static StoreRegistry {
        &REGISTRY
    }

    /// Number of live handles for `location`, across all contexts.
    pub fn live_handles(&self, location: &StoreLocation) -> usize {
        self.open
            .lock()
            .get(&location.normalized())
            .copied()
            .unwrap_or(0)
    }

    /// Files currently held open by at least one live handle.
    pub fn held_files(&self) -> Vec<PathBuf> {
        held(&self.open.lock())
    }

    /// Runs `action` with the files held by live handles.
    ///
    /// The registry stays locked for the duration, so the set cannot grow
    /// while `action` runs.
    pub fn while_locked<T>(&self, action: impl FnOnce(&[PathBuf]) -> T) -> T {
        let open = self.open.lock();
        action(&held(&open))
    }

    /// Runs `action` while no handle references `location`.
    ///
    /// The registry stays locked for the duration, so no handle can be opened
    /// for any store while `action` runs.
    pub fn while_unreferenced<T>(
        &self,
        location: &StoreLocation,
        action: impl FnOnce() -> ContainerResult<T>,
    ) -> ContainerResult<T> {
        let open = self.open.lock();
        if let Some(&handles) = open.get(&location.normalized()) {
            return Err(ContainerError::StillReferenced {
                location: location.clone(),
                handles,
            });
        }
        action()
    }

    pub(crate) fn register(&'static self, location: &StoreLocation) -> Registration {
        let location = location.normalized();
        let mut open = self.open.lock();
        let count = open.entry(location.clone()).or_insert(0);
        *count += 1;
        debug!("event=store_register module=registry status=ok handles={count}");
        Registration {
            registry: self,
            location,
        }
    }

    fn release(&self, location: &StoreLocation) {
        let mut open = self.open.lock();
        if let Some(count) = open.get_mut(location) {
            *count -= 1;
            if *count == 0 {
                open.remove(location);
            }
        }
    }
}

fn held(open: &HashMap<StoreLocation, usize>) -> Vec<PathBuf> {
    open.keys().flat_map(StoreLocation::files).collect()
}

/// Keeps one handle counted in the registry until dropped.
#[derive(Debug)]
pub(crate) struct Registration {
    registry: &'static StoreRegistry,
    location: StoreLocation,
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.registry.release(&self.location);
    }
}
