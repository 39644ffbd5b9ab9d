//! Destructive store maintenance.
//!
//! Both operations verify their post-condition and report an error instead
//! of leaving orphaned files behind silently.

use super::Container;
use crate::config::{Configuration, StoreLocation};
use crate::error::{ContainerError, ContainerResult};
use crate::fsutil::{list_entries, normalize, remove_entry, remove_file_if_exists};
use crate::store::StoreRegistry;
use log::{debug, info, warn};
use std::fs;
use std::path::Path;

impl Container {
    /// Deletes the store described by `configuration`, auxiliary files included.
    ///
    /// # Errors
    /// - `StillReferenced` while any context holds a handle to the store.
    /// - `Io` when a file exists but cannot be removed.
    pub fn kill(configuration: &Configuration) -> ContainerResult<()> {
        let location = configuration.location();
        StoreRegistry::global().while_unreferenced(location, || {
            let mut removed = 0;
            for file in location.files() {
                if remove_file_if_exists(&file)? {
                    removed += 1;
                }
            }
            if let StoreLocation::File(path) = location {
                info!(
                    "event=store_kill module=maintenance status=ok path={} removed={removed}",
                    path.display()
                );
            }
            Ok(())
        })
    }

    /// Deletes every entry in `folder`, then the folder itself.
    ///
    /// Files held by live handles are left in place, which makes the final
    /// emptiness check fail. The registry stays locked throughout, so no
    /// handle can be opened on a file while it is being removed.
    ///
    /// # Errors
    /// - `NotEmpty` when entries remain after cleanup; the folder is kept.
    /// - `Io` on any other file-system failure.
    pub fn wipe_all(folder: impl AsRef<Path>) -> ContainerResult<()> {
        let folder = folder.as_ref();
        StoreRegistry::global().while_locked(|held| -> ContainerResult<()> {
            let held: Vec<_> = held.iter().map(|file| normalize(file)).collect();
            for entry in list_entries(folder)? {
                let normalized = normalize(&entry);
                if held.iter().any(|file| file.starts_with(&normalized)) {
                    debug!(
                        "event=folder_wipe module=maintenance status=skipped entry={}",
                        entry.display()
                    );
                    continue;
                }
                remove_entry(&entry)?;
            }

            let remaining = list_entries(folder)?;
            if !remaining.is_empty() {
                warn!(
                    "event=folder_wipe module=maintenance status=error folder={} remaining={}",
                    folder.display(),
                    remaining.len()
                );
                return Err(ContainerError::NotEmpty {
                    path: folder.to_path_buf(),
                    remaining,
                });
            }

            fs::remove_dir(folder)?;
            info!(
                "event=folder_wipe module=maintenance status=ok folder={}",
                folder.display()
            );
            Ok(())
        })
    }
}
