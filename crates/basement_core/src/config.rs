//! Store configuration values.
//!
//! # Responsibility
//! - Describe how to locate and open a store.
//! - Hold the process-wide default configuration.
//!
//! # Invariants
//! - A `Configuration` is immutable once built; builders return new values.
//! - Two equal configurations may share one cached handle per context.

use crate::model::schema::Schema;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use uuid::Uuid;

const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_STORE_FILE: &str = "default.store";
const AUXILIARY_SUFFIXES: &[&str] = &["-wal", "-shm", "-journal"];

static DEFAULT_CONFIGURATION: Lazy<RwLock<Configuration>> = Lazy::new(|| {
    RwLock::new(Configuration::file(
        std::env::temp_dir().join("basement").join(DEFAULT_STORE_FILE),
    ))
});

/// Where the store lives.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StoreLocation {
    /// Store file on disk. The engine may create auxiliary files next to it.
    File(PathBuf),
    /// Named in-memory store, shared by every handle opened with the same name.
    Memory(String),
}

impl StoreLocation {
    /// Files the engine may create for this store, main file first.
    pub fn files(&self) -> Vec<PathBuf> {
        match self {
            Self::File(path) => {
                let mut files = vec![path.clone()];
                files.extend(AUXILIARY_SUFFIXES.iter().map(|suffix| {
                    let mut name = path.as_os_str().to_owned();
                    name.push(suffix);
                    PathBuf::from(name)
                }));
                files
            }
            Self::Memory(_) => Vec::new(),
        }
    }

    /// Returns whether `path` is one of the files owned by this store.
    pub fn owns(&self, path: &Path) -> bool {
        self.files().iter().any(|file| file == path)
    }

    /// Same location with file paths resolved, so two spellings of one file
    /// compare equal.
    ///
    /// The longest existing ancestor is canonicalized; the missing tail is
    /// appended lexically.
    pub fn normalized(&self) -> StoreLocation {
        match self {
            Self::File(path) => Self::File(resolve_path(path)),
            Self::Memory(identifier) => Self::Memory(identifier.clone()),
        }
    }
}

fn resolve_path(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        match std::env::current_dir() {
            Ok(cwd) => cwd.join(path),
            Err(_) => return path.to_path_buf(),
        }
    };

    for ancestor in absolute.ancestors() {
        let Ok(mut resolved) = std::fs::canonicalize(ancestor) else {
            continue;
        };
        let Ok(tail) = absolute.strip_prefix(ancestor) else {
            continue;
        };
        for component in tail.components() {
            match component {
                Component::ParentDir => {
                    resolved.pop();
                }
                Component::Normal(part) => resolved.push(part),
                _ => {}
            }
        }
        return resolved;
    }
    absolute
}

/// Immutable description of one store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Configuration {
    location: StoreLocation,
    schema: Schema,
    schema_version: u32,
    read_only: bool,
    busy_timeout: Duration,
}

impl Configuration {
    /// File-backed store at `path`.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::at(StoreLocation::File(path.into()))
    }

    /// Named in-memory store. Contents live while at least one handle is open.
    pub fn in_memory(identifier: impl Into<String>) -> Self {
        Self::at(StoreLocation::Memory(identifier.into()))
    }

    /// In-memory store with a freshly generated identifier.
    pub fn in_memory_unique() -> Self {
        Self::in_memory(Uuid::new_v4().to_string())
    }

    fn at(location: StoreLocation) -> Self {
        Self {
            location,
            schema: Schema::default(),
            schema_version: 0,
            read_only: false,
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        }
    }

    pub fn with_schema(mut self, schema: Schema) -> Self {
        self.schema = schema;
        self
    }

    pub fn with_schema_version(mut self, version: u32) -> Self {
        self.schema_version = version;
        self
    }

    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    pub fn location(&self) -> &StoreLocation {
        &self.location
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn schema_version(&self) -> u32 {
        self.schema_version
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn busy_timeout(&self) -> Duration {
        self.busy_timeout
    }

    /// Returns a copy of the process-wide default configuration.
    pub fn default_configuration() -> Self {
        DEFAULT_CONFIGURATION.read().clone()
    }

    /// Replaces the process-wide default configuration.
    ///
    /// Containers created earlier keep the configuration they were built with.
    pub fn set_default(configuration: Configuration) {
        *DEFAULT_CONFIGURATION.write() = configuration;
    }
}
