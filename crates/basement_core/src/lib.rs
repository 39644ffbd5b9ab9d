//! Thread-confined access to an embedded object store.
//!
//! A `Container` resolves a store handle for the calling execution context,
//! runs write transactions against it and detaches live objects into
//! free-standing values that may cross threads.

pub mod config;
pub mod confined;
pub mod container;
pub mod db;
pub mod detach;
pub mod error;
pub mod fsutil;
pub mod logging;
pub mod model;
pub mod queue;
pub mod repo;
pub mod store;
pub mod transaction;

pub use config::{Configuration, StoreLocation};
pub use confined::{ThreadConfined, ThreadSafeReference};
pub use container::Container;
pub use db::OpenError;
pub use detach::{
    detach, detach_all, Detachable, DetachedField, DetachedNode, DetachedObject, DetachedRef,
    NodeId,
};
pub use error::{
    ContainerError, ContainerResult, StoreError, StoreResult, TransactionError, TxResult,
};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::id::ObjectId;
pub use model::schema::{ObjectSchema, Property, PropertyKind, Schema, SchemaError};
pub use model::value::{Value, ValueType};
pub use queue::{ContextId, WorkQueue};
pub use store::{HandleCache, ObjectRef, Results, StoreHandle, StoreRegistry};
pub use transaction::WriteTransaction;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
