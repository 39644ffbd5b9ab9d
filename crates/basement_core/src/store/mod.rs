//! Context-confined access to opened stores.
//!
//! # Responsibility
//! - Open handles, cache them per execution context and count them per store.
//! - Expose live objects and collections read through a handle.
//!
//! # Invariants
//! - Nothing in this module that touches a connection is `Send`.

mod cache;
mod handle;
mod object;
mod registry;

pub use cache::HandleCache;
pub use handle::StoreHandle;
pub use object::{ObjectRef, Results};
pub use registry::StoreRegistry;
