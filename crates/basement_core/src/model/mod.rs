//! Schema and value model shared by the store and by detachment.
//!
//! # Responsibility
//! - Define object kinds, their ordered properties and primitive values.
//!
//! # Invariants
//! - Schemas are validated before a store handle is opened with them.
//! - Values carry no identity and are always copied, never shared.

pub mod id;
pub mod schema;
pub mod value;
