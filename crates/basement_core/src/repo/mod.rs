//! Row-level persistence of objects.
//!
//! # Responsibility
//! - Define the narrow engine contract the store layer consumes.
//! - Keep SQL details inside the persistence boundary.
//!
//! # Invariants
//! - The repository never interprets values; typing belongs to the store layer.
//! - Link and list order is the `position` column order.

pub mod object_repo;
