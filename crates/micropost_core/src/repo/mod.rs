//! Persistence backend contract and bundled implementations.
//!
//! # Responsibility
//! - Define the CRUD surface the entity store depends on.
//! - Isolate SQLite details from store orchestration.
//!
//! # Invariants
//! - Backends report failures only as `StorageError`, never as violations.
//! - Update/delete of a missing row is `StorageError::RowNotFound`.

pub mod backend;
pub mod memory_backend;
pub mod sqlite_backend;
