//! Entity store use-cases.
//!
//! # Responsibility
//! - Orchestrate validation, reference checks and backend writes.
//! - Keep callers decoupled from the concrete backend.

pub mod entity_store;
