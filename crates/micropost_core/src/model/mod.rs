//! Entity model and validation rules.
//!
//! # Responsibility
//! - Define the user/micropost shapes shared by store and backends.
//! - Keep field rules declarative and free of storage access.
//!
//! # Invariants
//! - Every persisted user has a non-blank name and email.
//! - Every persisted micropost has non-blank content of at most 140 characters
//!   and references a persisted user.

pub mod entity;
pub mod validation;
