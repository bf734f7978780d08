//! Validated persistence core for users and their microposts.
//! This crate is the single source of truth for entity invariants.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{
    default_log_level, ConfigError, CoreConfig, DeletePolicy, LogConfig, StoreConfig,
};
pub use logging::{init_logging, logging_status};
pub use model::entity::{
    EntityId, EntityKind, FieldValues, Micropost, RecordDecodeError, User, FIELD_CONTENT,
    FIELD_EMAIL, FIELD_NAME, FIELD_USER_ID,
};
pub use model::validation::{validate, Rule, Violation, MICROPOST_CONTENT_MAX_CHARS};
pub use repo::backend::{PersistenceBackend, StorageError, StorageResult};
pub use repo::memory_backend::MemoryBackend;
pub use repo::sqlite_backend::SqliteBackend;
pub use service::entity_store::{DeleteError, EntityStore, SaveError};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
