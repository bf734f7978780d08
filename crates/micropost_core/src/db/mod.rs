//! SQLite bootstrap for the bundled backend.
//!
//! # Responsibility
//! - Open and configure SQLite connections.
//! - Bring the private `users` / `microposts` schema to the expected version.
//!
//! # Invariants
//! - Schema version is tracked via `PRAGMA user_version`.
//! - No entity data is read or written before the schema is current.

use crate::model::entity::EntityKind;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod migrations;
mod open;

pub use open::{open_db, open_db_in_memory};

pub type DbResult<T> = Result<T, DbError>;

/// Why a database could not be brought to a usable state.
#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    /// On-disk schema is newer than this binary understands.
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
    /// Schema version is current but the table backing `EntityKind` is absent.
    MissingEntityTable(EntityKind),
}

impl DbError {
    /// Stable `error_code` value for `db_open` log events.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Sqlite(_) => "sqlite_error",
            Self::UnsupportedSchemaVersion { .. } => "schema_too_new",
            Self::MissingEntityTable(_) => "missing_entity_table",
        }
    }
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "sqlite: {err}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "micropost schema version {db_version} is newer than supported {latest_supported}"
            ),
            Self::MissingEntityTable(kind) => {
                write!(f, "table `{}` for {kind} records is missing", kind.table())
            }
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::UnsupportedSchemaVersion { .. } | Self::MissingEntityTable(_) => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

#[cfg(test)]
mod tests {
    use super::DbError;
    use crate::model::entity::EntityKind;

    #[test]
    fn missing_table_names_kind_and_table() {
        let err = DbError::MissingEntityTable(EntityKind::Micropost);
        assert_eq!(err.code(), "missing_entity_table");
        assert_eq!(
            err.to_string(),
            "table `microposts` for micropost records is missing"
        );
    }
}
