//! Persistence backend contract consumed by the entity store.
//!
//! # Responsibility
//! - Define the CRUD primitives the store is allowed to use.
//! - Define `StorageError`, the only failure a backend may raise.
//!
//! # Invariants
//! - Backends never validate field rules; the store does.
//! - `insert` assigns a fresh, non-nil id.
//! - Only `EntityKind::fields()` columns are written.

use crate::db::DbError;
use crate::model::entity::{EntityId, EntityKind, FieldValues};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type StorageResult<T> = Result<T, StorageError>;

/// Backend-level failure. Never a business-rule violation.
#[derive(Debug)]
pub enum StorageError {
    Db(DbError),
    /// Persisted row cannot be decoded.
    InvalidData(String),
    /// Update/delete addressed a row the backend does not hold.
    RowNotFound { kind: EntityKind, id: EntityId },
    /// Backend cannot serve requests.
    Unavailable(String),
    /// Transaction control called in the wrong state.
    TransactionState(&'static str),
    /// Connection schema is not at the version this binary writes.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
}

impl Display for StorageError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
            Self::RowNotFound { kind, id } => write!(f, "{kind} row not found: {id}"),
            Self::Unavailable(message) => write!(f, "storage unavailable: {message}"),
            Self::TransactionState(message) => write!(f, "transaction misuse: {message}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "backend requires schema version {expected_version}, got {actual_version}"
            ),
        }
    }
}

impl Error for StorageError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for StorageError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StorageError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// CRUD primitives plus scoped transactions.
///
/// Transactions are flat: `begin` inside an open transaction is an error.
pub trait PersistenceBackend {
    fn begin(&mut self) -> StorageResult<()>;
    fn commit(&mut self) -> StorageResult<()>;
    fn rollback(&mut self) -> StorageResult<()>;
    fn in_transaction(&self) -> bool;

    /// Inserts a new row and returns its assigned id.
    fn insert(&mut self, kind: EntityKind, fields: &FieldValues) -> StorageResult<EntityId>;
    /// Replaces the persisted fields of an existing row.
    fn update(
        &mut self,
        kind: EntityKind,
        id: EntityId,
        fields: &FieldValues,
    ) -> StorageResult<()>;
    fn find_by_id(&self, kind: EntityKind, id: EntityId) -> StorageResult<Option<FieldValues>>;
    /// Ids of `kind` rows whose `field` equals `value`, ascending.
    fn find_by_foreign_key(
        &self,
        kind: EntityKind,
        field: &str,
        value: &str,
    ) -> StorageResult<Vec<EntityId>>;
    fn delete(&mut self, kind: EntityKind, id: EntityId) -> StorageResult<()>;

    fn exists(&self, kind: EntityKind, id: EntityId) -> StorageResult<bool> {
        Ok(self.find_by_id(kind, id)?.is_some())
    }
}

impl<B: PersistenceBackend + ?Sized> PersistenceBackend for &mut B {
    fn begin(&mut self) -> StorageResult<()> {
        (**self).begin()
    }

    fn commit(&mut self) -> StorageResult<()> {
        (**self).commit()
    }

    fn rollback(&mut self) -> StorageResult<()> {
        (**self).rollback()
    }

    fn in_transaction(&self) -> bool {
        (**self).in_transaction()
    }

    fn insert(&mut self, kind: EntityKind, fields: &FieldValues) -> StorageResult<EntityId> {
        (**self).insert(kind, fields)
    }

    fn update(
        &mut self,
        kind: EntityKind,
        id: EntityId,
        fields: &FieldValues,
    ) -> StorageResult<()> {
        (**self).update(kind, id, fields)
    }

    fn find_by_id(&self, kind: EntityKind, id: EntityId) -> StorageResult<Option<FieldValues>> {
        (**self).find_by_id(kind, id)
    }

    fn find_by_foreign_key(
        &self,
        kind: EntityKind,
        field: &str,
        value: &str,
    ) -> StorageResult<Vec<EntityId>> {
        (**self).find_by_foreign_key(kind, field, value)
    }

    fn delete(&mut self, kind: EntityKind, id: EntityId) -> StorageResult<()> {
        (**self).delete(kind, id)
    }

    fn exists(&self, kind: EntityKind, id: EntityId) -> StorageResult<bool> {
        (**self).exists(kind, id)
    }
}
