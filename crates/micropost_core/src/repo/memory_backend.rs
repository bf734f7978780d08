//! In-process `PersistenceBackend` over ordered maps.
//!
//! Useful for embedding without SQLite and for observing store behavior:
//! it counts write calls and can be switched offline to simulate storage
//! outages.
//!
//! # Invariants
//! - `rollback` restores the exact state captured by `begin`.
//! - While offline, every call except `rollback` fails with
//!   `StorageError::Unavailable`.

use crate::model::entity::{EntityId, EntityKind, FieldValues};
use crate::repo::backend::{PersistenceBackend, StorageError, StorageResult};
use std::collections::BTreeMap;
use uuid::Uuid;

type Tables = BTreeMap<EntityKind, BTreeMap<EntityId, FieldValues>>;

#[derive(Debug, Default)]
pub struct MemoryBackend {
    tables: Tables,
    snapshot: Option<Tables>,
    write_count: usize,
    offline: bool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of insert/update/delete calls that changed a row.
    pub fn write_count(&self) -> usize {
        self.write_count
    }

    /// Number of stored rows of `kind`.
    pub fn row_count(&self, kind: EntityKind) -> usize {
        self.tables.get(&kind).map_or(0, BTreeMap::len)
    }

    /// Toggles simulated outage.
    pub fn set_offline(&mut self, offline: bool) {
        self.offline = offline;
    }

    fn ensure_online(&self) -> StorageResult<()> {
        if self.offline {
            return Err(StorageError::Unavailable(
                "memory backend is offline".to_string(),
            ));
        }
        Ok(())
    }

    fn table_mut(&mut self, kind: EntityKind) -> &mut BTreeMap<EntityId, FieldValues> {
        self.tables.entry(kind).or_default()
    }
}

fn persisted_copy(kind: EntityKind, fields: &FieldValues) -> FieldValues {
    fields.persisted_for(kind).into_iter().collect()
}

impl PersistenceBackend for MemoryBackend {
    fn begin(&mut self) -> StorageResult<()> {
        self.ensure_online()?;
        if self.snapshot.is_some() {
            return Err(StorageError::TransactionState(
                "begin called inside an open transaction",
            ));
        }
        self.snapshot = Some(self.tables.clone());
        Ok(())
    }

    fn commit(&mut self) -> StorageResult<()> {
        self.ensure_online()?;
        match self.snapshot.take() {
            Some(_) => Ok(()),
            None => Err(StorageError::TransactionState(
                "commit called without an open transaction",
            )),
        }
    }

    fn rollback(&mut self) -> StorageResult<()> {
        match self.snapshot.take() {
            Some(previous) => {
                self.tables = previous;
                Ok(())
            }
            None => Err(StorageError::TransactionState(
                "rollback called without an open transaction",
            )),
        }
    }

    fn in_transaction(&self) -> bool {
        self.snapshot.is_some()
    }

    fn insert(&mut self, kind: EntityKind, fields: &FieldValues) -> StorageResult<EntityId> {
        self.ensure_online()?;
        let id = Uuid::new_v4();
        let row = persisted_copy(kind, fields);
        self.table_mut(kind).insert(id, row);
        self.write_count += 1;
        Ok(id)
    }

    fn update(
        &mut self,
        kind: EntityKind,
        id: EntityId,
        fields: &FieldValues,
    ) -> StorageResult<()> {
        self.ensure_online()?;
        let row = persisted_copy(kind, fields);
        match self.table_mut(kind).get_mut(&id) {
            Some(existing) => {
                *existing = row;
                self.write_count += 1;
                Ok(())
            }
            None => Err(StorageError::RowNotFound { kind, id }),
        }
    }

    fn find_by_id(&self, kind: EntityKind, id: EntityId) -> StorageResult<Option<FieldValues>> {
        self.ensure_online()?;
        Ok(self
            .tables
            .get(&kind)
            .and_then(|table| table.get(&id))
            .cloned())
    }

    fn find_by_foreign_key(
        &self,
        kind: EntityKind,
        field: &str,
        value: &str,
    ) -> StorageResult<Vec<EntityId>> {
        self.ensure_online()?;
        if !kind.fields().iter().any(|column| *column == field) {
            return Err(StorageError::InvalidData(format!(
                "unknown column `{field}` for {kind}"
            )));
        }
        Ok(self
            .tables
            .get(&kind)
            .map(|table| {
                table
                    .iter()
                    .filter(|(_, row)| row.get(field) == Some(value))
                    .map(|(id, _)| *id)
                    .collect()
            })
            .unwrap_or_default())
    }

    fn delete(&mut self, kind: EntityKind, id: EntityId) -> StorageResult<()> {
        self.ensure_online()?;
        match self.table_mut(kind).remove(&id) {
            Some(_) => {
                self.write_count += 1;
                Ok(())
            }
            None => Err(StorageError::RowNotFound { kind, id }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::MemoryBackend;
    use crate::model::entity::{EntityKind, FieldValues};
    use crate::repo::backend::{PersistenceBackend, StorageError};
    use uuid::Uuid;

    fn user_fields(name: &str) -> FieldValues {
        FieldValues::new()
            .with("name", name)
            .with("email", format!("{name}@example.com"))
    }

    #[test]
    fn rollback_restores_state_captured_at_begin() {
        let mut backend = MemoryBackend::new();
        let kept = backend.insert(EntityKind::User, &user_fields("kept")).unwrap();

        backend.begin().unwrap();
        backend
            .insert(EntityKind::User, &user_fields("discarded"))
            .unwrap();
        backend.delete(EntityKind::User, kept).unwrap();
        backend.rollback().unwrap();

        assert_eq!(backend.row_count(EntityKind::User), 1);
        assert!(backend.exists(EntityKind::User, kept).unwrap());
        assert!(!backend.in_transaction());
    }

    #[test]
    fn nested_begin_is_rejected() {
        let mut backend = MemoryBackend::new();
        backend.begin().unwrap();
        let err = backend.begin().unwrap_err();
        assert!(matches!(err, StorageError::TransactionState(_)));
    }

    #[test]
    fn insert_drops_fields_outside_the_kind_schema() {
        let mut backend = MemoryBackend::new();
        let id = backend
            .insert(EntityKind::User, &user_fields("ada").with("admin", "true"))
            .unwrap();
        let stored = backend.find_by_id(EntityKind::User, id).unwrap().unwrap();
        assert_eq!(stored.get("admin"), None);
        assert_eq!(stored.len(), 2);
    }

    #[test]
    fn writes_to_missing_rows_are_not_counted() {
        let mut backend = MemoryBackend::new();
        let id = backend.insert(EntityKind::User, &user_fields("ada")).unwrap();
        let missing = Uuid::new_v4();

        let err = backend
            .update(EntityKind::User, missing, &user_fields("bob"))
            .unwrap_err();
        assert!(matches!(err, StorageError::RowNotFound { .. }));
        let err = backend.delete(EntityKind::User, missing).unwrap_err();
        assert!(matches!(err, StorageError::RowNotFound { .. }));
        assert_eq!(backend.write_count(), 1);

        backend
            .update(EntityKind::User, id, &user_fields("ada"))
            .unwrap();
        backend.delete(EntityKind::User, id).unwrap();
        assert_eq!(backend.write_count(), 3);
    }

    #[test]
    fn offline_backend_fails_every_call() {
        let mut backend = MemoryBackend::new();
        backend.set_offline(true);
        let err = backend
            .insert(EntityKind::User, &user_fields("ada"))
            .unwrap_err();
        assert!(matches!(err, StorageError::Unavailable(_)));
        assert_eq!(backend.write_count(), 0);
    }
}
