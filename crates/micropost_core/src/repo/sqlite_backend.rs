//! SQLite implementation of `PersistenceBackend`.
//!
//! # Responsibility
//! - Map entity kinds onto the `users` / `microposts` tables.
//! - Keep SQL details inside the persistence boundary.
//!
//! # Invariants
//! - Table and column names come only from `EntityKind`, never from callers.
//! - `updated_at` only moves when a persisted field changes.
//! - Transactions use `BEGIN IMMEDIATE` so the write lock is held before any
//!   reference check runs.
//! - Read paths reject undecodable rows instead of masking them.

use crate::db::migrations::{current_user_version, latest_version};
use crate::model::entity::{EntityId, EntityKind, FieldValues};
use crate::repo::backend::{PersistenceBackend, StorageError, StorageResult};
use log::debug;
use rusqlite::{params_from_iter, Connection, OptionalExtension};
use uuid::Uuid;

/// Backend over a migrated SQLite connection.
pub struct SqliteBackend<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteBackend<'conn> {
    /// Wraps a connection returned by `open_db` / `open_db_in_memory`.
    ///
    /// # Errors
    /// - `StorageError::UninitializedConnection` when the schema is not current.
    pub fn try_new(conn: &'conn Connection) -> StorageResult<Self> {
        let actual_version = current_user_version(conn)?;
        let expected_version = latest_version();
        if actual_version != expected_version {
            return Err(StorageError::UninitializedConnection {
                expected_version,
                actual_version,
            });
        }
        Ok(Self { conn })
    }
}

impl PersistenceBackend for SqliteBackend<'_> {
    fn begin(&mut self) -> StorageResult<()> {
        if !self.conn.is_autocommit() {
            return Err(StorageError::TransactionState(
                "begin called inside an open transaction",
            ));
        }
        self.conn.execute_batch("BEGIN IMMEDIATE;")?;
        Ok(())
    }

    fn commit(&mut self) -> StorageResult<()> {
        if self.conn.is_autocommit() {
            return Err(StorageError::TransactionState(
                "commit called without an open transaction",
            ));
        }
        self.conn.execute_batch("COMMIT;")?;
        Ok(())
    }

    fn rollback(&mut self) -> StorageResult<()> {
        if self.conn.is_autocommit() {
            return Err(StorageError::TransactionState(
                "rollback called without an open transaction",
            ));
        }
        self.conn.execute_batch("ROLLBACK;")?;
        Ok(())
    }

    fn in_transaction(&self) -> bool {
        !self.conn.is_autocommit()
    }

    fn insert(&mut self, kind: EntityKind, fields: &FieldValues) -> StorageResult<EntityId> {
        let id = Uuid::new_v4();
        let columns = kind.fields();
        let placeholders = (2..=columns.len() + 1)
            .map(|index| format!("?{index}"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "INSERT INTO {} (id, {}) VALUES (?1, {placeholders});",
            kind.table(),
            columns.join(", ")
        );

        let id_text = id.to_string();
        let values = std::iter::once(id_text.as_str())
            .chain(fields.persisted_for(kind).into_iter().map(|(_, value)| value));
        self.conn.execute(&sql, params_from_iter(values))?;

        debug!("event=row_insert module=repo status=ok kind={kind} id={id}");
        Ok(id)
    }

    fn update(
        &mut self,
        kind: EntityKind,
        id: EntityId,
        fields: &FieldValues,
    ) -> StorageResult<()> {
        let assignments = kind
            .fields()
            .iter()
            .enumerate()
            .map(|(index, column)| format!("{column} = ?{}", index + 2))
            .collect::<Vec<_>>()
            .join(", ");
        // Right-hand sides see the old row, so identical re-saves keep their stamp.
        let unchanged = kind
            .fields()
            .iter()
            .enumerate()
            .map(|(index, column)| format!("{column} IS ?{}", index + 2))
            .collect::<Vec<_>>()
            .join(" AND ");
        let sql = format!(
            "UPDATE {}
             SET {assignments},
                 updated_at = CASE WHEN {unchanged} THEN updated_at
                                   ELSE (strftime('%s', 'now') * 1000) END
             WHERE id = ?1;",
            kind.table()
        );

        let id_text = id.to_string();
        let values = std::iter::once(id_text.as_str())
            .chain(fields.persisted_for(kind).into_iter().map(|(_, value)| value));
        let changed = self.conn.execute(&sql, params_from_iter(values))?;
        if changed == 0 {
            return Err(StorageError::RowNotFound { kind, id });
        }

        debug!("event=row_update module=repo status=ok kind={kind} id={id}");
        Ok(())
    }

    fn find_by_id(&self, kind: EntityKind, id: EntityId) -> StorageResult<Option<FieldValues>> {
        let columns = kind.fields();
        let sql = format!(
            "SELECT {} FROM {} WHERE id = ?1;",
            columns.join(", "),
            kind.table()
        );

        let row = self
            .conn
            .query_row(&sql, [id.to_string()], |row| {
                let mut fields = FieldValues::new();
                for (index, column) in columns.iter().enumerate() {
                    fields.set(*column, row.get::<_, String>(index)?);
                }
                Ok(fields)
            })
            .optional()?;
        Ok(row)
    }

    fn find_by_foreign_key(
        &self,
        kind: EntityKind,
        field: &str,
        value: &str,
    ) -> StorageResult<Vec<EntityId>> {
        let column = kind
            .fields()
            .iter()
            .find(|column| **column == field)
            .ok_or_else(|| {
                StorageError::InvalidData(format!("unknown column `{field}` for {kind}"))
            })?;
        let sql = format!(
            "SELECT id FROM {} WHERE {column} = ?1 ORDER BY id ASC;",
            kind.table()
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query([value])?;
        let mut ids = Vec::new();
        while let Some(row) = rows.next()? {
            let id_text: String = row.get(0)?;
            let id = Uuid::parse_str(&id_text).map_err(|_| {
                StorageError::InvalidData(format!(
                    "invalid id value `{id_text}` in {}.id",
                    kind.table()
                ))
            })?;
            ids.push(id);
        }
        Ok(ids)
    }

    fn delete(&mut self, kind: EntityKind, id: EntityId) -> StorageResult<()> {
        let changed = self.conn.execute(
            &format!("DELETE FROM {} WHERE id = ?1;", kind.table()),
            [id.to_string()],
        )?;
        if changed == 0 {
            return Err(StorageError::RowNotFound { kind, id });
        }

        debug!("event=row_delete module=repo status=ok kind={kind} id={id}");
        Ok(())
    }
}
