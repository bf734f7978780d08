//! Validated save/delete orchestration over an injected backend.
//!
//! # Responsibility
//! - Run field rules before any write and report every violation.
//! - Resolve `References` rules against the backend at write time.
//! - Apply the configured user delete policy to dependent microposts.
//!
//! # Invariants
//! - A candidate with field violations never reaches the backend.
//! - No backend write happens after a validation or integrity failure.
//! - Reference checks and the following write share one backend transaction.
//! - Storage failures surface as `StorageError`, never as violations.
//! - A typed record only gains an id after a successful save.

use crate::config::{DeletePolicy, StoreConfig};
use crate::model::entity::{
    EntityId, EntityKind, FieldValues, Micropost, RecordDecodeError, User, FIELD_USER_ID,
};
use crate::model::validation::{is_blank, validate, Violation};
use crate::repo::backend::{PersistenceBackend, StorageError, StorageResult};
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Failure of `EntityStore::save`.
#[derive(Debug)]
pub enum SaveError {
    /// Candidate broke one or more rules; nothing was written.
    Invalid(Vec<Violation>),
    /// Update addressed an id the backend does not hold.
    NotFound(EntityId),
    Storage(StorageError),
}

impl SaveError {
    /// Violations for `Invalid`, empty otherwise.
    pub fn violations(&self) -> &[Violation] {
        match self {
            Self::Invalid(violations) => violations,
            _ => &[],
        }
    }
}

impl Display for SaveError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Invalid(violations) => {
                let messages = violations
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>();
                write!(f, "validation failed: {}", messages.join("; "))
            }
            Self::NotFound(id) => write!(f, "record not found: {id}"),
            Self::Storage(err) => write!(f, "{err}"),
        }
    }
}

impl Error for SaveError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Storage(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StorageError> for SaveError {
    fn from(value: StorageError) -> Self {
        Self::Storage(value)
    }
}

/// Failure of `EntityStore::delete`.
#[derive(Debug)]
pub enum DeleteError {
    /// User still has microposts under `DeletePolicy::Reject`.
    HasDependents { id: EntityId, dependents: usize },
    NotFound(EntityId),
    Storage(StorageError),
}

impl Display for DeleteError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::HasDependents { id, dependents } => write!(
                f,
                "user {id} still has {dependents} micropost(s); delete rejected"
            ),
            Self::NotFound(id) => write!(f, "record not found: {id}"),
            Self::Storage(err) => write!(f, "{err}"),
        }
    }
}

impl Error for DeleteError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Storage(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StorageError> for DeleteError {
    fn from(value: StorageError) -> Self {
        Self::Storage(value)
    }
}

/// Entity store over an injected persistence backend.
pub struct EntityStore<B: PersistenceBackend> {
    backend: B,
    config: StoreConfig,
}

impl<B: PersistenceBackend> EntityStore<B> {
    pub fn new(backend: B, config: StoreConfig) -> Self {
        Self { backend, config }
    }

    /// Store with default configuration (`DeletePolicy::Reject`).
    pub fn with_backend(backend: B) -> Self {
        Self::new(backend, StoreConfig::default())
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn into_backend(self) -> B {
        self.backend
    }

    /// Validates `fields` and inserts (no `existing_id`) or updates a record.
    ///
    /// # Contract
    /// - All field rules run; every field violation is returned together and
    ///   the backend is not called.
    /// - Reference rules run only for field-valid candidates.
    /// - Returns the new id on insert, `existing_id` on update.
    pub fn save(
        &mut self,
        kind: EntityKind,
        fields: &FieldValues,
        existing_id: Option<EntityId>,
    ) -> Result<EntityId, SaveError> {
        self.save_checked(kind, fields, existing_id)
            .inspect(|id| {
                info!(
                    "event=entity_save module=store status=ok kind={} id={} mode={}",
                    kind,
                    id,
                    if existing_id.is_some() { "update" } else { "insert" }
                );
            })
            .inspect_err(|err| log_save_failure(kind, err))
    }

    /// Deletes one record, applying the delete policy to users.
    pub fn delete(&mut self, kind: EntityKind, id: EntityId) -> Result<(), DeleteError> {
        self.backend.begin()?;
        let outcome = self.delete_in_transaction(kind, id);
        self.finish(outcome)
            .inspect(|cascaded| {
                info!(
                    "event=entity_delete module=store status=ok kind={} id={} cascaded={}",
                    kind, id, cascaded
                );
            })
            .inspect_err(|err| match err {
                DeleteError::HasDependents { dependents, .. } => warn!(
                    "event=entity_delete module=store status=rejected kind={} id={} dependents={}",
                    kind, id, dependents
                ),
                DeleteError::NotFound(_) => warn!(
                    "event=entity_delete module=store status=rejected kind={} id={} error_code=not_found",
                    kind, id
                ),
                DeleteError::Storage(err) => warn!(
                    "event=entity_delete module=store status=error kind={} id={} error={}",
                    kind, id, err
                ),
            })
            .map(|_| ())
    }

    /// Loads the persisted fields of one record.
    pub fn find(&self, kind: EntityKind, id: EntityId) -> StorageResult<Option<FieldValues>> {
        self.backend.find_by_id(kind, id)
    }

    /// Saves a user and records the assigned id on success.
    pub fn save_user(&mut self, user: &mut User) -> Result<EntityId, SaveError> {
        let id = self.save(EntityKind::User, &user.to_fields(), user.id)?;
        user.id = Some(id);
        Ok(id)
    }

    /// Saves a micropost and records the assigned id on success.
    pub fn save_micropost(&mut self, micropost: &mut Micropost) -> Result<EntityId, SaveError> {
        let id = self.save(EntityKind::Micropost, &micropost.to_fields(), micropost.id)?;
        micropost.id = Some(id);
        Ok(id)
    }

    pub fn find_user(&self, id: EntityId) -> StorageResult<Option<User>> {
        self.find(EntityKind::User, id)?
            .map(|fields| User::from_fields(id, &fields).map_err(decode_error))
            .transpose()
    }

    pub fn find_micropost(&self, id: EntityId) -> StorageResult<Option<Micropost>> {
        self.find(EntityKind::Micropost, id)?
            .map(|fields| Micropost::from_fields(id, &fields).map_err(decode_error))
            .transpose()
    }

    /// Microposts owned by `user_id`, ordered by id.
    pub fn microposts_of(&self, user_id: EntityId) -> StorageResult<Vec<Micropost>> {
        let ids = self.backend.find_by_foreign_key(
            EntityKind::Micropost,
            FIELD_USER_ID,
            &user_id.to_string(),
        )?;

        let mut microposts = Vec::with_capacity(ids.len());
        for id in ids {
            let micropost = self.find_micropost(id)?.ok_or_else(|| {
                StorageError::InvalidData(format!("micropost {id} vanished during listing"))
            })?;
            microposts.push(micropost);
        }
        Ok(microposts)
    }

    /// The user a micropost belongs to, if it still exists.
    pub fn micropost_owner(&self, micropost: &Micropost) -> StorageResult<Option<User>> {
        self.find_user(micropost.user_id)
    }

    fn save_checked(
        &mut self,
        kind: EntityKind,
        fields: &FieldValues,
        existing_id: Option<EntityId>,
    ) -> Result<EntityId, SaveError> {
        let field_violations = validate(kind, fields);
        if !field_violations.is_empty() {
            return Err(SaveError::Invalid(field_violations));
        }

        self.backend.begin()?;
        let outcome = self.save_in_transaction(kind, fields, existing_id);
        self.finish(outcome)
    }

    fn save_in_transaction(
        &mut self,
        kind: EntityKind,
        fields: &FieldValues,
        existing_id: Option<EntityId>,
    ) -> Result<EntityId, SaveError> {
        let mut violations = Vec::new();
        let mut record = fields.clone();
        for (field, target) in kind.references() {
            match self.resolve_reference(field, target, fields)? {
                // Canonical form keeps foreign-key lookups exact.
                Ok(id) => record.set(field, id.to_string()),
                Err(violation) => violations.push(violation),
            }
        }
        if !violations.is_empty() {
            return Err(SaveError::Invalid(violations));
        }

        match existing_id {
            None => Ok(self.backend.insert(kind, &record)?),
            Some(id) => {
                if !self.backend.exists(kind, id)? {
                    return Err(SaveError::NotFound(id));
                }
                self.backend.update(kind, id, &record)?;
                Ok(id)
            }
        }
    }

    /// Resolves one reference field to a persisted `target` id.
    ///
    /// Blank or non-uuid values are dangling without a backend lookup.
    fn resolve_reference(
        &self,
        field: &'static str,
        target: EntityKind,
        fields: &FieldValues,
    ) -> StorageResult<Result<EntityId, Violation>> {
        let raw = fields.get(field).unwrap_or_default();
        let dangling = || Violation::dangling_reference(field, raw);
        if is_blank(Some(raw)) {
            return Ok(Err(dangling()));
        }

        match Uuid::parse_str(raw) {
            Ok(id) if self.backend.exists(target, id)? => Ok(Ok(id)),
            _ => Ok(Err(dangling())),
        }
    }

    /// Returns `true` when dependents were cascaded away.
    fn delete_in_transaction(
        &mut self,
        kind: EntityKind,
        id: EntityId,
    ) -> Result<bool, DeleteError> {
        if !self.backend.exists(kind, id)? {
            return Err(DeleteError::NotFound(id));
        }

        let mut cascaded = false;
        if kind == EntityKind::User {
            let dependents = self.backend.find_by_foreign_key(
                EntityKind::Micropost,
                FIELD_USER_ID,
                &id.to_string(),
            )?;
            if !dependents.is_empty() {
                match self.config.delete_policy {
                    DeletePolicy::Reject => {
                        return Err(DeleteError::HasDependents {
                            id,
                            dependents: dependents.len(),
                        });
                    }
                    DeletePolicy::Cascade => {
                        for dependent in dependents {
                            self.backend.delete(EntityKind::Micropost, dependent)?;
                        }
                        cascaded = true;
                    }
                }
            }
        }

        self.backend.delete(kind, id)?;
        Ok(cascaded)
    }

    /// Commits on success and rolls back on any failure, including a failed
    /// commit. A rollback failure is logged; the original error is returned.
    fn finish<T, E>(&mut self, outcome: Result<T, E>) -> Result<T, E>
    where
        E: From<StorageError>,
    {
        let outcome = outcome.and_then(|value| match self.backend.commit() {
            Ok(()) => Ok(value),
            Err(err) => Err(E::from(err)),
        });
        if outcome.is_err() && self.backend.in_transaction() {
            if let Err(rollback_err) = self.backend.rollback() {
                warn!(
                    "event=tx_rollback module=store status=error error={}",
                    rollback_err
                );
            }
        }
        outcome
    }
}

fn decode_error(err: RecordDecodeError) -> StorageError {
    StorageError::InvalidData(err.to_string())
}

fn log_save_failure(kind: EntityKind, err: &SaveError) {
    match err {
        SaveError::Invalid(violations) => {
            let codes = violations
                .iter()
                .map(|violation| format!("{}:{}", violation.field(), violation.code()))
                .collect::<Vec<_>>();
            info!(
                "event=entity_save module=store status=rejected kind={} violations={}",
                kind,
                codes.join(",")
            );
        }
        SaveError::NotFound(id) => warn!(
            "event=entity_save module=store status=rejected kind={} id={} error_code=not_found",
            kind, id
        ),
        SaveError::Storage(storage_err) => warn!(
            "event=entity_save module=store status=error kind={} error={}",
            kind, storage_err
        ),
    }
}
