//! Entity kinds, identifiers and field maps.
//!
//! # Responsibility
//! - Define the closed set of entity kinds and their storage shape.
//! - Provide typed `User` / `Micropost` records over the untyped field map.
//!
//! # Invariants
//! - `EntityId` is assigned by the backend on insert and never reassigned.
//! - `id == None` on a typed record means the entity is still transient.
//! - Field order in `EntityKind::fields()` is the storage column order.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier for users and microposts.
pub type EntityId = Uuid;

/// Field name of the user display name.
pub const FIELD_NAME: &str = "name";
/// Field name of the user email address.
pub const FIELD_EMAIL: &str = "email";
/// Field name of the micropost owner reference.
pub const FIELD_USER_ID: &str = "user_id";
/// Field name of the micropost body.
pub const FIELD_CONTENT: &str = "content";

const USER_FIELDS: &[&str] = &[FIELD_NAME, FIELD_EMAIL];
const MICROPOST_FIELDS: &[&str] = &[FIELD_USER_ID, FIELD_CONTENT];

/// Closed set of persisted entity kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// Account owning zero or more microposts.
    User,
    /// Short text post referencing one user.
    Micropost,
}

impl EntityKind {
    /// Storage table backing this kind.
    pub fn table(self) -> &'static str {
        match self {
            Self::User => "users",
            Self::Micropost => "microposts",
        }
    }

    /// Persisted fields for this kind, excluding `id`.
    pub fn fields(self) -> &'static [&'static str] {
        match self {
            Self::User => USER_FIELDS,
            Self::Micropost => MICROPOST_FIELDS,
        }
    }

    /// Stable lowercase label used in logs and messages.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Micropost => "micropost",
        }
    }
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Candidate or persisted field values keyed by field name.
///
/// Absent keys are treated as empty by validation. Keys outside
/// `EntityKind::fields()` are carried but never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldValues(BTreeMap<String, String>);

impl FieldValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(field, value);
        self
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<String>) {
        self.0.insert(field.into(), value.into());
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns only the fields persisted for `kind`, in column order.
    ///
    /// Absent fields are reported as empty strings.
    pub fn persisted_for(&self, kind: EntityKind) -> Vec<(&'static str, &str)> {
        kind.fields()
            .iter()
            .map(|field| (*field, self.get(field).unwrap_or("")))
            .collect()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FieldValues {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

/// Error raised when persisted field values cannot form a typed record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordDecodeError {
    MissingField {
        kind: EntityKind,
        field: &'static str,
    },
    InvalidReference {
        field: &'static str,
        value: String,
    },
}

impl Display for RecordDecodeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingField { kind, field } => {
                write!(f, "{kind} record is missing field `{field}`")
            }
            Self::InvalidReference { field, value } => {
                write!(f, "field `{field}` holds a non-uuid reference `{value}`")
            }
        }
    }
}

impl Error for RecordDecodeError {}

/// Typed user record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// `None` until the store persists the user.
    pub id: Option<EntityId>,
    pub name: String,
    pub email: String,
}

impl User {
    /// Creates a transient user.
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            email: email.into(),
        }
    }

    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }

    pub fn to_fields(&self) -> FieldValues {
        FieldValues::new()
            .with(FIELD_NAME, self.name.as_str())
            .with(FIELD_EMAIL, self.email.as_str())
    }

    pub fn from_fields(id: EntityId, fields: &FieldValues) -> Result<Self, RecordDecodeError> {
        Ok(Self {
            id: Some(id),
            name: required(EntityKind::User, fields, FIELD_NAME)?.to_string(),
            email: required(EntityKind::User, fields, FIELD_EMAIL)?.to_string(),
        })
    }
}

/// Typed micropost record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Micropost {
    /// `None` until the store persists the micropost.
    pub id: Option<EntityId>,
    /// Owning user reference.
    pub user_id: EntityId,
    pub content: String,
}

impl Micropost {
    /// Creates a transient micropost for `user_id`.
    pub fn new(user_id: EntityId, content: impl Into<String>) -> Self {
        Self {
            id: None,
            user_id,
            content: content.into(),
        }
    }

    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }

    pub fn to_fields(&self) -> FieldValues {
        FieldValues::new()
            .with(FIELD_USER_ID, self.user_id.to_string())
            .with(FIELD_CONTENT, self.content.as_str())
    }

    pub fn from_fields(id: EntityId, fields: &FieldValues) -> Result<Self, RecordDecodeError> {
        let raw_user_id = required(EntityKind::Micropost, fields, FIELD_USER_ID)?;
        let user_id =
            Uuid::parse_str(raw_user_id).map_err(|_| RecordDecodeError::InvalidReference {
                field: FIELD_USER_ID,
                value: raw_user_id.to_string(),
            })?;

        Ok(Self {
            id: Some(id),
            user_id,
            content: required(EntityKind::Micropost, fields, FIELD_CONTENT)?.to_string(),
        })
    }
}

fn required<'a>(
    kind: EntityKind,
    fields: &'a FieldValues,
    field: &'static str,
) -> Result<&'a str, RecordDecodeError> {
    fields
        .get(field)
        .ok_or(RecordDecodeError::MissingField { kind, field })
}
