//! Field rule tables and pure validation.
//!
//! # Responsibility
//! - Declare per-kind rules in evaluation order.
//! - Evaluate field rules without touching storage.
//!
//! # Invariants
//! - Every rule runs; violations are collected, never short-circuited.
//! - Violation order follows rule declaration order.
//! - `Rule::References` is declared here but resolved by the entity store.

use crate::model::entity::{
    EntityKind, FieldValues, FIELD_CONTENT, FIELD_EMAIL, FIELD_NAME, FIELD_USER_ID,
};
use serde::Serialize;
use std::fmt::{Display, Formatter};

/// Upper bound for micropost content, in characters.
pub const MICROPOST_CONTENT_MAX_CHARS: usize = 140;

/// One declarative field rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    /// Field must be present and not blank.
    Presence(&'static str),
    /// Field must not exceed the given number of characters.
    MaxLength(&'static str, usize),
    /// Field must hold the id of a persisted entity of `target` kind.
    References {
        field: &'static str,
        target: EntityKind,
    },
}

const USER_RULES: &[Rule] = &[Rule::Presence(FIELD_NAME), Rule::Presence(FIELD_EMAIL)];

const MICROPOST_RULES: &[Rule] = &[
    Rule::Presence(FIELD_CONTENT),
    Rule::MaxLength(FIELD_CONTENT, MICROPOST_CONTENT_MAX_CHARS),
    Rule::References {
        field: FIELD_USER_ID,
        target: EntityKind::User,
    },
];

impl EntityKind {
    /// Rule table for this kind, in evaluation order.
    pub fn rules(self) -> &'static [Rule] {
        match self {
            Self::User => USER_RULES,
            Self::Micropost => MICROPOST_RULES,
        }
    }

    /// Reference rules for this kind as `(field, target)` pairs.
    pub fn references(self) -> impl Iterator<Item = (&'static str, EntityKind)> {
        self.rules().iter().filter_map(|rule| match rule {
            Rule::References { field, target } => Some((*field, *target)),
            _ => None,
        })
    }
}

/// Recoverable rule failure that blocks a write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum Violation {
    /// Field is absent, empty or whitespace-only.
    EmptyField { field: String },
    /// Field exceeds `max` characters.
    TooLong { field: String, max: usize },
    /// Reference value does not resolve to a persisted row.
    DanglingReference { field: String, value: String },
}

impl Violation {
    pub fn empty_field(field: &str) -> Self {
        Self::EmptyField {
            field: field.to_string(),
        }
    }

    pub fn too_long(field: &str, max: usize) -> Self {
        Self::TooLong {
            field: field.to_string(),
            max,
        }
    }

    pub fn dangling_reference(field: &str, value: impl Into<String>) -> Self {
        Self::DanglingReference {
            field: field.to_string(),
            value: value.into(),
        }
    }

    /// Field the violation is reported against.
    pub fn field(&self) -> &str {
        match self {
            Self::EmptyField { field }
            | Self::TooLong { field, .. }
            | Self::DanglingReference { field, .. } => field,
        }
    }

    /// Stable machine-readable code, safe for logs.
    pub fn code(&self) -> &'static str {
        match self {
            Self::EmptyField { .. } => "empty_field",
            Self::TooLong { .. } => "too_long",
            Self::DanglingReference { .. } => "dangling_reference",
        }
    }
}

impl Display for Violation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyField { field } => write!(f, "{field} can't be blank"),
            Self::TooLong { field, max } => {
                write!(f, "{field} is too long (maximum is {max} characters)")
            }
            Self::DanglingReference { field, value } => {
                write!(f, "{field} `{value}` must reference an existing record")
            }
        }
    }
}

/// Evaluates all storage-independent rules of `kind` against `fields`.
///
/// Returns an empty vector when the candidate is valid.
pub fn validate(kind: EntityKind, fields: &FieldValues) -> Vec<Violation> {
    kind.rules()
        .iter()
        .filter_map(|rule| check_rule(*rule, fields))
        .collect()
}

fn check_rule(rule: Rule, fields: &FieldValues) -> Option<Violation> {
    match rule {
        Rule::Presence(field) => {
            is_blank(fields.get(field)).then(|| Violation::empty_field(field))
        }
        Rule::MaxLength(field, max) => {
            let length = fields.get(field).map_or(0, |value| value.chars().count());
            (length > max).then(|| Violation::too_long(field, max))
        }
        Rule::References { .. } => None,
    }
}

/// Blank means absent, empty or whitespace-only.
pub(crate) fn is_blank(value: Option<&str>) -> bool {
    value.map_or(true, |text| text.trim().is_empty())
}
