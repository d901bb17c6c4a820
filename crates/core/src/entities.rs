//! Entity kinds and entity-list normalisation.
//!
//! Annotations carry two entity lists: drugs and adverse events. This module
//! owns the rules every write path applies to those lists before they reach
//! the store, so the HTTP form, the JSON API and the importer agree on what a
//! valid entity list looks like.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Maximum length of a single entity name, in characters.
pub const MAX_ENTITY_NAME_LENGTH: usize = 500;

/// The two entity lists an annotation carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Drug,
    AdverseEvent,
}

impl EntityKind {
    /// Column / JSON field holding this list on an annotation.
    pub fn field_name(&self) -> &'static str {
        match self {
            Self::Drug => "drugs",
            Self::AdverseEvent => "adverse_events",
        }
    }

    /// Label used by the entity-span export format.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Drug => "DRUG",
            Self::AdverseEvent => "ADVERSE_EVENT",
        }
    }

    /// Table holding the suggestion vocabulary for this kind.
    pub fn vocabulary_table(&self) -> &'static str {
        match self {
            Self::Drug => "drug_list_entries",
            Self::AdverseEvent => "ade_list_entries",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.field_name())
    }
}

/// Split a comma-separated form value into a list of entity names.
///
/// Entries are trimmed and empty entries dropped, so `"a, ,b,"` yields
/// `["a", "b"]` and a blank string yields an empty list.
pub fn parse_entity_csv(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Render an entity list back into the comma-separated form value.
pub fn entities_to_csv(entities: &[String]) -> String {
    entities.join(", ")
}

/// Trim every entry and drop the ones that end up empty.
///
/// Used by the importer, which accepts whatever upstream extraction produced.
pub fn normalize_entity_list<I, S>(entities: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    entities
        .into_iter()
        .map(|s| s.as_ref().trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Reject values the store cannot hold: Postgres `TEXT` has no room for U+0000.
///
/// `field` names the value in the error message.
pub fn check_storable(field: &str, value: &str) -> Result<(), CoreError> {
    if value.contains('\0') {
        return Err(CoreError::Validation(format!(
            "{field} must not contain NUL characters"
        )));
    }
    Ok(())
}

/// Validate an entity list submitted through the JSON API.
///
/// Every entry must be non-empty after trimming, storable, and at most
/// [`MAX_ENTITY_NAME_LENGTH`] characters. Returns the trimmed list.
pub fn validate_entity_list(kind: EntityKind, entities: &[String]) -> Result<Vec<String>, CoreError> {
    entities
        .iter()
        .enumerate()
        .map(|(i, raw)| {
            let name = raw.trim();
            if name.is_empty() {
                return Err(CoreError::Validation(format!(
                    "{}[{i}] must not be empty",
                    kind.field_name()
                )));
            }
            check_storable(&format!("{}[{i}]", kind.field_name()), name)?;
            if name.chars().count() > MAX_ENTITY_NAME_LENGTH {
                return Err(CoreError::Validation(format!(
                    "{}[{i}] exceeds {MAX_ENTITY_NAME_LENGTH} characters",
                    kind.field_name()
                )));
            }
            Ok(name.to_string())
        })
        .collect()
}
