//! Vocabulary list entries (`drug_list_entries`, `ade_list_entries`).

use annotator_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// One uploaded vocabulary name. Both tables share this shape.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct VocabularyEntry {
    pub id: DbId,
    pub name: String,
    pub created_at: Timestamp,
}
