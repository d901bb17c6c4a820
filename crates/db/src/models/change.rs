//! Change-log models. Change rows are append-only (no `updated_at`).

use annotator_core::change::ChangeType;
use annotator_core::jsonl::ExportedChange;
use annotator_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// A row from the `annotation_changes` table.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct AnnotationChange {
    pub id: DbId,
    pub annotation_id: DbId,
    #[sqlx(try_from = "String")]
    pub change_type: ChangeType,
    pub field_name: String,
    pub entity_name: Option<String>,
    pub old_value: Option<serde_json::Value>,
    pub new_value: Option<serde_json::Value>,
    pub timestamp: Timestamp,
    pub session_id: Option<String>,
}

impl AnnotationChange {
    /// Shape used in enriched export lines.
    pub fn to_exported(&self) -> ExportedChange {
        ExportedChange {
            change_type: self.change_type,
            field_name: self.field_name.clone(),
            entity_name: self.entity_name.clone(),
            old_value: self.old_value.clone().unwrap_or(serde_json::Value::Null),
            new_value: self.new_value.clone().unwrap_or(serde_json::Value::Null),
            timestamp: self.timestamp,
            session_id: self.session_id.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Query parameters
// ---------------------------------------------------------------------------

/// Composable filter for change listings. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChangeQuery {
    pub annotation_id: Option<DbId>,
    pub change_type: Option<ChangeType>,
    /// Only changes at or after this instant.
    pub since: Option<Timestamp>,
    pub session_id: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

// ---------------------------------------------------------------------------
// Aggregates
// ---------------------------------------------------------------------------

/// Number of changes of one type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeTypeCount {
    pub change_type: ChangeType,
    pub count: i64,
}

/// Edit volume of one session.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct SessionActivity {
    pub session_id: String,
    pub change_count: i64,
}

/// Edit volume of one annotation.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct AnnotationActivity {
    pub annotation_id: DbId,
    pub change_count: i64,
    pub last_change: Timestamp,
}

/// Edit-activity report over changes matching a [`ChangeQuery`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeReport {
    pub total_changes: i64,
    /// One entry per change type, zero counts included, in declaration order.
    pub by_type: Vec<ChangeTypeCount>,
    pub recent: Vec<AnnotationChange>,
    /// Empty when the report is scoped to one annotation or session.
    pub top_sessions: Vec<SessionActivity>,
    /// Empty when the report is scoped to one annotation.
    pub most_active_annotations: Vec<AnnotationActivity>,
}
