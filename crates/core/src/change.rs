//! Change-tracking vocabulary and pure change planning.
//!
//! A save that alters an entity list produces one change event per added or
//! removed entity. Each event carries the full before/after snapshot of the
//! field it belongs to, not just the delta. The persistence side lives in
//! `annotator_db::repositories::AnnotationChangeRepo`; everything here is
//! I/O free.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::differ::diff_entity_lists;
use crate::entities::EntityKind;
use crate::error::CoreError;
use crate::types::Timestamp;

// ---------------------------------------------------------------------------
// Change type
// ---------------------------------------------------------------------------

/// Kind of a recorded change event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    DrugAdded,
    DrugRemoved,
    EventAdded,
    EventRemoved,
    BulkUpdate,
}

impl ChangeType {
    /// Every change type, in report order.
    pub const ALL: [ChangeType; 5] = [
        Self::DrugAdded,
        Self::DrugRemoved,
        Self::EventAdded,
        Self::EventRemoved,
        Self::BulkUpdate,
    ];

    /// String representation for display, logging, and database storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DrugAdded => "drug_added",
            Self::DrugRemoved => "drug_removed",
            Self::EventAdded => "event_added",
            Self::EventRemoved => "event_removed",
            Self::BulkUpdate => "bulk_update",
        }
    }

    /// Human-readable label used in reports.
    pub fn label(&self) -> &'static str {
        match self {
            Self::DrugAdded => "Drug Added",
            Self::DrugRemoved => "Drug Removed",
            Self::EventAdded => "Adverse Event Added",
            Self::EventRemoved => "Adverse Event Removed",
            Self::BulkUpdate => "Bulk Update",
        }
    }

    /// Change type recorded when an entity of `kind` is added.
    pub fn added(kind: EntityKind) -> Self {
        match kind {
            EntityKind::Drug => Self::DrugAdded,
            EntityKind::AdverseEvent => Self::EventAdded,
        }
    }

    /// Change type recorded when an entity of `kind` is removed.
    pub fn removed(kind: EntityKind) -> Self {
        match kind {
            EntityKind::Drug => Self::DrugRemoved,
            EntityKind::AdverseEvent => Self::EventRemoved,
        }
    }

    /// The entity list this change type refers to, if any.
    pub fn entity_kind(&self) -> Option<EntityKind> {
        match self {
            Self::DrugAdded | Self::DrugRemoved => Some(EntityKind::Drug),
            Self::EventAdded | Self::EventRemoved => Some(EntityKind::AdverseEvent),
            Self::BulkUpdate => None,
        }
    }

    pub fn is_addition(&self) -> bool {
        matches!(self, Self::DrugAdded | Self::EventAdded)
    }

    pub fn is_removal(&self) -> bool {
        matches!(self, Self::DrugRemoved | Self::EventRemoved)
    }
}

impl std::fmt::Display for ChangeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChangeType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| {
                let valid: Vec<&str> = Self::ALL.iter().map(|t| t.as_str()).collect();
                CoreError::Validation(format!(
                    "Invalid change type '{s}'. Must be one of: {}",
                    valid.join(", ")
                ))
            })
    }
}

/// Lets `sqlx::FromRow` decode the text column via `#[sqlx(try_from = "String")]`.
impl TryFrom<String> for ChangeType {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

// ---------------------------------------------------------------------------
// Change planning
// ---------------------------------------------------------------------------

/// A change event that has been computed but not yet persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PendingChange {
    pub change_type: ChangeType,
    pub field_name: String,
    /// The single added/removed entity; `None` only for bulk updates.
    pub entity_name: Option<String>,
    /// Snapshot of the whole field before the save.
    pub old_value: serde_json::Value,
    /// Snapshot of the whole field after the save.
    pub new_value: serde_json::Value,
}

impl PendingChange {
    /// A single entity addition or removal.
    ///
    /// The field is derived from `change_type`; `BulkUpdate` is rejected
    /// because it carries no entity.
    pub fn entity(
        change_type: ChangeType,
        entity_name: &str,
        old: &[String],
        new: &[String],
    ) -> Result<Self, CoreError> {
        let kind = change_type.entity_kind().ok_or_else(|| {
            CoreError::Validation(format!("{change_type} does not refer to a single entity"))
        })?;
        if entity_name.trim().is_empty() {
            return Err(CoreError::Validation(
                "entity name must not be empty".to_string(),
            ));
        }
        Ok(Self::for_kind(change_type, kind, entity_name, old, new))
    }

    fn for_kind(
        change_type: ChangeType,
        kind: EntityKind,
        entity_name: &str,
        old: &[String],
        new: &[String],
    ) -> Self {
        Self {
            change_type,
            field_name: kind.field_name().to_string(),
            entity_name: Some(entity_name.to_string()),
            old_value: serde_json::json!(old),
            new_value: serde_json::json!(new),
        }
    }

    /// A whole-field update with no single entity attached.
    pub fn bulk_update(
        field_name: &str,
        old_value: serde_json::Value,
        new_value: serde_json::Value,
    ) -> Self {
        Self {
            change_type: ChangeType::BulkUpdate,
            field_name: field_name.to_string(),
            entity_name: None,
            old_value,
            new_value,
        }
    }
}

/// Plan the change events for one entity list going from `old` to `new`.
///
/// Additions come first (in new-list order), then removals (in old-list
/// order). Every event shares the same before/after snapshot.
pub fn plan_entity_changes(kind: EntityKind, old: &[String], new: &[String]) -> Vec<PendingChange> {
    let diff = diff_entity_lists(old, new);
    let added = diff
        .added
        .iter()
        .map(|name| PendingChange::for_kind(ChangeType::added(kind), kind, name, old, new));
    let removed = diff
        .removed
        .iter()
        .map(|name| PendingChange::for_kind(ChangeType::removed(kind), kind, name, old, new));
    added.chain(removed).collect()
}

/// Before/after entity lists of one annotation save.
#[derive(Debug, Clone, Copy)]
pub struct EntitySnapshots<'a> {
    pub old_drugs: &'a [String],
    pub new_drugs: &'a [String],
    pub old_events: &'a [String],
    pub new_events: &'a [String],
}

/// Plan every change event for one annotation save: drugs first, then
/// adverse events.
pub fn plan_annotation_changes(snapshots: EntitySnapshots<'_>) -> Vec<PendingChange> {
    let mut changes = plan_entity_changes(EntityKind::Drug, snapshots.old_drugs, snapshots.new_drugs);
    changes.extend(plan_entity_changes(
        EntityKind::AdverseEvent,
        snapshots.old_events,
        snapshots.new_events,
    ));
    changes
}

// ---------------------------------------------------------------------------
// Aggregates
// ---------------------------------------------------------------------------

/// Per-annotation change counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSummary {
    pub drug_additions: i64,
    pub drug_removals: i64,
    pub event_additions: i64,
    pub event_removals: i64,
    pub bulk_updates: i64,
    pub total_changes: i64,
    /// Timestamp of the most recent event, `None` if there are none.
    pub last_change: Option<Timestamp>,
}

impl ChangeSummary {
    /// Build a summary from `(change_type, count)` tallies.
    pub fn from_counts<I>(counts: I, last_change: Option<Timestamp>) -> Self
    where
        I: IntoIterator<Item = (ChangeType, i64)>,
    {
        let mut summary = Self {
            last_change,
            ..Self::default()
        };
        for (change_type, count) in counts {
            match change_type {
                ChangeType::DrugAdded => summary.drug_additions += count,
                ChangeType::DrugRemoved => summary.drug_removals += count,
                ChangeType::EventAdded => summary.event_additions += count,
                ChangeType::EventRemoved => summary.event_removals += count,
                ChangeType::BulkUpdate => summary.bulk_updates += count,
            }
            summary.total_changes += count;
        }
        summary
    }

    /// Collapse into the export-level statistics block.
    pub fn statistics(&self) -> ChangeStatistics {
        ChangeStatistics {
            total_changes: self.total_changes,
            additions: self.drug_additions + self.event_additions,
            removals: self.drug_removals + self.event_removals,
        }
    }
}

/// Totals plus the additions/removals aggregate attached to exports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeStatistics {
    pub total_changes: i64,
    pub additions: i64,
    pub removals: i64,
}
