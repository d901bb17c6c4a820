//! Annotation entity models and DTOs.

use std::str::FromStr;

use annotator_core::error::CoreError;
use annotator_core::jsonl::FlatRecord;
use annotator_core::stats::AnnotationFacts;
use annotator_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::models::change::AnnotationChange;

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// A row from the `annotations` table.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct Annotation {
    pub id: DbId,
    pub text: String,
    pub drugs: Vec<String>,
    pub adverse_events: Vec<String>,
    pub is_validated: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Annotation {
    /// View used by corpus statistics.
    pub fn facts(&self) -> AnnotationFacts<'_> {
        AnnotationFacts {
            drugs: &self.drugs,
            adverse_events: &self.adverse_events,
            is_validated: self.is_validated,
        }
    }

    /// Flat export record including timestamps.
    pub fn to_flat_record(&self) -> FlatRecord {
        FlatRecord {
            text: self.text.clone(),
            drugs: self.drugs.clone(),
            adverse_events: self.adverse_events.clone(),
            is_validated: Some(self.is_validated),
            created_at: Some(self.created_at),
            updated_at: Some(self.updated_at),
        }
    }
}

// ---------------------------------------------------------------------------
// DTOs
// ---------------------------------------------------------------------------

/// DTO for creating a new annotation.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateAnnotation {
    pub text: String,
    #[serde(default)]
    pub drugs: Vec<String>,
    #[serde(default)]
    pub adverse_events: Vec<String>,
    pub is_validated: Option<bool>,
}

/// DTO for saving an annotation. Absent fields keep their current value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateAnnotation {
    pub text: Option<String>,
    pub drugs: Option<Vec<String>>,
    pub adverse_events: Option<Vec<String>>,
    pub is_validated: Option<bool>,
}

/// Result of [`AnnotationRepo::save_with_changes`](crate::repositories::AnnotationRepo::save_with_changes).
#[derive(Debug, Clone, Serialize)]
pub struct SavedAnnotation {
    pub annotation: Annotation,
    /// Change events written by this save, in insertion order.
    pub changes: Vec<AnnotationChange>,
}

// ---------------------------------------------------------------------------
// Listing
// ---------------------------------------------------------------------------

/// Validation state filter for the review list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    Validated,
    Unvalidated,
}

impl ValidationStatus {
    pub fn as_bool(&self) -> bool {
        matches!(self, Self::Validated)
    }
}

impl FromStr for ValidationStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "validated" => Ok(Self::Validated),
            "unvalidated" => Ok(Self::Unvalidated),
            other => Err(CoreError::Validation(format!(
                "Invalid status '{other}'. Must be one of: validated, unvalidated"
            ))),
        }
    }
}

/// Filter for listing and counting annotations.
#[derive(Debug, Clone, Default)]
pub struct AnnotationFilter {
    /// Case-insensitive substring match on the text.
    pub search: Option<String>,
    pub status: Option<ValidationStatus>,
}

/// Previous and next annotation by id.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AnnotationNeighbors {
    pub previous: Option<Annotation>,
    pub next: Option<Annotation>,
}

/// Validation counters over the whole corpus.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, FromRow, Serialize)]
pub struct AnnotationCounts {
    pub total: i64,
    pub validated: i64,
    pub unvalidated: i64,
}

/// Outcome of a bulk import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportOutcome {
    pub imported: u64,
    /// Annotations removed before importing (`clear_existing`).
    pub cleared: u64,
}
