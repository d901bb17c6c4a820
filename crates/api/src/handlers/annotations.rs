//! Handlers for the annotation review workflow.
//!
//! Saving an annotation diffs its entity lists against the stored version and
//! writes one change event per added or removed entity, in the same
//! transaction as the update.

use annotator_core::entities::{check_storable, parse_entity_csv, validate_entity_list, EntityKind};
use annotator_core::error::CoreError;
use annotator_core::highlight::highlight_entities;
use annotator_core::paging::{clamp_limit, PageInfo, MAX_PAGE_SIZE};
use annotator_core::types::DbId;
use annotator_db::models::annotation::{
    Annotation, AnnotationCounts, AnnotationFilter, CreateAnnotation, UpdateAnnotation,
    ValidationStatus,
};
use annotator_db::models::change::AnnotationChange;
use annotator_db::repositories::AnnotationRepo;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::middleware::session::SessionId;
use crate::query::{empty_as_none, parse_optional};
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Query parameters for `GET /annotations`.
#[derive(Debug, Deserialize)]
pub struct AnnotationListParams {
    #[serde(default, deserialize_with = "empty_as_none")]
    pub search: Option<String>,
    /// `validated` or `unvalidated`; empty means all.
    #[serde(default, deserialize_with = "empty_as_none")]
    pub status: Option<String>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// One page of the review list.
#[derive(Debug, Serialize)]
pub struct AnnotationPage {
    pub items: Vec<Annotation>,
    pub page: PageInfo,
    /// Corpus-wide counters, independent of the filter.
    pub counts: AnnotationCounts,
}

/// An entity list submitted either as a JSON array or as the
/// comma-separated string used by the editor form.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum EntityListInput {
    List(Vec<String>),
    Csv(String),
}

impl EntityListInput {
    /// Trim, drop blank CSV entries and enforce the entity name rules.
    pub fn validate(&self, kind: EntityKind) -> Result<Vec<String>, CoreError> {
        match self {
            Self::List(names) => validate_entity_list(kind, names),
            Self::Csv(raw) => validate_entity_list(kind, &parse_entity_csv(raw)),
        }
    }
}

/// Body of `POST /annotations`.
#[derive(Debug, Deserialize)]
pub struct CreateAnnotationRequest {
    pub text: String,
    pub drugs: Option<EntityListInput>,
    pub adverse_events: Option<EntityListInput>,
    pub is_validated: Option<bool>,
}

/// Body of `PUT /annotations/{id}`. Absent fields keep their stored value;
/// a blank `text` is treated as absent.
#[derive(Debug, Default, Deserialize)]
pub struct SaveAnnotationRequest {
    pub text: Option<String>,
    pub drugs: Option<EntityListInput>,
    pub adverse_events: Option<EntityListInput>,
    pub is_validated: Option<bool>,
}

/// Body of `POST /annotations/validation`.
#[derive(Debug, Deserialize)]
pub struct BulkValidationRequest {
    pub ids: Vec<DbId>,
    pub is_validated: bool,
}

#[derive(Debug, Serialize)]
pub struct BulkValidationResult {
    pub updated: u64,
}

/// An annotation as shown in the editor.
#[derive(Debug, Serialize)]
pub struct AnnotationView {
    #[serde(flatten)]
    pub annotation: Annotation,
    pub previous_id: Option<DbId>,
    pub next_id: Option<DbId>,
    /// Text with drug and adverse-event mentions wrapped in markup.
    pub highlighted_text: String,
}

/// Result of saving an annotation.
#[derive(Debug, Serialize)]
pub struct SaveResult {
    pub annotation: Annotation,
    /// Change events written by this save.
    pub changes: Vec<AnnotationChange>,
    /// Where "save and next" goes; `None` on the last annotation.
    pub next_id: Option<DbId>,
}

// ---------------------------------------------------------------------------
// Listing
// ---------------------------------------------------------------------------

/// GET /api/v1/annotations
///
/// Paginated review list with optional text search and validation filter.
pub async fn list_annotations(
    State(state): State<AppState>,
    Query(params): Query<AnnotationListParams>,
) -> AppResult<impl IntoResponse> {
    let status = parse_optional::<ValidationStatus>(params.status.as_deref())?;
    let filter = AnnotationFilter {
        search: params.search,
        status,
    };

    let per_page = clamp_limit(params.per_page, state.config.page_size, MAX_PAGE_SIZE);
    let total = AnnotationRepo::count(&state.pool, &filter).await?;
    let page = PageInfo::resolve(params.page, per_page, total);

    let items =
        AnnotationRepo::list_page(&state.pool, &filter, page.per_page, page.offset()).await?;
    let counts = AnnotationRepo::counts(&state.pool).await?;

    Ok(Json(DataResponse {
        data: AnnotationPage {
            items,
            page,
            counts,
        },
    }))
}

/// GET /api/v1/annotations/start
///
/// Where a review session begins: the first unvalidated annotation, or the
/// first annotation when everything is validated. `null` on an empty corpus.
pub async fn start_annotation(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let annotation = match AnnotationRepo::first_unvalidated(&state.pool).await? {
        Some(a) => Some(a),
        None => AnnotationRepo::first(&state.pool).await?,
    };

    let view = match annotation {
        Some(a) => Some(build_view(&state, a).await?),
        None => None,
    };

    Ok(Json(DataResponse { data: view }))
}

// ---------------------------------------------------------------------------
// Single annotation
// ---------------------------------------------------------------------------

/// POST /api/v1/annotations
pub async fn create_annotation(
    State(state): State<AppState>,
    Json(input): Json<CreateAnnotationRequest>,
) -> AppResult<impl IntoResponse> {
    if input.text.trim().is_empty() {
        return Err(AppError::Core(CoreError::Validation(
            "text must not be empty".into(),
        )));
    }
    check_storable("text", &input.text)?;

    let create = CreateAnnotation {
        text: input.text,
        drugs: validate_optional(input.drugs.as_ref(), EntityKind::Drug)?.unwrap_or_default(),
        adverse_events: validate_optional(input.adverse_events.as_ref(), EntityKind::AdverseEvent)?
            .unwrap_or_default(),
        is_validated: input.is_validated,
    };

    let annotation = AnnotationRepo::create(&state.pool, &create).await?;

    tracing::info!(annotation_id = annotation.id, "Annotation created");

    Ok((StatusCode::CREATED, Json(DataResponse { data: annotation })))
}

/// GET /api/v1/annotations/{id}
pub async fn get_annotation(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let annotation = find_annotation(&state, id).await?;
    let view = build_view(&state, annotation).await?;

    Ok(Json(DataResponse { data: view }))
}

/// PUT /api/v1/annotations/{id}
///
/// Save edits. Every entity added or removed is logged as its own change
/// event, tagged with the `x-session-id` header when present.
pub async fn save_annotation(
    session: SessionId,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<SaveAnnotationRequest>,
) -> AppResult<impl IntoResponse> {
    let text = input.text.filter(|t| !t.trim().is_empty());
    if let Some(text) = &text {
        check_storable("text", text)?;
    }
    let update = UpdateAnnotation {
        text,
        drugs: validate_optional(input.drugs.as_ref(), EntityKind::Drug)?,
        adverse_events: validate_optional(input.adverse_events.as_ref(), EntityKind::AdverseEvent)?,
        is_validated: input.is_validated,
    };

    let saved = AnnotationRepo::save_with_changes(&state.pool, id, &update, session.as_deref())
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Annotation",
            id,
        }))?;

    let next_id = AnnotationRepo::neighbors(&state.pool, id)
        .await?
        .next
        .map(|a| a.id);

    tracing::info!(
        annotation_id = id,
        changes = saved.changes.len(),
        session_id = ?session.as_deref(),
        "Annotation saved",
    );

    Ok(Json(DataResponse {
        data: SaveResult {
            annotation: saved.annotation,
            changes: saved.changes,
            next_id,
        },
    }))
}

/// DELETE /api/v1/annotations/{id}
///
/// Removes the annotation and its change history.
pub async fn delete_annotation(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let deleted = AnnotationRepo::delete(&state.pool, id).await?;

    if !deleted {
        return Err(AppError::Core(CoreError::NotFound {
            entity: "Annotation",
            id,
        }));
    }

    tracing::info!(annotation_id = id, "Annotation deleted");

    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/annotations/validation
///
/// Mark several annotations validated or unvalidated. Unknown ids are
/// ignored; the response reports how many rows changed.
pub async fn set_validation(
    State(state): State<AppState>,
    Json(input): Json<BulkValidationRequest>,
) -> AppResult<impl IntoResponse> {
    if input.ids.is_empty() {
        return Err(AppError::BadRequest("ids must not be empty".into()));
    }

    let updated =
        AnnotationRepo::set_validated_bulk(&state.pool, &input.ids, input.is_validated).await?;

    tracing::info!(
        requested = input.ids.len(),
        updated,
        is_validated = input.is_validated,
        "Bulk validation applied",
    );

    Ok(Json(DataResponse {
        data: BulkValidationResult { updated },
    }))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

pub(crate) async fn find_annotation(state: &AppState, id: DbId) -> AppResult<Annotation> {
    AnnotationRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Annotation",
            id,
        }))
}

async fn build_view(state: &AppState, annotation: Annotation) -> AppResult<AnnotationView> {
    let neighbors = AnnotationRepo::neighbors(&state.pool, annotation.id).await?;
    let highlighted_text = highlight_entities(
        &annotation.text,
        &annotation.drugs,
        &annotation.adverse_events,
    )?;

    Ok(AnnotationView {
        previous_id: neighbors.previous.map(|a| a.id),
        next_id: neighbors.next.map(|a| a.id),
        highlighted_text,
        annotation,
    })
}

fn validate_optional(
    input: Option<&EntityListInput>,
    kind: EntityKind,
) -> Result<Option<Vec<String>>, CoreError> {
    input.map(|list| list.validate(kind)).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn entity_list_accepts_array_or_csv() {
        let list: EntityListInput = serde_json::from_str(r#"[" aspirin ", "ibuprofen"]"#).unwrap();
        assert_eq!(
            list.validate(EntityKind::Drug).unwrap(),
            vec!["aspirin".to_string(), "ibuprofen".to_string()]
        );

        let csv: EntityListInput = serde_json::from_str(r#""aspirin, ,ibuprofen,""#).unwrap();
        assert_eq!(
            csv.validate(EntityKind::Drug).unwrap(),
            vec!["aspirin".to_string(), "ibuprofen".to_string()]
        );
    }

    #[test]
    fn blank_array_entry_is_rejected() {
        let list: EntityListInput = serde_json::from_str(r#"["aspirin", "  "]"#).unwrap();
        assert_matches!(
            list.validate(EntityKind::Drug),
            Err(CoreError::Validation(_))
        );
    }

    #[test]
    fn nul_in_csv_entry_is_rejected() {
        let csv = EntityListInput::Csv("aspirin, nau\0sea".into());
        assert_matches!(
            csv.validate(EntityKind::AdverseEvent),
            Err(CoreError::Validation(msg)) if msg.contains("NUL")
        );
    }

    #[test]
    fn absent_list_stays_absent() {
        assert_eq!(validate_optional(None, EntityKind::AdverseEvent).unwrap(), None);
    }
}
