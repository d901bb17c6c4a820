//! Handlers for the editor's suggestion vocabularies.

use annotator_core::entities::EntityKind;
use annotator_core::vocabulary::{merge_suggestions, parse_vocabulary_upload, EntitySuggestions};
use annotator_db::repositories::{AnnotationRepo, VocabularyRepo};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// Outcome of a vocabulary upload.
#[derive(Debug, Serialize)]
pub struct VocabularyUploadResult {
    /// Distinct names found in the upload.
    pub received: usize,
    /// Names that were not already in the vocabulary.
    pub added: u64,
}

/// GET /api/v1/vocabulary/suggestions
///
/// Uploaded vocabulary merged with every name already used in the corpus.
pub async fn suggestions(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let drugs = suggestions_for(&state, EntityKind::Drug).await?;
    let adverse_events = suggestions_for(&state, EntityKind::AdverseEvent).await?;

    Ok(Json(DataResponse {
        data: EntitySuggestions {
            drugs,
            adverse_events,
        },
    }))
}

/// POST /api/v1/vocabulary/drugs
///
/// Body is a JSON array of names or plain text with one name per line.
pub async fn upload_drugs(
    State(state): State<AppState>,
    body: String,
) -> AppResult<impl IntoResponse> {
    upload(&state, EntityKind::Drug, &body).await
}

/// POST /api/v1/vocabulary/adverse-events
pub async fn upload_adverse_events(
    State(state): State<AppState>,
    body: String,
) -> AppResult<impl IntoResponse> {
    upload(&state, EntityKind::AdverseEvent, &body).await
}

async fn suggestions_for(state: &AppState, kind: EntityKind) -> AppResult<Vec<String>> {
    let vocabulary = VocabularyRepo::list_names(&state.pool, kind).await?;
    let observed = AnnotationRepo::observed_entity_names(&state.pool, kind).await?;
    Ok(merge_suggestions(vocabulary, observed))
}

async fn upload(
    state: &AppState,
    kind: EntityKind,
    body: &str,
) -> AppResult<Json<DataResponse<VocabularyUploadResult>>> {
    let names = parse_vocabulary_upload(body);
    if names.is_empty() {
        return Err(AppError::BadRequest(format!(
            "No {} names found in upload",
            kind.label()
        )));
    }

    let added = VocabularyRepo::insert_names(&state.pool, kind, &names).await?;

    tracing::info!(kind = %kind, received = names.len(), added, "Vocabulary uploaded");

    Ok(Json(DataResponse {
        data: VocabularyUploadResult {
            received: names.len(),
            added,
        },
    }))
}
