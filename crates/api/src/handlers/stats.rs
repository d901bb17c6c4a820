//! Handler for corpus statistics.

use annotator_core::stats::CorpusStats;
use annotator_db::models::change::ChangeQuery;
use annotator_db::repositories::{AnnotationChangeRepo, AnnotationRepo};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// Response of `GET /stats`.
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    #[serde(flatten)]
    pub corpus: CorpusStats,
    /// Change events recorded across the corpus.
    pub total_changes: i64,
}

/// GET /api/v1/stats
///
/// Validation progress and the most frequent drugs and adverse events.
pub async fn corpus_stats(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let annotations = AnnotationRepo::list_all(&state.pool).await?;
    let corpus = CorpusStats::compute(annotations.iter().map(|a| a.facts()));
    let total_changes = AnnotationChangeRepo::count(&state.pool, &ChangeQuery::default()).await?;

    Ok(Json(DataResponse {
        data: StatsResponse {
            corpus,
            total_changes,
        },
    }))
}
