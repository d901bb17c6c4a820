//! Handlers for the change log: per-annotation history, filtered listings,
//! the activity report and administrative purge.

use annotator_core::change::{ChangeStatistics, ChangeSummary, ChangeType};
use annotator_core::highlight::{highlight_changes, ChangeHighlights};
use annotator_core::paging::{clamp_limit, clamp_offset, DEFAULT_CHANGE_LIMIT, MAX_CHANGE_LIMIT};
use annotator_core::types::{DbId, Timestamp};
use annotator_db::models::change::{
    AnnotationActivity, AnnotationChange, ChangeQuery, ChangeReport, SessionActivity,
};
use annotator_db::repositories::{AnnotationChangeRepo, AnnotationRepo};
use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use chrono::{TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::handlers::annotations::find_annotation;
use crate::query::{empty_as_none, parse_optional};
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Query parameters shared by `GET /changes` and `GET /changes/report`.
#[derive(Debug, Default, Deserialize)]
pub struct ChangeListParams {
    pub annotation_id: Option<DbId>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub change_type: Option<String>,
    /// Only changes from the last N hours.
    pub since_hours: Option<i64>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub session_id: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl ChangeListParams {
    fn to_query(&self) -> AppResult<ChangeQuery> {
        Ok(ChangeQuery {
            annotation_id: self.annotation_id,
            change_type: parse_optional::<ChangeType>(self.change_type.as_deref())?,
            since: self.since_hours.map(since_hours_ago).transpose()?,
            session_id: self.session_id.clone(),
            limit: self.limit,
            offset: self.offset,
        })
    }
}

/// Query parameters for `DELETE /changes`.
#[derive(Debug, Deserialize)]
pub struct PurgeParams {
    pub annotation_id: Option<DbId>,
}

#[derive(Debug, Serialize)]
pub struct PurgeResult {
    pub deleted: u64,
}

/// One page of change events.
#[derive(Debug, Serialize)]
pub struct ChangePage {
    pub items: Vec<AnnotationChange>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// Change history of one annotation with the diff view of its text.
#[derive(Debug, Serialize)]
pub struct AnnotationChangesView {
    pub annotation_id: DbId,
    pub text: String,
    pub summary: ChangeSummary,
    pub statistics: ChangeStatistics,
    /// Newest first.
    pub changes: Vec<AnnotationChange>,
    pub highlights: ChangeHighlights,
    /// Text with added and removed entities wrapped in markup.
    pub highlighted_text: String,
}

/// Count of one change type with its display label.
#[derive(Debug, Serialize)]
pub struct ChangeTypeBreakdown {
    pub change_type: ChangeType,
    pub label: &'static str,
    pub count: i64,
}

/// Response of `GET /changes/report`.
#[derive(Debug, Serialize)]
pub struct ChangeReportView {
    pub total_annotations: i64,
    pub total_changes: i64,
    pub by_type: Vec<ChangeTypeBreakdown>,
    pub recent: Vec<AnnotationChange>,
    pub top_sessions: Vec<SessionActivity>,
    pub most_active_annotations: Vec<AnnotationActivity>,
}

impl ChangeReportView {
    fn new(total_annotations: i64, report: ChangeReport) -> Self {
        Self {
            total_annotations,
            total_changes: report.total_changes,
            by_type: report
                .by_type
                .into_iter()
                .map(|c| ChangeTypeBreakdown {
                    change_type: c.change_type,
                    label: c.change_type.label(),
                    count: c.count,
                })
                .collect(),
            recent: report.recent,
            top_sessions: report.top_sessions,
            most_active_annotations: report.most_active_annotations,
        }
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /api/v1/annotations/{id}/changes
///
/// Full change history of one annotation, its summary and the text with
/// every added and removed entity highlighted.
pub async fn annotation_changes(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let annotation = find_annotation(&state, id).await?;

    let changes = AnnotationChangeRepo::list_by_annotation(&state.pool, id).await?;
    let summary = AnnotationChangeRepo::summary(&state.pool, id).await?;

    let highlights = ChangeHighlights::from_changes(
        changes
            .iter()
            .map(|c| (c.change_type, c.entity_name.as_deref())),
    );
    let highlighted_text = highlight_changes(&annotation.text, &highlights)?;

    Ok(Json(DataResponse {
        data: AnnotationChangesView {
            annotation_id: id,
            text: annotation.text,
            statistics: summary.statistics(),
            summary,
            changes,
            highlights,
            highlighted_text,
        },
    }))
}

/// GET /api/v1/changes
///
/// Change events matching every supplied filter, newest first.
pub async fn list_changes(
    State(state): State<AppState>,
    Query(params): Query<ChangeListParams>,
) -> AppResult<impl IntoResponse> {
    let query = params.to_query()?;

    let items = AnnotationChangeRepo::query(&state.pool, &query).await?;
    let total = AnnotationChangeRepo::count(&state.pool, &query).await?;

    Ok(Json(DataResponse {
        data: ChangePage {
            items,
            total,
            limit: clamp_limit(query.limit, DEFAULT_CHANGE_LIMIT, MAX_CHANGE_LIMIT),
            offset: clamp_offset(query.offset),
        },
    }))
}

/// GET /api/v1/changes/report
///
/// Totals, per-type counts, the latest changes, the busiest sessions and
/// the most edited annotations. `limit` and `offset` are ignored.
pub async fn change_report(
    State(state): State<AppState>,
    Query(params): Query<ChangeListParams>,
) -> AppResult<impl IntoResponse> {
    let query = params.to_query()?;

    let report = AnnotationChangeRepo::report(&state.pool, &query).await?;
    let counts = AnnotationRepo::counts(&state.pool).await?;

    Ok(Json(DataResponse {
        data: ChangeReportView::new(counts.total, report),
    }))
}

/// DELETE /api/v1/changes
///
/// Remove change events for one annotation, or all of them when no
/// `annotation_id` is given.
pub async fn purge_changes(
    State(state): State<AppState>,
    Query(params): Query<PurgeParams>,
) -> AppResult<impl IntoResponse> {
    let deleted = AnnotationChangeRepo::purge(&state.pool, params.annotation_id).await?;

    tracing::warn!(
        annotation_id = ?params.annotation_id,
        deleted,
        "Change log purged",
    );

    Ok(Json(DataResponse {
        data: PurgeResult { deleted },
    }))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn since_hours_ago(hours: i64) -> AppResult<Timestamp> {
    if hours < 0 {
        return Err(AppError::BadRequest(
            "since_hours must not be negative".into(),
        ));
    }
    TimeDelta::try_hours(hours)
        .and_then(|delta| Utc::now().checked_sub_signed(delta))
        .ok_or_else(|| AppError::BadRequest(format!("since_hours {hours} is out of range")))
}
