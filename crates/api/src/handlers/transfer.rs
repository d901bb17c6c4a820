//! Handlers for corpus import and export.
//!
//! Imports accept JSON-lines (or a single JSON array) in either the flat or
//! the entity-span record shape. Lines that fail to parse are skipped and
//! reported; the rest of the file is imported in one transaction.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use annotator_core::change::ChangeSummary;
use annotator_core::export::{ExportFilter, ExportFormat};
use annotator_core::jsonl::{
    parse_import, to_jsonl_line, ChangeHistory, EntitySpanRecord, ExportLine, ExportedChange,
    SkippedLine,
};
use annotator_core::types::DbId;
use annotator_db::models::annotation::Annotation;
use annotator_db::repositories::{AnnotationChangeRepo, AnnotationRepo};
use annotator_db::DbPool;
use annotator_hub::{DatasetTarget, HubFile};
use axum::extract::{Multipart, Query, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::query::{empty_as_none, parse_optional};
use crate::response::DataResponse;
use crate::state::AppState;

/// File read by `POST /import/path` when no path is given.
pub const DEFAULT_IMPORT_FILE: &str = "extracted_data.jsonl";

/// Content type of export downloads.
const JSONL_CONTENT_TYPE: &str = "application/jsonl; charset=utf-8";

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Outcome of an import, with every skipped line and the reason.
#[derive(Debug, Serialize)]
pub struct ImportResult {
    pub imported_count: u64,
    pub skipped_count: usize,
    pub skipped: Vec<SkippedLine>,
    /// Annotations deleted first because of `clear_existing`.
    pub cleared_count: u64,
}

/// Body of `POST /import/path`.
#[derive(Debug, Default, Deserialize)]
pub struct ImportPathRequest {
    /// Relative to the configured import directory.
    pub file_path: Option<String>,
    #[serde(default)]
    pub clear_existing: bool,
}

/// Query parameters for `GET /export`.
#[derive(Debug, Deserialize)]
pub struct ExportParams {
    /// `flat` (default) or `entities`.
    #[serde(default, deserialize_with = "empty_as_none")]
    pub format: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub filter: Option<String>,
    #[serde(default)]
    pub include_changes: bool,
    /// Sort entity mentions by position (entities format only, default true).
    pub sort_entities: Option<bool>,
}

/// Body of `POST /export/hub`.
#[derive(Debug, Deserialize)]
pub struct HubPushRequest {
    /// `name` or `namespace/name`.
    pub repo_id: String,
    pub token: String,
    #[serde(default = "default_true")]
    pub private: bool,
    #[serde(default)]
    pub exist_ok: bool,
    #[serde(default)]
    pub format: ExportFormat,
    #[serde(default)]
    pub filter: ExportFilter,
    #[serde(default)]
    pub include_changes: bool,
    #[serde(default = "default_true")]
    pub sort_entities: bool,
    /// Defaults to the download file name of the format.
    pub path_in_repo: Option<String>,
}

fn default_true() -> bool {
    true
}

/// What an export contains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportOptions {
    pub format: ExportFormat,
    pub filter: ExportFilter,
    /// Append the change summary, statistics and full history to each line.
    pub include_changes: bool,
    pub sort_entities: bool,
}

/// A rendered export.
#[derive(Debug)]
pub struct ExportBody {
    pub content: String,
    pub records: usize,
}

// ---------------------------------------------------------------------------
// Import
// ---------------------------------------------------------------------------

/// POST /api/v1/import
///
/// Multipart upload with a `file` field (`.jsonl` or `.json`) and an
/// optional `clear_existing` field.
pub async fn import_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<impl IntoResponse> {
    let mut content: Option<Vec<u8>> = None;
    let mut clear_existing = false;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        match field.name() {
            Some("file") => {
                if let Some(name) = field.file_name() {
                    check_upload_extension(name)?;
                }
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                content = Some(bytes.to_vec());
            }
            Some("clear_existing") => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                clear_existing = is_truthy(&value);
            }
            _ => {}
        }
    }

    let content =
        content.ok_or_else(|| AppError::BadRequest("Missing 'file' field".to_string()))?;
    let text = String::from_utf8(content)
        .map_err(|_| AppError::BadRequest("Uploaded file is not valid UTF-8".to_string()))?;

    let result = import_text(&state.pool, &text, clear_existing).await?;
    Ok(Json(DataResponse { data: result }))
}

/// POST /api/v1/import/path
///
/// Import a file that already sits on the server, resolved under the
/// configured import directory.
pub async fn import_path(
    State(state): State<AppState>,
    Json(input): Json<ImportPathRequest>,
) -> AppResult<impl IntoResponse> {
    let requested = input
        .file_path
        .filter(|p| !p.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_IMPORT_FILE.to_string());
    let path = resolve_import_path(&state.config.import_root, &requested)?;

    let text = tokio::fs::read_to_string(&path).await.map_err(|e| {
        tracing::warn!(path = %path.display(), error = %e, "Import file unreadable");
        e
    })?;

    let result = import_text(&state.pool, &text, input.clear_existing).await?;
    Ok(Json(DataResponse { data: result }))
}

async fn import_text(pool: &DbPool, text: &str, clear_existing: bool) -> AppResult<ImportResult> {
    let parsed = parse_import(text);
    for skip in &parsed.skipped {
        tracing::warn!(line = skip.line_number, reason = %skip.reason, "Skipped import line");
    }

    let outcome = AnnotationRepo::import(pool, &parsed.records, clear_existing).await?;

    tracing::info!(
        imported = outcome.imported,
        skipped = parsed.skipped.len(),
        cleared = outcome.cleared,
        "Import completed",
    );

    Ok(ImportResult {
        imported_count: outcome.imported,
        skipped_count: parsed.skipped.len(),
        skipped: parsed.skipped,
        cleared_count: outcome.cleared,
    })
}

// ---------------------------------------------------------------------------
// Export
// ---------------------------------------------------------------------------

/// GET /api/v1/export
///
/// Download the corpus as JSON-lines.
pub async fn export_jsonl(
    State(state): State<AppState>,
    Query(params): Query<ExportParams>,
) -> AppResult<impl IntoResponse> {
    let options = ExportOptions {
        format: parse_optional::<ExportFormat>(params.format.as_deref())?.unwrap_or_default(),
        filter: parse_optional::<ExportFilter>(params.filter.as_deref())?.unwrap_or_default(),
        include_changes: params.include_changes,
        sort_entities: params.sort_entities.unwrap_or(true),
    };

    let body = render_export(&state.pool, options).await?;

    tracing::info!(
        records = body.records,
        format = options.format.as_str(),
        filter = options.filter.as_str(),
        include_changes = options.include_changes,
        "Export generated",
    );

    let disposition = format!("attachment; filename=\"{}\"", options.format.file_name());
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, JSONL_CONTENT_TYPE.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body.content,
    ))
}

/// POST /api/v1/export/hub
///
/// Render an export and publish it to a dataset repository on the hub.
pub async fn push_to_hub(
    State(state): State<AppState>,
    Json(input): Json<HubPushRequest>,
) -> AppResult<impl IntoResponse> {
    if input.token.trim().is_empty() {
        return Err(AppError::BadRequest("token must not be empty".into()));
    }

    let options = ExportOptions {
        format: input.format,
        filter: input.filter,
        include_changes: input.include_changes,
        sort_entities: input.sort_entities,
    };
    let body = render_export(&state.pool, options).await?;

    let files = vec![HubFile {
        path_in_repo: input
            .path_in_repo
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| options.format.file_name().to_string()),
        content: body.content.into_bytes(),
    }];
    let target = DatasetTarget {
        repo_id: input.repo_id.trim().to_string(),
        token: input.token,
        private: input.private,
        exist_ok: input.exist_ok,
    };

    let outcome = state.hub.push_jsonl(&target, &files).await?;

    tracing::info!(
        repo_id = %outcome.repo_id,
        records = body.records,
        created = outcome.created,
        "Export pushed to dataset hub",
    );

    Ok(Json(DataResponse { data: outcome }))
}

/// Render every annotation selected by `options.filter` as JSON-lines.
pub async fn render_export(pool: &DbPool, options: ExportOptions) -> AppResult<ExportBody> {
    let annotations = AnnotationRepo::list_for_export(pool, options.filter).await?;
    let mut histories = if options.include_changes {
        load_histories(pool, &annotations).await?
    } else {
        HashMap::new()
    };

    let mut content = String::new();
    for annotation in &annotations {
        let history = options.include_changes.then(|| {
            histories
                .remove(&annotation.id)
                .unwrap_or_else(|| ChangeHistory::new(ChangeSummary::default(), Vec::new()))
        });

        let line = match options.format {
            ExportFormat::Flat => to_jsonl_line(&ExportLine {
                record: annotation.to_flat_record(),
                history,
            })?,
            ExportFormat::Entities => to_jsonl_line(&ExportLine {
                record: EntitySpanRecord::build(
                    &annotation.text,
                    &annotation.drugs,
                    &annotation.adverse_events,
                    Some(annotation.is_validated),
                    options.sort_entities,
                )?,
                history,
            })?,
        };
        content.push_str(&line);
    }

    Ok(ExportBody {
        content,
        records: annotations.len(),
    })
}

/// Change summaries and chronological histories, keyed by annotation.
/// Annotations without changes are absent.
async fn load_histories(
    pool: &DbPool,
    annotations: &[Annotation],
) -> AppResult<HashMap<DbId, ChangeHistory>> {
    let ids: Vec<DbId> = annotations.iter().map(|a| a.id).collect();
    let summaries = AnnotationChangeRepo::summaries_for(pool, &ids).await?;
    let changes = AnnotationChangeRepo::list_chronological_for(pool, &ids).await?;

    let mut grouped: HashMap<DbId, Vec<ExportedChange>> = HashMap::new();
    for change in &changes {
        grouped
            .entry(change.annotation_id)
            .or_default()
            .push(change.to_exported());
    }

    Ok(summaries
        .into_iter()
        .map(|(id, summary)| {
            let changes = grouped.remove(&id).unwrap_or_default();
            (id, ChangeHistory::new(summary, changes))
        })
        .collect())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn check_upload_extension(file_name: &str) -> AppResult<()> {
    let lower = file_name.to_ascii_lowercase();
    if lower.ends_with(".jsonl") || lower.ends_with(".json") {
        Ok(())
    } else {
        Err(AppError::BadRequest(format!(
            "Unsupported file '{file_name}'. Upload a .jsonl or .json file"
        )))
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "on" | "1" | "yes"
    )
}

/// Join `requested` onto `root`, refusing absolute paths and `..`.
fn resolve_import_path(root: &Path, requested: &str) -> AppResult<PathBuf> {
    let relative = Path::new(requested.trim());
    let escapes = relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes {
        return Err(AppError::BadRequest(format!(
            "file_path '{requested}' must be relative to the import directory"
        )));
    }
    Ok(root.join(relative))
}
