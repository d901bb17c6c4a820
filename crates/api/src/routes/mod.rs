pub mod annotations;
pub mod changes;
pub mod health;
pub mod stats;
pub mod transfer;
pub mod vocabulary;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /annotations                                     list, create
/// /annotations/start                               first unvalidated (GET)
/// /annotations/validation                          bulk validate (POST)
/// /annotations/{id}                                get, save, delete
/// /annotations/{id}/changes                        change history (GET)
///
/// /changes                                         query, purge (GET, DELETE)
/// /changes/report                                  activity report (GET)
///
/// /stats                                           corpus statistics (GET)
///
/// /import                                          multipart upload (POST)
/// /import/path                                     server-side file (POST)
/// /export                                          JSONL download (GET)
/// /export/hub                                      push to dataset hub (POST)
///
/// /vocabulary/suggestions                          editor suggestions (GET)
/// /vocabulary/drugs                                upload drug list (POST)
/// /vocabulary/adverse-events                       upload ADE list (POST)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Review workflow: listing, editing, validation.
        .nest("/annotations", annotations::router())
        // Change log queries and maintenance.
        .nest("/changes", changes::router())
        .nest("/stats", stats::router())
        // Corpus import/export.
        .merge(transfer::router())
        // Suggestion vocabularies.
        .nest("/vocabulary", vocabulary::router())
}
