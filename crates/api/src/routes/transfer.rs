//! Route definitions for corpus import and export.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::transfer;
use crate::state::AppState;

/// Import/export routes, merged at the API root.
///
/// ```text
/// POST   /import            -> import_upload
/// POST   /import/path       -> import_path
/// GET    /export            -> export_jsonl
/// POST   /export/hub        -> push_to_hub
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/import", post(transfer::import_upload))
        .route("/import/path", post(transfer::import_path))
        .route("/export", get(transfer::export_jsonl))
        .route("/export/hub", post(transfer::push_to_hub))
}
