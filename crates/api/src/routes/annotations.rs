//! Route definitions for annotation review.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::{annotations, changes};
use crate::state::AppState;

/// Routes mounted at `/annotations`.
///
/// ```text
/// GET    /                  -> list_annotations
/// POST   /                  -> create_annotation
/// GET    /start             -> start_annotation
/// POST   /validation        -> set_validation
/// GET    /{id}              -> get_annotation
/// PUT    /{id}              -> save_annotation
/// DELETE /{id}              -> delete_annotation
/// GET    /{id}/changes      -> annotation_changes
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(annotations::list_annotations).post(annotations::create_annotation),
        )
        .route("/start", get(annotations::start_annotation))
        .route("/validation", post(annotations::set_validation))
        .route(
            "/{id}",
            get(annotations::get_annotation)
                .put(annotations::save_annotation)
                .delete(annotations::delete_annotation),
        )
        .route("/{id}/changes", get(changes::annotation_changes))
}
