//! Route definitions for the change log.

use axum::routing::get;
use axum::Router;

use crate::handlers::changes;
use crate::state::AppState;

/// Routes mounted at `/changes`.
///
/// ```text
/// GET    /                  -> list_changes
/// DELETE /                  -> purge_changes
/// GET    /report            -> change_report
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(changes::list_changes).delete(changes::purge_changes))
        .route("/report", get(changes::change_report))
}
