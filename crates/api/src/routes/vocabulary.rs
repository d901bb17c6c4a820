use axum::routing::{get, post};
use axum::Router;

use crate::handlers::vocabulary;
use crate::state::AppState;

/// Routes mounted at `/vocabulary`.
///
/// ```text
/// GET    /suggestions       -> suggestions
/// POST   /drugs             -> upload_drugs
/// POST   /adverse-events    -> upload_adverse_events
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/suggestions", get(vocabulary::suggestions))
        .route("/drugs", post(vocabulary::upload_drugs))
        .route("/adverse-events", post(vocabulary::upload_adverse_events))
}
