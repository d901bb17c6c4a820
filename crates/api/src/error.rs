use annotator_core::error::CoreError;
use annotator_hub::HubError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for domain errors and adds HTTP-specific variants.
/// Implements [`IntoResponse`] to produce consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `annotator_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A database error from sqlx.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A filesystem error (server-side import).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The dataset hub rejected or failed a push.
    #[error(transparent)]
    Hub(#[from] HubError),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            // --- CoreError variants ---
            AppError::Core(core) => match core {
                CoreError::NotFound { entity, id } => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    format!("{entity} with id {id} not found"),
                ),
                CoreError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
                CoreError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
                CoreError::Internal(msg) => {
                    tracing::error!(error = %msg, "Internal core error");
                    internal()
                }
            },

            // --- Database errors ---
            AppError::Database(err) => classify_sqlx_error(err),

            // --- Filesystem errors ---
            AppError::Io(err) => match err.kind() {
                std::io::ErrorKind::NotFound => (
                    StatusCode::NOT_FOUND,
                    "FILE_NOT_FOUND",
                    "File not found".to_string(),
                ),
                std::io::ErrorKind::InvalidData => (
                    StatusCode::BAD_REQUEST,
                    "INVALID_FILE",
                    "File is not valid UTF-8 text".to_string(),
                ),
                _ => {
                    tracing::error!(error = %err, "I/O error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "IO_ERROR",
                        "Failed to read file".to_string(),
                    )
                }
            },

            // --- Dataset hub errors ---
            AppError::Hub(err) => classify_hub_error(err),

            // --- HTTP-specific errors ---
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                internal()
            }
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

fn internal() -> (StatusCode, &'static str, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "An internal error occurred".to_string(),
    )
}

/// Classify a sqlx error into an HTTP status, error code, and message.
///
/// - `RowNotFound` maps to 404.
/// - Unique constraint violations (constraint name starting with `uq_`) map to 409.
/// - Everything else maps to 500 with a sanitized message.
fn classify_sqlx_error(err: &sqlx::Error) -> (StatusCode, &'static str, String) {
    match err {
        sqlx::Error::RowNotFound => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            "Resource not found".to_string(),
        ),
        sqlx::Error::Database(db_err) => {
            // PostgreSQL unique constraint violation: error code 23505
            if db_err.code().as_deref() == Some("23505") {
                let constraint = db_err.constraint().unwrap_or("unknown");
                if constraint.starts_with("uq_") {
                    return (
                        StatusCode::CONFLICT,
                        "CONFLICT",
                        format!("Duplicate value violates unique constraint: {constraint}"),
                    );
                }
            }
            tracing::error!(error = %db_err, "Database error");
            internal()
        }
        other => {
            tracing::error!(error = %other, "Database error");
            internal()
        }
    }
}

/// Classify a hub failure. Each kind gets its own code so clients can tell a
/// bad token from a name clash or an outage.
fn classify_hub_error(err: &HubError) -> (StatusCode, &'static str, String) {
    match err {
        HubError::InvalidToken => (
            StatusCode::UNAUTHORIZED,
            "HUB_INVALID_TOKEN",
            "The dataset hub rejected the access token".to_string(),
        ),
        HubError::NameCollision { repo_id } => (
            StatusCode::CONFLICT,
            "HUB_NAME_COLLISION",
            format!("Dataset repository '{repo_id}' already exists"),
        ),
        HubError::InvalidRepoId(repo_id) => (
            StatusCode::BAD_REQUEST,
            "VALIDATION_ERROR",
            format!("Invalid dataset repository id '{repo_id}'"),
        ),
        HubError::Request(e) => {
            tracing::warn!(error = %e, "Dataset hub unreachable");
            (
                StatusCode::BAD_GATEWAY,
                "HUB_UNAVAILABLE",
                "The dataset hub could not be reached".to_string(),
            )
        }
        HubError::Api { status, body } => {
            tracing::warn!(status, body = %body, "Dataset hub returned an error");
            (
                StatusCode::BAD_GATEWAY,
                "HUB_ERROR",
                format!("The dataset hub returned status {status}"),
            )
        }
        HubError::Encode(e) => {
            tracing::error!(error = %e, "Failed to encode hub payload");
            internal()
        }
    }
}
