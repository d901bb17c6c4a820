//! Edit-session extractor.
//!
//! Clients group their edits by sending an opaque identifier in the
//! `x-session-id` header. It is recorded on every change event written by
//! the request.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::error::AppError;

/// Header carrying the edit-session identifier.
pub const SESSION_HEADER: &str = "x-session-id";

/// Longest accepted session identifier.
pub const MAX_SESSION_ID_LENGTH: usize = 128;

/// Optional edit-session identifier from the `x-session-id` header.
///
/// A missing or blank header yields `SessionId(None)`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionId(pub Option<String>);

impl SessionId {
    pub fn as_deref(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

impl<S> FromRequestParts<S> for SessionId
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(raw) = parts.headers.get(SESSION_HEADER) else {
            return Ok(SessionId(None));
        };

        let value = raw
            .to_str()
            .map_err(|_| AppError::BadRequest(format!("{SESSION_HEADER} must be visible ASCII")))?
            .trim();

        if value.is_empty() {
            return Ok(SessionId(None));
        }
        if value.len() > MAX_SESSION_ID_LENGTH {
            return Err(AppError::BadRequest(format!(
                "{SESSION_HEADER} exceeds {MAX_SESSION_ID_LENGTH} characters"
            )));
        }
        Ok(SessionId(Some(value.to_string())))
    }
}
