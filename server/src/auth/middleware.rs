//! Bearer token check for event publishers.
//!
//! When `API_KEY` is configured, publish requests must carry
//! `Authorization: Bearer <API_KEY>`. Without it, publishing is open, which
//! suits local development only.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use crate::error::AppError;
use crate::AppState;

/// A caller allowed to publish events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Publisher {
    /// Presented the configured API key
    Authenticated,
    /// No API key is configured
    Anonymous,
}

impl FromRequestParts<AppState> for Publisher {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(expected) = state.config.api_key.as_deref() else {
            return Ok(Publisher::Anonymous);
        };

        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok());

        match auth_header {
            Some(header) if header.starts_with("Bearer ") => {
                let token = header.trim_start_matches("Bearer ");
                if token.is_empty() {
                    return Err(AppError::Unauthorized("empty bearer token"));
                }
                if !constant_time_eq(token.as_bytes(), expected.as_bytes()) {
                    return Err(AppError::Unauthorized("invalid API key"));
                }
                Ok(Publisher::Authenticated)
            }
            Some(_) => Err(AppError::Unauthorized(
                "invalid authorization header format",
            )),
            None => Err(AppError::Unauthorized("missing authorization header")),
        }
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
