//! Service credential check for the hook and admin routes

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use subtle::ConstantTimeEq;
use trackroom_core::AppError;

use crate::error::HttpAppError;
use crate::state::AppState;

fn secure_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// Require `Authorization: Bearer <SERVICE_SECRET>`.
pub async fn require_service_token(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let Some(secret) = state.service_secret.as_deref() else {
        return next.run(request).await;
    };

    let token = request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim);

    match token {
        Some(token) if secure_compare(token, secret) => next.run(request).await,
        Some(_) => {
            tracing::warn!(path = %request.uri().path(), "Rejected invalid service token");
            HttpAppError(AppError::Unauthorized(
                "Invalid service token".to_string(),
            ))
            .into_response()
        }
        None => HttpAppError(AppError::Unauthorized(
            "Missing bearer token".to_string(),
        ))
        .into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secure_compare() {
        assert!(secure_compare("s3cret-value-1234", "s3cret-value-1234"));
        assert!(!secure_compare("s3cret-value-1234", "s3cret-value-1235"));
        assert!(!secure_compare("short", "s3cret-value-1234"));
    }
}
