//! Bearer token authentication middleware

use axum::{body::Body, extract::State, http::Request, middleware::Next, response::Response};

use crate::error::{AppError, AuthError};
use crate::AppState;

/// Extract the bearer token from the Authorization header
pub fn extract_bearer(request: &Request<Body>) -> Option<&str> {
    request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer ").or_else(|| h.strip_prefix("bearer ")))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Authentication middleware
///
/// Verifies the access token, loads the active user and injects both the
/// `User` and its `AccessClaims` into request extensions.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let token = extract_bearer(&request).ok_or(AuthError::MissingToken)?;

    let (user, claims) = state.auth_service.authenticate(token).await?;

    request.extensions_mut().insert(user);
    request.extensions_mut().insert(claims);

    Ok(next.run(request).await)
}
