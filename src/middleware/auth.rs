use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};

use crate::auth::validate_jwt;
use crate::error::ApiError;
use crate::models::Account;
use crate::state::AppState;

/// The active account behind the bearer token, injected by [`jwt_auth_middleware`].
#[derive(Clone, Debug)]
pub struct AuthUser(pub Account);

/// JWT authentication middleware that validates tokens and resolves the active account.
///
/// Every failure (missing header, bad signature, expiry, unknown or inactive
/// account) produces the same 401 response; the cause is only logged.
pub async fn jwt_auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_jwt_from_headers(request.headers()).map_err(reject)?;

    let claims = validate_jwt(&token, &state.config.security).map_err(reject)?;

    let account = state
        .store
        .find_account(claims.sub)
        .await?
        .filter(|account| account.is_active)
        .ok_or_else(|| reject(format!("account {} not found or inactive", claims.sub)))?;

    request.extensions_mut().insert(AuthUser(account));

    Ok(next.run(request).await)
}

fn reject(reason: impl std::fmt::Display) -> ApiError {
    tracing::debug!("Authentication failed: {}", reason);
    ApiError::unauthorized()
}

/// Extract JWT token from Authorization header
fn extract_jwt_from_headers(headers: &HeaderMap) -> Result<String, String> {
    let auth_header = headers
        .get(AUTHORIZATION)
        .ok_or_else(|| "Missing Authorization header".to_string())?;

    let auth_str = auth_header
        .to_str()
        .map_err(|_| "Invalid Authorization header format".to_string())?;

    match auth_str.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => Ok(token.trim().to_string()),
        Some(_) => Err("Empty JWT token".to_string()),
        None => Err("Authorization header must use Bearer token format".to_string()),
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or_else(|| reject("route is missing the authentication layer"))
    }
}
