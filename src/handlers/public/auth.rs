// handlers/public/auth.rs - POST /api/auth/login, POST /api/auth/register

use axum::extract::State;
use serde::{Deserialize, Serialize};

use crate::auth::{generate_jwt, Claims};
use crate::error::ApiError;
use crate::extract::{required, JsonBody};
use crate::middleware::{ApiResponse, ApiResult};
use crate::models::{Account, NewAccount, Role};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub user: Account,
    pub expires_in: u64,
}

/// POST /api/auth/login - exchange username and password for a bearer token
pub async fn login(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<LoginRequest>,
) -> ApiResult<LoginResponse> {
    let username = required("username", request.username.as_deref())?;
    let password = request
        .password
        .as_deref()
        .filter(|p| !p.is_empty())
        .ok_or_else(|| ApiError::field_error("password", "This field is required"))?;

    let account = state
        .store
        .find_account_by_username(username)
        .await?
        .filter(|account| account.password == password && account.is_active)
        .ok_or_else(|| {
            tracing::info!("Rejected login for {}", username);
            ApiError::Unauthorized("Invalid credentials".to_string())
        })?;

    let expiry_hours = state.config.security.jwt_expiry_hours;
    let token = generate_jwt(&Claims::for_account(&account, expiry_hours), &state.config.security).map_err(|e| {
        tracing::error!("Token generation failed: {}", e);
        ApiError::internal_server_error("Failed to issue token")
    })?;

    tracing::info!("{} ({}) logged in", account.username, account.role);

    Ok(ApiResponse::success(LoginResponse {
        token,
        user: account,
        expires_in: expiry_hours * 3600,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RegisterRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

/// POST /api/auth/register - self-service signup, always as a viewer
pub async fn register(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<RegisterRequest>,
) -> ApiResult<Account> {
    let account = validated_account(
        request.username.as_deref(),
        request.email.as_deref(),
        request.password.as_deref(),
        Role::Viewer,
    )?;

    let created = state.store.create_account(account).await?;
    tracing::info!("Registered viewer {}", created.username);

    Ok(ApiResponse::created(created))
}

/// Shared field validation for every account-creating endpoint.
pub fn validated_account(
    username: Option<&str>,
    email: Option<&str>,
    password: Option<&str>,
    role: Role,
) -> Result<NewAccount, ApiError> {
    let username = required("username", username)?;
    let email = required("email", email)?;
    // Credentials are compared verbatim, so whitespace is kept.
    let password = password
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| ApiError::field_error("password", "This field is required"))?;

    if !email.contains('@') {
        return Err(ApiError::field_error("email", "Must be a valid email address"));
    }

    Ok(NewAccount::new(username, email, password, role))
}
