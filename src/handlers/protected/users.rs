// handlers/protected/users.rs - /api/users administration (admin only)

use axum::extract::State;
use serde::Deserialize;

use crate::error::ApiError;
use crate::extract::{IdParam, JsonBody};
use crate::handlers::public::auth::validated_account;
use crate::middleware::{AdminOnly, ApiResponse, ApiResult, Authorized};
use crate::models::{Account, Role};
use crate::state::AppState;

/// GET /api/users - every account, credentials omitted
pub async fn list(State(state): State<AppState>, _admin: Authorized<AdminOnly>) -> ApiResult<Vec<Account>> {
    Ok(ApiResponse::success(state.store.list_accounts().await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateUserRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
}

/// POST /api/users - create an account with any role
pub async fn create(
    State(state): State<AppState>,
    admin: Authorized<AdminOnly>,
    JsonBody(request): JsonBody<CreateUserRequest>,
) -> ApiResult<Account> {
    let role: Role = request
        .role
        .as_deref()
        .map(str::trim)
        .ok_or_else(|| ApiError::field_error("role", "This field is required"))?
        .parse()
        .map_err(|e: String| ApiError::field_error("role", e))?;

    let account = validated_account(
        request.username.as_deref(),
        request.email.as_deref(),
        request.password.as_deref(),
        role,
    )?;

    let created = state.store.create_account(account).await?;
    tracing::info!("{} created {} account {}", admin.account.username, created.role, created.username);

    Ok(ApiResponse::created(created))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateUserRequest {
    pub is_active: bool,
}

/// PATCH /api/users/:id - activate or deactivate an account
pub async fn update(
    State(state): State<AppState>,
    admin: Authorized<AdminOnly>,
    IdParam(id): IdParam,
    JsonBody(request): JsonBody<UpdateUserRequest>,
) -> ApiResult<Account> {
    if id == admin.account.id {
        return Err(ApiError::bad_request("You cannot deactivate your own account"));
    }

    let account = state.store.set_account_active(id, request.is_active).await?;
    tracing::info!(
        "{} set {} active={}",
        admin.account.username,
        account.username,
        account.is_active
    );

    Ok(ApiResponse::success(account))
}

/// DELETE /api/users/:id - remove an account that owns no records
pub async fn delete(
    State(state): State<AppState>,
    admin: Authorized<AdminOnly>,
    IdParam(id): IdParam,
) -> ApiResult<Account> {
    if id == admin.account.id {
        return Err(ApiError::bad_request("You cannot delete your own account"));
    }

    let removed = state.store.delete_account(id).await?;
    tracing::info!("{} deleted account {}", admin.account.username, removed.username);

    Ok(ApiResponse::success(removed))
}
