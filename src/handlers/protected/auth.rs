// handlers/protected/auth.rs - GET /api/auth/me

use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::models::Account;

/// GET /api/auth/me - the account behind the presented token
pub async fn me(AuthUser(account): AuthUser) -> ApiResult<Account> {
    Ok(ApiResponse::success(account))
}
