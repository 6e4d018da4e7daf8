// handlers/protected/comments.rs - GET/POST /api/comments

use axum::extract::State;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiError;
use crate::extract::{required, JsonBody, QueryParams};
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::models::{Comment, CommentTarget, NewComment};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentQuery {
    pub item_id: Option<Uuid>,
    #[serde(rename = "type")]
    pub item_type: Option<CommentTarget>,
}

/// GET /api/comments?itemId&type - comments on one record, newest first
pub async fn list(
    State(state): State<AppState>,
    _user: AuthUser,
    QueryParams(query): QueryParams<CommentQuery>,
) -> ApiResult<Vec<Comment>> {
    let (Some(item_id), Some(item_type)) = (query.item_id, query.item_type) else {
        return Err(ApiError::bad_request("itemId and type are required"));
    };

    Ok(ApiResponse::success(state.store.list_comments(item_id, item_type).await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateCommentRequest {
    pub item_id: Uuid,
    #[serde(rename = "type")]
    pub item_type: CommentTarget,
    pub text: Option<String>,
}

/// POST /api/comments - attach a comment to an existing record
pub async fn create(
    State(state): State<AppState>,
    AuthUser(account): AuthUser,
    JsonBody(request): JsonBody<CreateCommentRequest>,
) -> ApiResult<Comment> {
    let text = required("text", request.text.as_deref())?;

    let exists = match request.item_type {
        CommentTarget::Progress => state.store.find_progress(request.item_id).await?.is_some(),
        CommentTarget::Payment => state.store.find_payment(request.item_id).await?.is_some(),
    };
    if !exists {
        return Err(ApiError::not_found(format!("No {} with id {}", request.item_type, request.item_id)));
    }

    let comment = state
        .store
        .create_comment(NewComment {
            item_id: request.item_id,
            item_type: request.item_type,
            text: text.to_string(),
            user_id: account.id,
        })
        .await?;

    Ok(ApiResponse::created(comment))
}
