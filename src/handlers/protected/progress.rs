// handlers/protected/progress.rs - /api/progress submission, review and reporting

use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    response::Response,
};
use serde::Deserialize;

use super::reports::{pdf_response, usernames, ListQuery, ReportQuery};
use crate::database::RecordFilter;
use crate::error::ApiError;
use crate::extract::{required, IdParam, JsonBody, QueryParams};
use crate::middleware::{AdminOnly, ApiResponse, ApiResult, AuthUser, Authorized, SiteEngineerOnly};
use crate::models::{NewProgress, Progress, ProgressListing, RecordStatus, ThreadComment};
use crate::services::approval::{progress_scope, ApprovalService, StatusQuery};
use crate::services::packager::{Attachment, AttachmentSet};
use crate::services::report;
use crate::state::AppState;
use crate::types::{parse_date, DateRange};

/// POST /api/progress - multipart `date`, `description`, up to 10 `photos` and one `video`
pub async fn create(
    State(state): State<AppState>,
    engineer: Authorized<SiteEngineerOnly>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Progress> {
    let mut multipart = multipart.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let packager = state.packager();

    let mut date: Option<String> = None;
    let mut description: Option<String> = None;
    let mut files = AttachmentSet::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        let filename = field.file_name().unwrap_or_default().to_string();
        let multipart_error = |e: axum::extract::multipart::MultipartError| ApiError::bad_request(e.body_text());

        match name.as_str() {
            "date" => date = Some(field.text().await.map_err(multipart_error)?),
            "description" => description = Some(field.text().await.map_err(multipart_error)?),
            "photos" => {
                files.photos.push(Attachment::new(filename, field.bytes().await.map_err(multipart_error)?));
                packager.check_counts(files.photos.len(), files.videos.len())?;
            }
            "video" => {
                files.videos.push(Attachment::new(filename, field.bytes().await.map_err(multipart_error)?));
                packager.check_counts(files.photos.len(), files.videos.len())?;
            }
            other => return Err(ApiError::bad_request(format!("Unexpected field '{}'", other))),
        }
    }

    let raw_date = required("date", date.as_deref())?;
    let parsed_date =
        parse_date(raw_date).ok_or_else(|| ApiError::field_error("date", format!("Invalid date '{}'", raw_date)))?;
    let description = required("description", description.as_deref())?;

    let bundle = packager.package(files, raw_date).await?;

    let progress = state
        .store
        .create_progress(NewProgress {
            date: parsed_date,
            description: description.to_string(),
            zip: bundle,
            uploaded_by: engineer.account.id,
        })
        .await?;

    tracing::info!(
        "{} submitted {} for {}",
        engineer.account.username,
        progress.progress_id,
        progress.date
    );

    Ok(ApiResponse::created(progress))
}

/// GET /api/progress - progress updates visible to the caller, newest first
pub async fn list(
    State(state): State<AppState>,
    AuthUser(account): AuthUser,
    QueryParams(query): QueryParams<ListQuery>,
) -> ApiResult<Vec<ProgressListing>> {
    let status = StatusQuery::parse(query.status.as_deref()).map_err(|e| ApiError::field_error("status", e))?;
    let filter = progress_scope(&account, status, query.range()?);
    let records = state.store.list_progress(&filter).await?;
    let names = usernames(&state).await?;
    Ok(ApiResponse::success(
        records
            .into_iter()
            .map(|p| ProgressListing::populate(p, &names))
            .collect(),
    ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct EditRequest {
    pub description: Option<String>,
}

/// PATCH /api/progress/:id - edit the description of a pending update
pub async fn update(
    State(state): State<AppState>,
    AuthUser(account): AuthUser,
    IdParam(id): IdParam,
    JsonBody(request): JsonBody<EditRequest>,
) -> ApiResult<Progress> {
    let description = required("description", request.description.as_deref())?;
    let progress = ApprovalService::new(state.store.clone())
        .edit_progress_description(id, description, &account)
        .await?;
    Ok(ApiResponse::success(progress))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DecisionRequest {
    pub status: Option<String>,
    #[serde(alias = "comment")]
    pub comments: Option<String>,
}

impl DecisionRequest {
    pub fn target(&self) -> Result<RecordStatus, ApiError> {
        let raw = required("status", self.status.as_deref())?;
        RecordStatus::parse(raw)
            .ok_or_else(|| ApiError::field_error("status", format!("'{}' is not a decision; use approved or rejected", raw)))
    }
}

/// PATCH /api/progress/:id/approve - approve or reject a pending update
pub async fn approve(
    State(state): State<AppState>,
    admin: Authorized<AdminOnly>,
    IdParam(id): IdParam,
    JsonBody(request): JsonBody<DecisionRequest>,
) -> ApiResult<Progress> {
    let progress = ApprovalService::new(state.store.clone())
        .decide_progress(id, request.target()?, &admin.account, request.comments.as_deref())
        .await?;
    Ok(ApiResponse::success(progress))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CommentRequest {
    pub text: Option<String>,
}

/// POST /api/progress/:id/comments - append to the embedded comment thread
pub async fn comment(
    State(state): State<AppState>,
    AuthUser(account): AuthUser,
    IdParam(id): IdParam,
    JsonBody(request): JsonBody<CommentRequest>,
) -> ApiResult<Progress> {
    let text = required("text", request.text.as_deref())?;
    let progress = state
        .store
        .append_progress_comment(id, &ThreadComment::new(text, account.id))
        .await?;
    Ok(ApiResponse::success(progress))
}

/// GET /api/progress/pdf-range?start&end - approved updates as a PDF
pub async fn pdf_range(
    State(state): State<AppState>,
    _user: AuthUser,
    QueryParams(query): QueryParams<ReportQuery>,
) -> Result<Response, ApiError> {
    let (start, end) = query.range()?;

    let records = state
        .store
        .list_progress(&RecordFilter::approved_between(DateRange::between(start, end)))
        .await?;
    let uploaders = usernames(&state).await?;

    pdf_response(report::progress_report(start, end, &records, &uploaders), start, end).await
}
