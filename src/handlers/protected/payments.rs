// handlers/protected/payments.rs - /api/payments submission, review and reporting

use axum::{
    extract::{Path, State},
    response::Response,
};
use rust_decimal::Decimal;
use serde::Deserialize;

use super::progress::{CommentRequest, DecisionRequest};
use super::reports::{pdf_response, usernames, ListQuery, ReportQuery};
use crate::database::RecordFilter;
use crate::error::ApiError;
use crate::extract::{required, IdParam, JsonBody, QueryParams};
use crate::middleware::{AdminOnly, ApiResponse, ApiResult, AuthUser, Authorized, PayingAuthorityOnly};
use crate::models::{NewPayment, Payment, PaymentListing, ThreadComment};
use crate::services::approval::{payment_scope, ApprovalService, StatusQuery};
use crate::services::report::{self, LedgerEntry};
use crate::state::AppState;
use crate::types::{parse_date, DateRange};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreatePaymentRequest {
    #[serde(rename = "paymentID")]
    pub payment_id: Option<String>,
    pub date: Option<String>,
    pub amount: Option<Decimal>,
    pub description: Option<String>,
    pub remarks: Option<String>,
}

fn optional_text(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// POST /api/payments - record a payment for approval
pub async fn create(
    State(state): State<AppState>,
    authority: Authorized<PayingAuthorityOnly>,
    JsonBody(request): JsonBody<CreatePaymentRequest>,
) -> ApiResult<Payment> {
    let payment_id = required("paymentID", request.payment_id.as_deref())?;
    let raw_date = required("date", request.date.as_deref())?;
    let date = parse_date(raw_date).ok_or_else(|| ApiError::field_error("date", format!("Invalid date '{}'", raw_date)))?;
    let amount = request
        .amount
        .ok_or_else(|| ApiError::field_error("amount", "This field is required"))?;
    if amount <= Decimal::ZERO {
        return Err(ApiError::field_error("amount", "Amount must be greater than zero"));
    }

    let payment = state
        .store
        .create_payment(NewPayment {
            payment_id: payment_id.to_string(),
            date,
            amount: amount.round_dp(2),
            description: optional_text(request.description),
            remarks: optional_text(request.remarks),
            created_by: authority.account.id,
        })
        .await?;

    tracing::info!(
        "{} recorded payment {} of {}",
        authority.account.username,
        payment.payment_id,
        payment.amount
    );

    Ok(ApiResponse::created(payment))
}

/// GET /api/payments - payments visible to the caller, newest first
pub async fn list(
    State(state): State<AppState>,
    AuthUser(account): AuthUser,
    QueryParams(query): QueryParams<ListQuery>,
) -> ApiResult<Vec<PaymentListing>> {
    let status = StatusQuery::parse(query.status.as_deref()).map_err(|e| ApiError::field_error("status", e))?;
    let filter = payment_scope(&account, status, query.range()?);
    let records = state.store.list_payments(&filter).await?;
    let names = usernames(&state).await?;
    Ok(ApiResponse::success(
        records
            .into_iter()
            .map(|p| PaymentListing::populate(p, &names))
            .collect(),
    ))
}

/// GET /api/payments/approved - approved payments with a running total
pub async fn approved(
    State(state): State<AppState>,
    _user: AuthUser,
    QueryParams(query): QueryParams<ListQuery>,
) -> ApiResult<Vec<LedgerEntry>> {
    let range = query.range()?;
    let payments = state
        .store
        .list_payments(&RecordFilter::approved_between(range))
        .await?;
    Ok(ApiResponse::success(report::payment_ledger(&payments, range)))
}

/// PATCH /api/payments/by-payment-id/:paymentID/approve - approve or reject a pending payment
pub async fn approve(
    State(state): State<AppState>,
    admin: Authorized<AdminOnly>,
    Path(payment_id): Path<String>,
    JsonBody(request): JsonBody<DecisionRequest>,
) -> ApiResult<Payment> {
    let payment = ApprovalService::new(state.store.clone())
        .decide_payment(&payment_id, request.target()?, &admin.account, request.comments.as_deref())
        .await?;
    Ok(ApiResponse::success(payment))
}

/// POST /api/payments/:id/comments - append to the embedded comment thread
pub async fn comment(
    State(state): State<AppState>,
    AuthUser(account): AuthUser,
    IdParam(id): IdParam,
    JsonBody(request): JsonBody<CommentRequest>,
) -> ApiResult<Payment> {
    let text = required("text", request.text.as_deref())?;
    let payment = state
        .store
        .append_payment_comment(id, &ThreadComment::new(text, account.id))
        .await?;
    Ok(ApiResponse::success(payment))
}

/// DELETE /api/payments/:id - withdraw a payment that is still pending
pub async fn delete(
    State(state): State<AppState>,
    authority: Authorized<PayingAuthorityOnly>,
    IdParam(id): IdParam,
) -> ApiResult<Payment> {
    let payment = ApprovalService::new(state.store.clone())
        .delete_payment(id, &authority.account)
        .await?;
    Ok(ApiResponse::success(payment))
}

/// GET /api/payments/pdf-range?start&end - approved payments as a PDF
pub async fn pdf_range(
    State(state): State<AppState>,
    _user: AuthUser,
    QueryParams(query): QueryParams<ReportQuery>,
) -> Result<Response, ApiError> {
    let (start, end) = query.range()?;
    let records = state
        .store
        .list_payments(&RecordFilter::approved_between(DateRange::between(start, end)))
        .await?;

    pdf_response(report::payment_report(start, end, &records), start, end).await
}
