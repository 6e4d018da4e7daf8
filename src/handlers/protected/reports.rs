use axum::{
    http::header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    response::{IntoResponse, Response},
};
use std::collections::HashMap;

use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiError;
use crate::services::report::{self, Report};
use crate::state::AppState;
use crate::types::{parse_date, DateRange};

#[derive(Debug, Deserialize)]
pub struct ReportQuery {
    pub start: Option<String>,
    pub end: Option<String>,
}

impl ReportQuery {
    pub fn range(&self) -> Result<(NaiveDate, NaiveDate), ApiError> {
        report::parse_range(self.start.as_deref(), self.end.as_deref()).map_err(ApiError::bad_request)
    }
}

/// `startDate`/`endDate` listing bounds; either may be absent.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub status: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

impl ListQuery {
    pub fn range(&self) -> Result<DateRange, ApiError> {
        let bound = |field: &str, value: Option<&str>| match value.map(str::trim).filter(|v| !v.is_empty()) {
            None => Ok(None),
            Some(v) => parse_date(v)
                .map(Some)
                .ok_or_else(|| ApiError::field_error(field, format!("Invalid date '{}'", v))),
        };
        Ok(DateRange::new(
            bound("startDate", self.start_date.as_deref())?,
            bound("endDate", self.end_date.as_deref())?,
        ))
    }
}

/// Account id to username, for populating listings and report bylines.
pub async fn usernames(state: &AppState) -> Result<HashMap<Uuid, String>, ApiError> {
    Ok(state
        .store
        .list_accounts()
        .await?
        .into_iter()
        .map(|a| (a.id, a.username))
        .collect())
}

pub async fn pdf_response(report: Report, start: NaiveDate, end: NaiveDate) -> Result<Response, ApiError> {
    let filename = report::report_filename(report.kind, start, end);
    let count = report.entry_count();
    let bytes = report::render_pdf(report).await?;

    tracing::info!("Rendered {} ({} records, {} bytes)", filename, count, bytes.len());

    Ok((
        [
            (CONTENT_TYPE, "application/pdf".to_string()),
            (CONTENT_DISPOSITION, format!("attachment; filename=\"{}\"", filename)),
        ],
        bytes,
    )
        .into_response())
}
