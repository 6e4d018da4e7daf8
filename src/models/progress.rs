use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::collections::HashMap;

use super::comment::UserRef;
use super::record::{RecordStatus, ThreadComment};

/// Reference to the zipped attachments of a progress update, as stored externally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentBundle {
    pub drive_id: String,
    pub url: String,
    pub mime_type: String,
    pub filename: String,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    pub id: Uuid,
    #[serde(rename = "progressID")]
    pub progress_id: String,
    pub date: NaiveDate,
    pub description: String,
    pub zip: Option<AttachmentBundle>,
    pub uploaded_by: Uuid,
    pub status: RecordStatus,
    pub approved_by: Option<Uuid>,
    pub approved_at: Option<DateTime<Utc>>,
    pub comments: Vec<ThreadComment>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A progress update as listed, with its people resolved to usernames.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressListing {
    pub id: Uuid,
    #[serde(rename = "progressID")]
    pub progress_id: String,
    pub date: NaiveDate,
    pub description: String,
    pub zip: Option<AttachmentBundle>,
    pub uploaded_by: UserRef,
    pub status: RecordStatus,
    pub approved_by: Option<UserRef>,
    pub approved_at: Option<DateTime<Utc>>,
    pub comments: Vec<ThreadComment>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProgressListing {
    pub fn populate(progress: Progress, usernames: &HashMap<Uuid, String>) -> Self {
        Self {
            id: progress.id,
            progress_id: progress.progress_id,
            date: progress.date,
            description: progress.description,
            zip: progress.zip,
            uploaded_by: UserRef::resolve(progress.uploaded_by, usernames),
            status: progress.status,
            approved_by: progress.approved_by.map(|id| UserRef::resolve(id, usernames)),
            approved_at: progress.approved_at,
            comments: progress.comments,
            created_at: progress.created_at,
            updated_at: progress.updated_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewProgress {
    pub date: NaiveDate,
    pub description: String,
    pub zip: Option<AttachmentBundle>,
    pub uploaded_by: Uuid,
}

/// Formats the business identifier for the `n`th progress update.
pub fn progress_id(n: i64) -> String {
    format!("Progress#{}", n)
}
