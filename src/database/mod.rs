//! Record store: the persistence seam for accounts, submitted records,
//! comments and the file library.
//!
//! Handlers and services only ever see `dyn Store`. The production
//! implementation is [`postgres::PgStore`]; tests use an in-memory store.

pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    Account, Comment, CommentTarget, Decision, NewAccount, NewComment, NewFile, NewPayment,
    NewProgress, Payment, Progress, RecordStatus, Role, StoredFile, ThreadComment,
};
use crate::types::{DateOrder, DateRange};

pub use postgres::PgStore;

/// Errors from the record store
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("{0} must be unique")]
    Duplicate(&'static str),

    #[error("Record is no longer pending (status: {0})")]
    NotPending(RecordStatus),

    #[error("Record is still referenced: {0}")]
    StillReferenced(String),

    #[error("Migration error: {0}")]
    MigrationError(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Which submitted records a listing returns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordFilter {
    /// `None` means any status.
    pub status: Option<RecordStatus>,
    /// Restrict to records created by this account.
    pub owner: Option<Uuid>,
    pub range: DateRange,
    pub order: DateOrder,
}

impl RecordFilter {
    /// Approved records in a date range, oldest first. Used by reports.
    pub fn approved_between(range: DateRange) -> Self {
        Self {
            status: Some(RecordStatus::Approved),
            owner: None,
            range,
            order: DateOrder::Ascending,
        }
    }
}

#[async_trait]
pub trait Store: Send + Sync + 'static {
    async fn health_check(&self) -> Result<(), DatabaseError>;

    // Accounts
    async fn create_account(&self, account: NewAccount) -> Result<Account, DatabaseError>;
    async fn find_account(&self, id: Uuid) -> Result<Option<Account>, DatabaseError>;
    async fn find_account_by_username(&self, username: &str) -> Result<Option<Account>, DatabaseError>;
    async fn list_accounts(&self) -> Result<Vec<Account>, DatabaseError>;
    async fn set_account_active(&self, id: Uuid, active: bool) -> Result<Account, DatabaseError>;
    async fn delete_account(&self, id: Uuid) -> Result<Account, DatabaseError>;
    async fn role_exists(&self, role: Role) -> Result<bool, DatabaseError>;

    // Progress updates
    /// Inserts a pending progress update and assigns the next `Progress#N` identifier.
    async fn create_progress(&self, progress: NewProgress) -> Result<Progress, DatabaseError>;
    async fn find_progress(&self, id: Uuid) -> Result<Option<Progress>, DatabaseError>;
    async fn list_progress(&self, filter: &RecordFilter) -> Result<Vec<Progress>, DatabaseError>;
    /// Fails with `NotPending` once the record has been decided.
    async fn update_progress_description(&self, id: Uuid, description: &str) -> Result<Progress, DatabaseError>;
    /// Applies the decision only if the record is still pending, in one statement.
    async fn decide_progress(&self, id: Uuid, decision: &Decision) -> Result<Progress, DatabaseError>;
    async fn append_progress_comment(&self, id: Uuid, comment: &ThreadComment) -> Result<Progress, DatabaseError>;

    // Payments
    async fn create_payment(&self, payment: NewPayment) -> Result<Payment, DatabaseError>;
    async fn find_payment(&self, id: Uuid) -> Result<Option<Payment>, DatabaseError>;
    async fn list_payments(&self, filter: &RecordFilter) -> Result<Vec<Payment>, DatabaseError>;
    /// Same contract as [`Store::decide_progress`], keyed by the business `paymentID`.
    async fn decide_payment(&self, payment_id: &str, decision: &Decision) -> Result<Payment, DatabaseError>;
    async fn append_payment_comment(&self, id: Uuid, comment: &ThreadComment) -> Result<Payment, DatabaseError>;
    /// Deletes the payment only while it is pending.
    async fn delete_pending_payment(&self, id: Uuid) -> Result<Payment, DatabaseError>;

    // Standalone comments
    async fn create_comment(&self, comment: NewComment) -> Result<Comment, DatabaseError>;
    /// Newest first.
    async fn list_comments(&self, item_id: Uuid, item_type: CommentTarget) -> Result<Vec<Comment>, DatabaseError>;

    // File library
    async fn create_file(&self, file: NewFile) -> Result<StoredFile, DatabaseError>;
    async fn list_files(&self) -> Result<Vec<StoredFile>, DatabaseError>;
    async fn find_file_by_drive_id(&self, drive_id: &str) -> Result<Option<StoredFile>, DatabaseError>;
    async fn delete_file(&self, id: Uuid) -> Result<(), DatabaseError>;
}
