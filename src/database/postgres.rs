use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use sqlx::{FromRow, Postgres, QueryBuilder};
use tracing::info;
use uuid::Uuid;

use super::{DatabaseError, RecordFilter, Store};
use crate::config::DatabaseConfig;
use crate::models::{
    Account, AttachmentBundle, Comment, CommentTarget, Decision, NewAccount, NewComment, NewFile,
    NewPayment, NewProgress, Payment, Progress, RecordStatus, Role, StoredFile, ThreadComment,
    UserRef,
};
use crate::types::DateOrder;

/// PostgreSQL-backed record store. Cheap to clone; wraps a connection pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

#[derive(FromRow)]
struct ProgressRow {
    id: Uuid,
    progress_id: String,
    date: NaiveDate,
    description: String,
    zip: Option<Json<AttachmentBundle>>,
    uploaded_by: Uuid,
    status: RecordStatus,
    approved_by: Option<Uuid>,
    approved_at: Option<DateTime<Utc>>,
    comments: Json<Vec<ThreadComment>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProgressRow> for Progress {
    fn from(row: ProgressRow) -> Self {
        Self {
            id: row.id,
            progress_id: row.progress_id,
            date: row.date,
            description: row.description,
            zip: row.zip.map(|Json(bundle)| bundle),
            uploaded_by: row.uploaded_by,
            status: row.status,
            approved_by: row.approved_by,
            approved_at: row.approved_at,
            comments: row.comments.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(FromRow)]
struct PaymentRow {
    id: Uuid,
    payment_id: String,
    date: NaiveDate,
    amount: Decimal,
    description: Option<String>,
    remarks: Option<String>,
    created_by: Uuid,
    status: RecordStatus,
    approved_by: Option<Uuid>,
    approved_at: Option<DateTime<Utc>>,
    comments: Json<Vec<ThreadComment>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<PaymentRow> for Payment {
    fn from(row: PaymentRow) -> Self {
        Self {
            id: row.id,
            payment_id: row.payment_id,
            date: row.date,
            amount: row.amount,
            description: row.description,
            remarks: row.remarks,
            created_by: row.created_by,
            status: row.status,
            approved_by: row.approved_by,
            approved_at: row.approved_at,
            comments: row.comments.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(FromRow)]
struct CommentRow {
    id: Uuid,
    item_id: Uuid,
    item_type: CommentTarget,
    text: String,
    created_at: DateTime<Utc>,
    user_id: Uuid,
    username: String,
}

impl From<CommentRow> for Comment {
    fn from(row: CommentRow) -> Self {
        Self {
            id: row.id,
            item_id: row.item_id,
            item_type: row.item_type,
            text: row.text,
            user: UserRef {
                id: row.user_id,
                username: row.username,
            },
            created_at: row.created_at,
        }
    }
}

impl PgStore {
    /// Connects, runs embedded migrations and returns a ready store.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, DatabaseError> {
        if config.url.is_empty() {
            return Err(DatabaseError::ConfigMissing("DATABASE_URL"));
        }

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout))
            .connect(&config.url)
            .await
            .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| DatabaseError::MigrationError(e.to_string()))?;

        info!("Database pool ready ({} max connections)", config.max_connections);
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn close(&self) {
        self.pool.close().await;
        info!("Closed database pool");
    }

    /// Explains why a conditional update on a submitted record matched no row.
    async fn explain_miss(&self, table: &'static str, key_column: &'static str, key: KeyRef<'_>) -> DatabaseError {
        let sql = format!("SELECT status FROM {} WHERE {} = $1", table, key_column);
        let query = sqlx::query_scalar::<_, RecordStatus>(&sql);
        let query = match key {
            KeyRef::Id(id) => query.bind(id),
            KeyRef::Business(value) => query.bind(value.to_string()),
        };
        match query.fetch_optional(&self.pool).await {
            Ok(Some(status)) => DatabaseError::NotPending(status),
            Ok(None) => DatabaseError::NotFound(format!("{} record {}", table, key)),
            Err(e) => DatabaseError::Sqlx(e),
        }
    }
}

#[derive(Clone, Copy)]
enum KeyRef<'a> {
    Id(Uuid),
    Business(&'a str),
}

impl std::fmt::Display for KeyRef<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyRef::Id(id) => write!(f, "{}", id),
            KeyRef::Business(value) => f.write_str(value),
        }
    }
}

/// Maps unique and foreign-key violations onto store errors.
fn map_write_error(err: sqlx::Error) -> DatabaseError {
    if let sqlx::Error::Database(db) = &err {
        match db.code().as_deref() {
            Some("23505") => {
                let field = match db.constraint() {
                    Some("users_username_key") => "username",
                    Some("users_email_key") => "email",
                    Some("payments_payment_id_key") => "paymentID",
                    Some("progress_progress_id_key") => "progressID",
                    Some("files_drive_id_key") => "driveId",
                    _ => "key",
                };
                return DatabaseError::Duplicate(field);
            }
            Some("23503") => return DatabaseError::StillReferenced(db.message().to_string()),
            _ => {}
        }
    }
    DatabaseError::Sqlx(err)
}

fn push_record_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &RecordFilter, owner_column: &'static str) {
    if let Some(status) = filter.status {
        qb.push(" AND status = ").push_bind(status);
    }
    if let Some(owner) = filter.owner {
        qb.push(" AND ").push(owner_column).push(" = ").push_bind(owner);
    }
    if let Some(start) = filter.range.start {
        qb.push(" AND date >= ").push_bind(start);
    }
    if let Some(end) = filter.range.end {
        qb.push(" AND date <= ").push_bind(end);
    }
    qb.push(match filter.order {
        DateOrder::Ascending => " ORDER BY date ASC, created_at ASC",
        DateOrder::Descending => " ORDER BY date DESC, created_at DESC",
    });
}

#[async_trait]
impl Store for PgStore {
    async fn health_check(&self) -> Result<(), DatabaseError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn create_account(&self, account: NewAccount) -> Result<Account, DatabaseError> {
        sqlx::query_as::<_, Account>(
            "INSERT INTO users (id, username, email, password, role) VALUES ($1, $2, $3, $4, $5) RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(&account.username)
        .bind(&account.email)
        .bind(&account.password)
        .bind(account.role)
        .fetch_one(&self.pool)
        .await
        .map_err(map_write_error)
    }

    async fn find_account(&self, id: Uuid) -> Result<Option<Account>, DatabaseError> {
        Ok(sqlx::query_as::<_, Account>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_account_by_username(&self, username: &str) -> Result<Option<Account>, DatabaseError> {
        Ok(sqlx::query_as::<_, Account>("SELECT * FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list_accounts(&self) -> Result<Vec<Account>, DatabaseError> {
        Ok(sqlx::query_as::<_, Account>("SELECT * FROM users ORDER BY created_at ASC")
            .fetch_all(&self.pool)
            .await?)
    }

    async fn set_account_active(&self, id: Uuid, active: bool) -> Result<Account, DatabaseError> {
        sqlx::query_as::<_, Account>(
            "UPDATE users SET is_active = $2, updated_at = now() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(active)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DatabaseError::NotFound(format!("user {}", id)))
    }

    async fn delete_account(&self, id: Uuid) -> Result<Account, DatabaseError> {
        sqlx::query_as::<_, Account>("DELETE FROM users WHERE id = $1 RETURNING *")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_write_error)?
            .ok_or_else(|| DatabaseError::NotFound(format!("user {}", id)))
    }

    async fn role_exists(&self, role: Role) -> Result<bool, DatabaseError> {
        Ok(sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM users WHERE role = $1)")
            .bind(role)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn create_progress(&self, progress: NewProgress) -> Result<Progress, DatabaseError> {
        sqlx::query_as::<_, ProgressRow>(
            r#"
            INSERT INTO progress (id, progress_id, date, description, zip, uploaded_by)
            VALUES ($1, 'Progress#' || nextval('progress_number_seq'), $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(progress.date)
        .bind(&progress.description)
        .bind(progress.zip.map(Json))
        .bind(progress.uploaded_by)
        .fetch_one(&self.pool)
        .await
        .map(Progress::from)
        .map_err(map_write_error)
    }

    async fn find_progress(&self, id: Uuid) -> Result<Option<Progress>, DatabaseError> {
        Ok(sqlx::query_as::<_, ProgressRow>("SELECT * FROM progress WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(Progress::from))
    }

    async fn list_progress(&self, filter: &RecordFilter) -> Result<Vec<Progress>, DatabaseError> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT * FROM progress WHERE TRUE");
        push_record_filter(&mut qb, filter, "uploaded_by");
        let rows = qb.build_query_as::<ProgressRow>().fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(Progress::from).collect())
    }

    async fn update_progress_description(&self, id: Uuid, description: &str) -> Result<Progress, DatabaseError> {
        let row = sqlx::query_as::<_, ProgressRow>(
            r#"
            UPDATE progress SET description = $2, updated_at = now()
            WHERE id = $1 AND status = 'pending'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(description)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(row.into()),
            None => Err(self.explain_miss("progress", "id", KeyRef::Id(id)).await),
        }
    }

    async fn decide_progress(&self, id: Uuid, decision: &Decision) -> Result<Progress, DatabaseError> {
        let appended: Vec<ThreadComment> = decision.comment.iter().cloned().collect();
        let row = sqlx::query_as::<_, ProgressRow>(
            r#"
            UPDATE progress
            SET status = $2, approved_by = $3, approved_at = $4,
                comments = comments || $5, updated_at = $4
            WHERE id = $1 AND status = 'pending'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(decision.status)
        .bind(decision.actor)
        .bind(decision.at)
        .bind(Json(appended))
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(row.into()),
            None => Err(self.explain_miss("progress", "id", KeyRef::Id(id)).await),
        }
    }

    async fn append_progress_comment(&self, id: Uuid, comment: &ThreadComment) -> Result<Progress, DatabaseError> {
        sqlx::query_as::<_, ProgressRow>(
            "UPDATE progress SET comments = comments || $2, updated_at = now() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(Json(vec![comment.clone()]))
        .fetch_optional(&self.pool)
        .await?
        .map(Progress::from)
        .ok_or_else(|| DatabaseError::NotFound(format!("progress record {}", id)))
    }

    async fn create_payment(&self, payment: NewPayment) -> Result<Payment, DatabaseError> {
        sqlx::query_as::<_, PaymentRow>(
            r#"
            INSERT INTO payments (id, payment_id, date, amount, description, remarks, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&payment.payment_id)
        .bind(payment.date)
        .bind(payment.amount)
        .bind(&payment.description)
        .bind(&payment.remarks)
        .bind(payment.created_by)
        .fetch_one(&self.pool)
        .await
        .map(Payment::from)
        .map_err(map_write_error)
    }

    async fn find_payment(&self, id: Uuid) -> Result<Option<Payment>, DatabaseError> {
        Ok(sqlx::query_as::<_, PaymentRow>("SELECT * FROM payments WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(Payment::from))
    }

    async fn list_payments(&self, filter: &RecordFilter) -> Result<Vec<Payment>, DatabaseError> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT * FROM payments WHERE TRUE");
        push_record_filter(&mut qb, filter, "created_by");
        let rows = qb.build_query_as::<PaymentRow>().fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(Payment::from).collect())
    }

    async fn decide_payment(&self, payment_id: &str, decision: &Decision) -> Result<Payment, DatabaseError> {
        let appended: Vec<ThreadComment> = decision.comment.iter().cloned().collect();
        let row = sqlx::query_as::<_, PaymentRow>(
            r#"
            UPDATE payments
            SET status = $2, approved_by = $3, approved_at = $4,
                comments = comments || $5, updated_at = $4
            WHERE payment_id = $1 AND status = 'pending'
            RETURNING *
            "#,
        )
        .bind(payment_id)
        .bind(decision.status)
        .bind(decision.actor)
        .bind(decision.at)
        .bind(Json(appended))
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(row.into()),
            None => Err(self.explain_miss("payments", "payment_id", KeyRef::Business(payment_id)).await),
        }
    }

    async fn append_payment_comment(&self, id: Uuid, comment: &ThreadComment) -> Result<Payment, DatabaseError> {
        sqlx::query_as::<_, PaymentRow>(
            "UPDATE payments SET comments = comments || $2, updated_at = now() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(Json(vec![comment.clone()]))
        .fetch_optional(&self.pool)
        .await?
        .map(Payment::from)
        .ok_or_else(|| DatabaseError::NotFound(format!("payments record {}", id)))
    }

    async fn delete_pending_payment(&self, id: Uuid) -> Result<Payment, DatabaseError> {
        let row = sqlx::query_as::<_, PaymentRow>(
            "DELETE FROM payments WHERE id = $1 AND status = 'pending' RETURNING *",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(row.into()),
            None => Err(self.explain_miss("payments", "id", KeyRef::Id(id)).await),
        }
    }

    async fn create_comment(&self, comment: NewComment) -> Result<Comment, DatabaseError> {
        sqlx::query_as::<_, CommentRow>(
            r#"
            WITH inserted AS (
                INSERT INTO comments (id, item_id, item_type, text, user_id)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING *
            )
            SELECT i.id, i.item_id, i.item_type, i.text, i.created_at, u.id AS user_id, u.username
            FROM inserted i JOIN users u ON u.id = i.user_id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(comment.item_id)
        .bind(comment.item_type)
        .bind(&comment.text)
        .bind(comment.user_id)
        .fetch_one(&self.pool)
        .await
        .map(Comment::from)
        .map_err(map_write_error)
    }

    async fn list_comments(&self, item_id: Uuid, item_type: CommentTarget) -> Result<Vec<Comment>, DatabaseError> {
        let rows = sqlx::query_as::<_, CommentRow>(
            r#"
            SELECT c.id, c.item_id, c.item_type, c.text, c.created_at, u.id AS user_id, u.username
            FROM comments c JOIN users u ON u.id = c.user_id
            WHERE c.item_id = $1 AND c.item_type = $2
            ORDER BY c.created_at DESC
            "#,
        )
        .bind(item_id)
        .bind(item_type)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Comment::from).collect())
    }

    async fn create_file(&self, file: NewFile) -> Result<StoredFile, DatabaseError> {
        sqlx::query_as::<_, StoredFile>(
            "INSERT INTO files (id, title, drive_id, mime_type) VALUES ($1, $2, $3, $4) RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(&file.title)
        .bind(&file.drive_id)
        .bind(&file.mime_type)
        .fetch_one(&self.pool)
        .await
        .map_err(map_write_error)
    }

    async fn list_files(&self) -> Result<Vec<StoredFile>, DatabaseError> {
        Ok(sqlx::query_as::<_, StoredFile>("SELECT * FROM files ORDER BY uploaded_at DESC")
            .fetch_all(&self.pool)
            .await?)
    }

    async fn find_file_by_drive_id(&self, drive_id: &str) -> Result<Option<StoredFile>, DatabaseError> {
        Ok(sqlx::query_as::<_, StoredFile>("SELECT * FROM files WHERE drive_id = $1")
            .bind(drive_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn delete_file(&self, id: Uuid) -> Result<(), DatabaseError> {
        let result = sqlx::query("DELETE FROM files WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("file {}", id)));
        }
        Ok(())
    }
}
