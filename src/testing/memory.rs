use std::cmp::Ordering;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::database::{DatabaseError, RecordFilter, Store};
use crate::models::progress::progress_id;
use crate::models::{
    Account, Comment, CommentTarget, Decision, NewAccount, NewComment, NewFile, NewPayment,
    NewProgress, Payment, Progress, RecordStatus, Role, StoredFile, ThreadComment, UserRef,
};
use crate::types::DateOrder;

/// `Store` kept in process memory with the same contract as `PgStore`.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

#[derive(Default)]
struct Tables {
    accounts: Vec<Account>,
    progress: Vec<Progress>,
    progress_seq: i64,
    payments: Vec<Payment>,
    comments: Vec<CommentRow>,
    files: Vec<StoredFile>,
}

struct CommentRow {
    id: Uuid,
    item_id: Uuid,
    item_type: CommentTarget,
    text: String,
    user_id: Uuid,
    created_at: DateTime<Utc>,
}

impl Tables {
    fn comment(&self, row: &CommentRow) -> Comment {
        let username = self
            .accounts
            .iter()
            .find(|a| a.id == row.user_id)
            .map(|a| a.username.clone())
            .unwrap_or_default();
        Comment {
            id: row.id,
            item_id: row.item_id,
            item_type: row.item_type,
            text: row.text.clone(),
            user: UserRef {
                id: row.user_id,
                username,
            },
            created_at: row.created_at,
        }
    }

    fn references(&self, user: Uuid) -> bool {
        self.progress.iter().any(|p| p.uploaded_by == user || p.approved_by == Some(user))
            || self.payments.iter().any(|p| p.created_by == user || p.approved_by == Some(user))
            || self.comments.iter().any(|c| c.user_id == user)
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn selected(filter: &RecordFilter, status: RecordStatus, owner: Uuid, date: NaiveDate) -> bool {
    filter.status.map_or(true, |s| s == status)
        && filter.owner.map_or(true, |o| o == owner)
        && filter.range.contains(date)
}

fn by_date(order: DateOrder, a: (NaiveDate, DateTime<Utc>), b: (NaiveDate, DateTime<Utc>)) -> Ordering {
    match order {
        DateOrder::Ascending => a.cmp(&b),
        DateOrder::Descending => b.cmp(&a),
    }
}

fn apply_decision(
    status: &mut RecordStatus,
    approved_by: &mut Option<Uuid>,
    approved_at: &mut Option<DateTime<Utc>>,
    comments: &mut Vec<ThreadComment>,
    updated_at: &mut DateTime<Utc>,
    decision: &Decision,
) -> Result<(), DatabaseError> {
    if *status != RecordStatus::Pending {
        return Err(DatabaseError::NotPending(*status));
    }
    *status = decision.status;
    *approved_by = Some(decision.actor);
    *approved_at = Some(decision.at);
    comments.extend(decision.comment.clone());
    *updated_at = decision.at;
    Ok(())
}

#[async_trait]
impl Store for MemoryStore {
    async fn health_check(&self) -> Result<(), DatabaseError> {
        Ok(())
    }

    async fn create_account(&self, account: NewAccount) -> Result<Account, DatabaseError> {
        let mut tables = self.tables.write().await;
        if tables.accounts.iter().any(|a| a.username == account.username) {
            return Err(DatabaseError::Duplicate("username"));
        }
        if tables.accounts.iter().any(|a| a.email == account.email) {
            return Err(DatabaseError::Duplicate("email"));
        }
        let now = Utc::now();
        let created = Account {
            id: Uuid::new_v4(),
            username: account.username,
            email: account.email,
            password: account.password,
            role: account.role,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        tables.accounts.push(created.clone());
        Ok(created)
    }

    async fn find_account(&self, id: Uuid) -> Result<Option<Account>, DatabaseError> {
        Ok(self.tables.read().await.accounts.iter().find(|a| a.id == id).cloned())
    }

    async fn find_account_by_username(&self, username: &str) -> Result<Option<Account>, DatabaseError> {
        Ok(self
            .tables
            .read()
            .await
            .accounts
            .iter()
            .find(|a| a.username == username)
            .cloned())
    }

    async fn list_accounts(&self) -> Result<Vec<Account>, DatabaseError> {
        Ok(self.tables.read().await.accounts.clone())
    }

    async fn set_account_active(&self, id: Uuid, active: bool) -> Result<Account, DatabaseError> {
        let mut tables = self.tables.write().await;
        let account = tables
            .accounts
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| DatabaseError::NotFound(format!("user {}", id)))?;
        account.is_active = active;
        account.updated_at = Utc::now();
        Ok(account.clone())
    }

    async fn delete_account(&self, id: Uuid) -> Result<Account, DatabaseError> {
        let mut tables = self.tables.write().await;
        let index = tables
            .accounts
            .iter()
            .position(|a| a.id == id)
            .ok_or_else(|| DatabaseError::NotFound(format!("user {}", id)))?;
        if tables.references(id) {
            return Err(DatabaseError::StillReferenced(format!("user {} owns records", id)));
        }
        Ok(tables.accounts.remove(index))
    }

    async fn role_exists(&self, role: Role) -> Result<bool, DatabaseError> {
        Ok(self.tables.read().await.accounts.iter().any(|a| a.role == role))
    }

    async fn create_progress(&self, progress: NewProgress) -> Result<Progress, DatabaseError> {
        let mut tables = self.tables.write().await;
        tables.progress_seq += 1;
        let now = Utc::now();
        let created = Progress {
            id: Uuid::new_v4(),
            progress_id: progress_id(tables.progress_seq),
            date: progress.date,
            description: progress.description,
            zip: progress.zip,
            uploaded_by: progress.uploaded_by,
            status: RecordStatus::Pending,
            approved_by: None,
            approved_at: None,
            comments: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        tables.progress.push(created.clone());
        Ok(created)
    }

    async fn find_progress(&self, id: Uuid) -> Result<Option<Progress>, DatabaseError> {
        Ok(self.tables.read().await.progress.iter().find(|p| p.id == id).cloned())
    }

    async fn list_progress(&self, filter: &RecordFilter) -> Result<Vec<Progress>, DatabaseError> {
        let mut rows: Vec<Progress> = self
            .tables
            .read()
            .await
            .progress
            .iter()
            .filter(|p| selected(filter, p.status, p.uploaded_by, p.date))
            .cloned()
            .collect();
        rows.sort_by(|a, b| by_date(filter.order, (a.date, a.created_at), (b.date, b.created_at)));
        Ok(rows)
    }

    async fn update_progress_description(&self, id: Uuid, description: &str) -> Result<Progress, DatabaseError> {
        let mut tables = self.tables.write().await;
        let progress = tables
            .progress
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| DatabaseError::NotFound(format!("progress record {}", id)))?;
        if progress.status != RecordStatus::Pending {
            return Err(DatabaseError::NotPending(progress.status));
        }
        progress.description = description.to_string();
        progress.updated_at = Utc::now();
        Ok(progress.clone())
    }

    async fn decide_progress(&self, id: Uuid, decision: &Decision) -> Result<Progress, DatabaseError> {
        let mut tables = self.tables.write().await;
        let p = tables
            .progress
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| DatabaseError::NotFound(format!("progress record {}", id)))?;
        apply_decision(
            &mut p.status,
            &mut p.approved_by,
            &mut p.approved_at,
            &mut p.comments,
            &mut p.updated_at,
            decision,
        )?;
        Ok(p.clone())
    }

    async fn append_progress_comment(&self, id: Uuid, comment: &ThreadComment) -> Result<Progress, DatabaseError> {
        let mut tables = self.tables.write().await;
        let progress = tables
            .progress
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| DatabaseError::NotFound(format!("progress record {}", id)))?;
        progress.comments.push(comment.clone());
        Ok(progress.clone())
    }

    async fn create_payment(&self, payment: NewPayment) -> Result<Payment, DatabaseError> {
        let mut tables = self.tables.write().await;
        if tables.payments.iter().any(|p| p.payment_id == payment.payment_id) {
            return Err(DatabaseError::Duplicate("paymentID"));
        }
        let now = Utc::now();
        let created = Payment {
            id: Uuid::new_v4(),
            payment_id: payment.payment_id,
            date: payment.date,
            amount: payment.amount,
            description: payment.description,
            remarks: payment.remarks,
            created_by: payment.created_by,
            status: RecordStatus::Pending,
            approved_by: None,
            approved_at: None,
            comments: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        tables.payments.push(created.clone());
        Ok(created)
    }

    async fn find_payment(&self, id: Uuid) -> Result<Option<Payment>, DatabaseError> {
        Ok(self.tables.read().await.payments.iter().find(|p| p.id == id).cloned())
    }

    async fn list_payments(&self, filter: &RecordFilter) -> Result<Vec<Payment>, DatabaseError> {
        let mut rows: Vec<Payment> = self
            .tables
            .read()
            .await
            .payments
            .iter()
            .filter(|p| selected(filter, p.status, p.created_by, p.date))
            .cloned()
            .collect();
        rows.sort_by(|a, b| by_date(filter.order, (a.date, a.created_at), (b.date, b.created_at)));
        Ok(rows)
    }

    async fn decide_payment(&self, payment_id: &str, decision: &Decision) -> Result<Payment, DatabaseError> {
        let mut tables = self.tables.write().await;
        let p = tables
            .payments
            .iter_mut()
            .find(|p| p.payment_id == payment_id)
            .ok_or_else(|| DatabaseError::NotFound(format!("payments record {}", payment_id)))?;
        apply_decision(
            &mut p.status,
            &mut p.approved_by,
            &mut p.approved_at,
            &mut p.comments,
            &mut p.updated_at,
            decision,
        )?;
        Ok(p.clone())
    }

    async fn append_payment_comment(&self, id: Uuid, comment: &ThreadComment) -> Result<Payment, DatabaseError> {
        let mut tables = self.tables.write().await;
        let payment = tables
            .payments
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| DatabaseError::NotFound(format!("payments record {}", id)))?;
        payment.comments.push(comment.clone());
        Ok(payment.clone())
    }

    async fn delete_pending_payment(&self, id: Uuid) -> Result<Payment, DatabaseError> {
        let mut tables = self.tables.write().await;
        let index = tables
            .payments
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(|| DatabaseError::NotFound(format!("payments record {}", id)))?;
        let status = tables.payments[index].status;
        if status != RecordStatus::Pending {
            return Err(DatabaseError::NotPending(status));
        }
        Ok(tables.payments.remove(index))
    }

    async fn create_comment(&self, comment: NewComment) -> Result<Comment, DatabaseError> {
        let mut tables = self.tables.write().await;
        if !tables.accounts.iter().any(|a| a.id == comment.user_id) {
            return Err(DatabaseError::StillReferenced(format!("user {} does not exist", comment.user_id)));
        }
        let row = CommentRow {
            id: Uuid::new_v4(),
            item_id: comment.item_id,
            item_type: comment.item_type,
            text: comment.text,
            user_id: comment.user_id,
            created_at: Utc::now(),
        };
        let created = tables.comment(&row);
        tables.comments.push(row);
        Ok(created)
    }

    async fn list_comments(&self, item_id: Uuid, item_type: CommentTarget) -> Result<Vec<Comment>, DatabaseError> {
        let tables = self.tables.read().await;
        let mut comments: Vec<Comment> = tables
            .comments
            .iter()
            .filter(|c| c.item_id == item_id && c.item_type == item_type)
            .map(|c| tables.comment(c))
            .collect();
        // Newest first; later inserts win ties.
        comments.reverse();
        comments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(comments)
    }

    async fn create_file(&self, file: NewFile) -> Result<StoredFile, DatabaseError> {
        let mut tables = self.tables.write().await;
        if tables.files.iter().any(|f| f.drive_id == file.drive_id) {
            return Err(DatabaseError::Duplicate("driveId"));
        }
        let created = StoredFile {
            id: Uuid::new_v4(),
            title: file.title,
            drive_id: file.drive_id,
            mime_type: file.mime_type,
            uploaded_at: Utc::now(),
        };
        tables.files.push(created.clone());
        Ok(created)
    }

    async fn list_files(&self) -> Result<Vec<StoredFile>, DatabaseError> {
        let mut files = self.tables.read().await.files.clone();
        files.reverse();
        files.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at));
        Ok(files)
    }

    async fn find_file_by_drive_id(&self, drive_id: &str) -> Result<Option<StoredFile>, DatabaseError> {
        Ok(self
            .tables
            .read()
            .await
            .files
            .iter()
            .find(|f| f.drive_id == drive_id)
            .cloned())
    }

    async fn delete_file(&self, id: Uuid) -> Result<(), DatabaseError> {
        let mut tables = self.tables.write().await;
        let before = tables.files.len();
        tables.files.retain(|f| f.id != id);
        if tables.files.len() == before {
            return Err(DatabaseError::NotFound(format!("file {}", id)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[tokio::test]
    async fn progress_ids_are_sequential() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();
        let new = || NewProgress {
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            description: "x".into(),
            zip: None,
            uploaded_by: owner,
        };
        assert_eq!(store.create_progress(new()).await.unwrap().progress_id, "Progress#1");
        assert_eq!(store.create_progress(new()).await.unwrap().progress_id, "Progress#2");
    }

    #[tokio::test]
    async fn decided_payments_cannot_be_deleted() {
        let store = MemoryStore::new();
        let payment = store
            .create_payment(NewPayment {
                payment_id: "PAY-1".into(),
                date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                amount: Decimal::from(10),
                description: None,
                remarks: None,
                created_by: Uuid::new_v4(),
            })
            .await
            .unwrap();
        let decision = Decision {
            status: RecordStatus::Rejected,
            actor: Uuid::new_v4(),
            at: Utc::now(),
            comment: None,
        };
        store.decide_payment("PAY-1", &decision).await.unwrap();

        assert!(matches!(
            store.delete_pending_payment(payment.id).await,
            Err(DatabaseError::NotPending(RecordStatus::Rejected))
        ));
        assert!(matches!(
            store.delete_pending_payment(Uuid::new_v4()).await,
            Err(DatabaseError::NotFound(_))
        ));
    }
}
