use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::database::{DatabaseError, RecordFilter, Store};
use crate::models::{Account, Decision, Payment, Progress, RecordStatus, Role, ThreadComment};
use crate::types::{DateOrder, DateRange};

#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("'{0}' is not a valid decision")]
    InvalidTarget(RecordStatus),

    #[error("{0}")]
    NotPermitted(String),

    #[error(transparent)]
    Store(#[from] DatabaseError),
}

/// The pending → approved | rejected state machine shared by progress
/// updates and payments. Terminal states never change again.
pub struct ApprovalService {
    store: Arc<dyn Store>,
}

impl ApprovalService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn decide_progress(
        &self,
        id: Uuid,
        target: RecordStatus,
        actor: &Account,
        comment: Option<&str>,
    ) -> Result<Progress, WorkflowError> {
        let decision = decision(target, actor, comment)?;
        let progress = self.store.decide_progress(id, &decision).await?;
        tracing::info!("{} marked {} as {}", actor.username, progress.progress_id, target);
        Ok(progress)
    }

    pub async fn decide_payment(
        &self,
        payment_id: &str,
        target: RecordStatus,
        actor: &Account,
        comment: Option<&str>,
    ) -> Result<Payment, WorkflowError> {
        let decision = decision(target, actor, comment)?;
        let payment = self.store.decide_payment(payment_id, &decision).await?;
        tracing::info!("{} marked payment {} as {}", actor.username, payment.payment_id, target);
        Ok(payment)
    }

    /// Removes a payment that has not been decided yet.
    pub async fn delete_payment(&self, id: Uuid, actor: &Account) -> Result<Payment, WorkflowError> {
        if actor.role != Role::PayingAuthority {
            return Err(WorkflowError::NotPermitted(
                "Only paying authorities can delete payments".to_string(),
            ));
        }
        let payment = self.store.delete_pending_payment(id).await?;
        tracing::info!("{} deleted pending payment {}", actor.username, payment.payment_id);
        Ok(payment)
    }

    /// Description edits are open to the uploader and admins while the update is pending.
    pub async fn edit_progress_description(
        &self,
        id: Uuid,
        description: &str,
        actor: &Account,
    ) -> Result<Progress, WorkflowError> {
        let progress = self
            .store
            .find_progress(id)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("progress {}", id)))?;

        if !actor.is_admin() && progress.uploaded_by != actor.id {
            return Err(WorkflowError::NotPermitted(
                "Only the uploader or an admin can edit this progress update".to_string(),
            ));
        }
        if progress.status.is_terminal() {
            return Err(DatabaseError::NotPending(progress.status).into());
        }

        Ok(self.store.update_progress_description(id, description).await?)
    }
}

fn decision(target: RecordStatus, actor: &Account, comment: Option<&str>) -> Result<Decision, WorkflowError> {
    if !actor.is_admin() {
        return Err(WorkflowError::NotPermitted(
            "Only administrators can approve or reject records".to_string(),
        ));
    }
    if !target.is_terminal() {
        return Err(WorkflowError::InvalidTarget(target));
    }

    let at = Utc::now();
    let comment = comment
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(|text| ThreadComment {
            text: text.to_string(),
            user: actor.id,
            created_at: at,
        });

    Ok(Decision {
        status: target,
        actor: actor.id,
        at,
        comment,
    })
}

/// The `status` query parameter of a listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StatusQuery {
    /// Parameter absent: the role decides.
    #[default]
    Default,
    /// `status=all`.
    All,
    Only(RecordStatus),
}

impl StatusQuery {
    pub fn parse(value: Option<&str>) -> Result<Self, String> {
        match value.map(str::trim) {
            None | Some("") => Ok(StatusQuery::Default),
            Some(v) if v.eq_ignore_ascii_case("all") => Ok(StatusQuery::All),
            Some(v) => RecordStatus::parse(v)
                .map(StatusQuery::Only)
                .ok_or_else(|| format!("Unknown status '{}'", v)),
        }
    }

    fn resolve(self, default: Option<RecordStatus>) -> Option<RecordStatus> {
        match self {
            StatusQuery::Default => default,
            StatusQuery::All => None,
            StatusQuery::Only(status) => Some(status),
        }
    }
}

/// Which progress updates `viewer` may list.
pub fn progress_scope(viewer: &Account, status: StatusQuery, range: DateRange) -> RecordFilter {
    let (status, owner) = match viewer.role {
        Role::Viewer => (Some(RecordStatus::Approved), None),
        Role::SiteEngineer => (status.resolve(None), Some(viewer.id)),
        Role::PayingAuthority => (status.resolve(None), None),
        Role::Admin => (status.resolve(Some(RecordStatus::Pending)), None),
    };
    RecordFilter {
        status,
        owner,
        range,
        order: DateOrder::Descending,
    }
}

/// Which payments `viewer` may list.
pub fn payment_scope(viewer: &Account, status: StatusQuery, range: DateRange) -> RecordFilter {
    let (status, owner) = match viewer.role {
        Role::PayingAuthority => (status.resolve(None), Some(viewer.id)),
        Role::Admin => (status.resolve(Some(RecordStatus::Pending)), None),
        Role::Viewer | Role::SiteEngineer => (Some(RecordStatus::Approved), None),
    };
    RecordFilter {
        status,
        owner,
        range,
        order: DateOrder::Descending,
    }
}
