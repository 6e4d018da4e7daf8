use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::collections::HashMap;

use super::comment::UserRef;
use super::record::{RecordStatus, ThreadComment};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: Uuid,
    #[serde(rename = "paymentID")]
    pub payment_id: String,
    pub date: NaiveDate,
    pub amount: Decimal,
    pub description: Option<String>,
    pub remarks: Option<String>,
    pub created_by: Uuid,
    pub status: RecordStatus,
    pub approved_by: Option<Uuid>,
    pub approved_at: Option<DateTime<Utc>>,
    pub comments: Vec<ThreadComment>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A payment as listed, with creator and approver resolved to usernames.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentListing {
    pub id: Uuid,
    #[serde(rename = "paymentID")]
    pub payment_id: String,
    pub date: NaiveDate,
    pub amount: Decimal,
    pub description: Option<String>,
    pub remarks: Option<String>,
    pub created_by: UserRef,
    pub status: RecordStatus,
    pub approved_by: Option<UserRef>,
    pub approved_at: Option<DateTime<Utc>>,
    pub comments: Vec<ThreadComment>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PaymentListing {
    pub fn populate(payment: Payment, usernames: &HashMap<Uuid, String>) -> Self {
        Self {
            id: payment.id,
            payment_id: payment.payment_id,
            date: payment.date,
            amount: payment.amount,
            description: payment.description,
            remarks: payment.remarks,
            created_by: UserRef::resolve(payment.created_by, usernames),
            status: payment.status,
            approved_by: payment.approved_by.map(|id| UserRef::resolve(id, usernames)),
            approved_at: payment.approved_at,
            comments: payment.comments,
            created_at: payment.created_at,
            updated_at: payment.updated_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewPayment {
    pub payment_id: String,
    pub date: NaiveDate,
    pub amount: Decimal,
    pub description: Option<String>,
    pub remarks: Option<String>,
    pub created_by: Uuid,
}
