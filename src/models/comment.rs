use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of record a standalone comment is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "comment_target", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CommentTarget {
    Progress,
    Payment,
}

impl fmt::Display for CommentTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommentTarget::Progress => f.write_str("progress"),
            CommentTarget::Payment => f.write_str("payment"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRef {
    pub id: Uuid,
    pub username: String,
}

impl UserRef {
    /// Resolves a username from a directory of accounts; unknown ids keep an empty name.
    pub fn resolve(id: Uuid, usernames: &HashMap<Uuid, String>) -> Self {
        Self {
            id,
            username: usernames.get(&id).cloned().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: Uuid,
    pub item_id: Uuid,
    #[serde(rename = "type")]
    pub item_type: CommentTarget,
    pub text: String,
    pub user: UserRef,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewComment {
    pub item_id: Uuid,
    pub item_type: CommentTarget,
    pub text: String,
    pub user_id: Uuid,
}
