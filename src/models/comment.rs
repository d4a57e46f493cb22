// Copyright (c) Linknest Team
// SPDX-License-Identifier: Apache-2.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::user::UserSummary;
use super::Id;

/// A comment on a post. `parent_comment_id == None` marks a top-level
/// comment; replies are strictly one level deep and always point at a
/// top-level comment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: Id,
    pub seq: u64,
    pub post_id: Id,
    pub user_id: Id,
    pub text: String,
    pub parent_comment_id: Option<Id>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentView {
    pub id: Id,
    pub post_id: Id,
    pub user: UserSummary,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_comment_id: Option<Id>,
    pub reply_count: u64,
    pub like_count: u64,
    pub has_liked: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
