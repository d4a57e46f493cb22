// Copyright (c) Linknest Team
// SPDX-License-Identifier: Apache-2.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::CommentView;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PostAction {
    Like,
    Unlike,
    CommentAdded,
    CommentDeleted,
}

/// Published to `POST_UPDATED_<postId>`. Like/unlike carry the acting user
/// and the new total; comment actions carry the populated comment (or just
/// its id on delete) and the new comment count.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostUpdateEvent {
    pub post_id: String,
    pub action: PostAction,
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub likes_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comments_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<CommentView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}
