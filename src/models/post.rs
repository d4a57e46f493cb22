// Copyright (c) Linknest Team
// SPDX-License-Identifier: Apache-2.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::user::UserSummary;
use super::Id;

/// The type-specific half of a post, keyed by an explicit discriminant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE", rename_all_fields = "camelCase")]
pub enum PostKind {
    Article { title: String, content: String },
    Image { images: Vec<String> },
    Video { video_url: String },
}

impl PostKind {
    pub fn discriminant(&self) -> &'static str {
        match self {
            PostKind::Article { .. } => "ARTICLE",
            PostKind::Image { .. } => "IMAGE",
            PostKind::Video { .. } => "VIDEO",
        }
    }
}

/// A post. `likes_count` and `comments_count` are denormalized caches of the
/// Like/Comment rows and can drift under races; the interaction engine
/// exposes sync/verify operations to reconcile them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: Id,
    pub seq: u64,
    pub author_id: Id,
    pub caption: Option<String>,
    pub tags: Vec<String>,
    pub kind: PostKind,
    pub likes_count: u64,
    pub comments_count: u64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostView {
    pub id: Id,
    pub author: UserSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    pub tags: Vec<String>,
    #[serde(flatten)]
    pub kind: PostKind,
    pub likes_count: u64,
    pub comments_count: u64,
    pub has_liked: bool,
    pub created_at: DateTime<Utc>,
}
