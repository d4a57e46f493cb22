// Copyright (c) Linknest Team
// SPDX-License-Identifier: Apache-2.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::message::MessageView;
use super::user::UserSummary;
use super::Id;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConversationKind {
    Private,
    Group,
}

/// A conversation between participants. PRIVATE conversations always have
/// exactly two participants and are keyed by the unordered pair.
/// Never hard-deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Id,
    pub kind: ConversationKind,
    /// Ordered, unique participant ids.
    pub participants: Vec<Id>,
    pub last_message_id: Option<Id>,
    /// One non-negative counter per participant. After a participant sends a
    /// message their own counter resets to 0 and every other participant's
    /// counter increments by 1; mark-seen resets the caller's counter.
    pub unread_counts: BTreeMap<Id, u64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    pub fn is_participant(&self, user_id: &str) -> bool {
        self.participants.iter().any(|p| p == user_id)
    }

    /// The non-self participant of a PRIVATE conversation, relative to the
    /// requesting viewer.
    pub fn other_participant(&self, viewer_id: &str) -> Option<&Id> {
        if self.kind != ConversationKind::Private {
            return None;
        }
        self.participants.iter().find(|p| p.as_str() != viewer_id)
    }
}

/// Viewer-relative projection of a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationView {
    pub id: Id,
    pub kind: ConversationKind,
    pub participants: Vec<UserSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub other_user: Option<UserSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_message: Option<MessageView>,
    pub my_unread_count: u64,
    pub updated_at: DateTime<Utc>,
}
