// Copyright (c) Linknest Team
// SPDX-License-Identifier: Apache-2.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Id;

/// A registered user. Relationship arrays are mutated only by the
/// relationship engine; the unread cache only by the unread aggregator.
///
/// Invariant: for any pair (A, B) at most one of {no relation, A sent
/// pending, B sent pending, linked} holds, and `links` is symmetric.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Id,
    pub username: String,
    pub full_name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub avatar_url: Option<String>,
    /// Users this user has a pending outgoing link request to.
    pub sent_links: Vec<Id>,
    /// Users with a pending incoming link request to this user.
    pub received_links: Vec<Id>,
    /// Established links (symmetric on both sides).
    pub links: Vec<Id>,
    /// Cached unread aggregate, kept in step by the unread aggregator.
    pub unreads: UserUnreads,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserUnreads {
    pub notifications_unreads: u64,
    pub messages_unreads: u64,
}

impl UserUnreads {
    pub fn total(&self) -> u64 {
        self.notifications_unreads + self.messages_unreads
    }
}

/// Public projection of a user, embedded in events and API responses.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: Id,
    pub username: String,
    pub full_name: String,
    pub avatar_url: Option<String>,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        UserSummary {
            id: user.id.clone(),
            username: user.username.clone(),
            full_name: user.full_name.clone(),
            avatar_url: user.avatar_url.clone(),
        }
    }
}
