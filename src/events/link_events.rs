// Copyright (c) Linknest Team
// SPDX-License-Identifier: Apache-2.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::UserSummary;

/// Viewer-relative state of a link after a relationship mutation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LinkStatus {
    /// The viewer has a pending outgoing request to `user`.
    Sent,
    /// The viewer has a pending incoming request from `user` (accept-eligible).
    Received,
    Linked,
    Withdrawn,
    Rejected,
    Removed,
}

/// Published to `LINK_REQUEST_UPDATED_<userId>` for each affected party,
/// with the status tagged from that party's point of view.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkUpdateEvent {
    /// The other party of the relationship, from the subscriber's side.
    pub user: UserSummary,
    pub status: LinkStatus,
    /// The subscriber's link count after the mutation.
    pub total_links: u64,
    pub updated_at: DateTime<Utc>,
}
