// Copyright (c) Linknest Team
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};

use crate::models::NotificationView;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationUpdateType {
    New,
    Deleted,
    Read,
    Updated,
    BatchDelete,
}

/// Published to `NOTIFICATION_<userId>` for every notification mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationEvent {
    pub update_type: NotificationUpdateType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification: Option<NotificationView>,
    /// Ids affected by read/delete batches.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub ids: Vec<String>,
    /// Recipient's unread notification count after the mutation.
    pub unread_count: u64,
}
