// Copyright (c) Linknest Team
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};

use crate::models::{ConversationView, MessageView};

/// Published to `CONVERSATION_<userId>` after any mutation that changes a
/// conversation the user participates in. The embedded view is computed for
/// that user (otherUser, myUnreadCount).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationUpdatedEvent {
    pub conversation: ConversationView,
}

/// Published to `MESSAGE_RECEIVED_<conversationId>` when a message is sent.
/// `message.isSenderYou` is identity-relative: it is published as false and
/// rewritten per subscriber by the subscription layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageReceivedEvent {
    pub conversation_id: String,
    pub message: MessageView,
}

/// Published to `USER_UNREADS_<userId>` whenever the cached aggregate moves.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserUnreadsEvent {
    pub notifications_unreads: u64,
    pub messages_unreads: u64,
    pub total: u64,
}
