// Copyright (c) Linknest Team
// SPDX-License-Identifier: Apache-2.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::user::UserSummary;
use super::Id;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Text,
    Image,
    Video,
    Audio,
    File,
    Pdf,
    Other,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Text => "text",
            MessageType::Image => "image",
            MessageType::Video => "video",
            MessageType::Audio => "audio",
            MessageType::File => "file",
            MessageType::Pdf => "pdf",
            MessageType::Other => "other",
        }
    }
}

impl FromStr for MessageType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(MessageType::Text),
            "image" => Ok(MessageType::Image),
            "video" => Ok(MessageType::Video),
            "audio" => Ok(MessageType::Audio),
            "file" => Ok(MessageType::File),
            "pdf" => Ok(MessageType::Pdf),
            "other" => Ok(MessageType::Other),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub url: String,
    pub file_type: MessageType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

/// A message in a conversation. Never physically removed; `deleted_for`
/// hides it per user and `seen_by` accumulates read receipts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Id,
    /// Process-wide monotonic sequence, used for stable ordering.
    pub seq: u64,
    pub conversation_id: Id,
    pub sender_id: Id,
    pub text: Option<String>,
    pub attachments: Vec<Attachment>,
    pub seen_by: Vec<Id>,
    pub deleted_for: Vec<Id>,
    pub created_at: DateTime<Utc>,
}

/// Viewer-relative projection of a message. `is_sender_you` is an
/// identity-relative boolean and must be computed per viewer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageView {
    pub id: Id,
    pub conversation_id: Id,
    pub sender: UserSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    pub attachments: Vec<Attachment>,
    pub is_sender_you: bool,
    pub seen_by: Vec<Id>,
    pub created_at: DateTime<Utc>,
}
