// Copyright (c) Linknest Team
// SPDX-License-Identifier: Apache-2.0

pub mod comment;
pub mod conversation;
pub mod message;
pub mod notification;
pub mod post;
pub mod user;

pub use comment::{Comment, CommentView};
pub use conversation::{Conversation, ConversationKind, ConversationView};
pub use message::{Attachment, Message, MessageType, MessageView};
pub use notification::{
    Notification, NotificationAction, NotificationSource, NotificationStatus, NotificationType,
    NotificationView,
};
pub use post::{Post, PostKind, PostView};
pub use user::{User, UserSummary, UserUnreads};

/// Entity identifier (uuid v4 string).
pub type Id = String;
