// Copyright (c) Linknest Team
// SPDX-License-Identifier: Apache-2.0

//! Typed payloads published onto the fan-out layer. These shapes are the
//! wire contract between the engines and whatever transport delivers
//! subscriptions, so fields serialize in camelCase and enums in
//! SCREAMING_SNAKE_CASE.

pub mod link_events;
pub mod message_events;
pub mod notification_events;
pub mod post_events;

pub use link_events::{LinkStatus, LinkUpdateEvent};
pub use message_events::{ConversationUpdatedEvent, MessageReceivedEvent, UserUnreadsEvent};
pub use notification_events::{NotificationEvent, NotificationUpdateType};
pub use post_events::{PostAction, PostUpdateEvent};
