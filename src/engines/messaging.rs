// Copyright (c) Linknest Team
// SPDX-License-Identifier: Apache-2.0

use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::auth::AuthedUser;
use crate::engines::notification::{NewNotification, NotificationEngine};
use crate::engines::unreads::{UnreadKind, UnreadsEngine};
use crate::error::{AppError, AppResult};
use crate::events::{ConversationUpdatedEvent, MessageReceivedEvent};
use crate::metrics;
use crate::models::{
    Attachment, Conversation, ConversationView, Message, MessageType, MessageView,
    NotificationSource, NotificationType, UserSummary,
};
use crate::pubsub::{EventEnvelope, PubSub, Topic};
use crate::store::Store;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendOutcome {
    pub message: MessageView,
    pub conversation: ConversationView,
    pub conversation_created: bool,
}

/// Conversations, messages and the unread-count bookkeeping around them.
pub struct MessagingEngine {
    store: Arc<Store>,
    bus: Arc<PubSub>,
    notifications: Arc<NotificationEngine>,
    unreads: Arc<UnreadsEngine>,
}

impl MessagingEngine {
    pub fn new(
        store: Arc<Store>,
        bus: Arc<PubSub>,
        notifications: Arc<NotificationEngine>,
        unreads: Arc<UnreadsEngine>,
    ) -> Self {
        MessagingEngine {
            store,
            bus,
            notifications,
            unreads,
        }
    }

    pub async fn send_message(
        &self,
        actor: &AuthedUser,
        recipient_id: &str,
        body: &str,
        message_type: &str,
    ) -> AppResult<SendOutcome> {
        if recipient_id == actor.id {
            return Err(AppError::InvalidArgument(
                "cannot send a message to yourself".to_string(),
            ));
        }
        if body.trim().is_empty() {
            return Err(AppError::InvalidArgument(
                "message body is required".to_string(),
            ));
        }
        let message_type: MessageType = message_type.parse().map_err(|_| {
            AppError::InvalidArgument(format!("unsupported message type: {}", message_type))
        })?;
        let recipient = self.store.require_user(recipient_id).await?;
        let sender = self.store.require_user(&actor.id).await?;

        let (conversation, created) = self
            .store
            .find_or_create_private_conversation(&actor.id, &recipient.id)
            .await;

        // The `text` field doubles as the attachment URL for non-text types.
        let (text, attachments) = match message_type {
            MessageType::Text => (Some(body.to_string()), Vec::new()),
            other => (
                None,
                vec![Attachment {
                    url: body.to_string(),
                    file_type: other,
                    file_name: None,
                    size: None,
                }],
            ),
        };
        let message = Message {
            id: self.store.new_id(),
            seq: self.store.next_seq(),
            conversation_id: conversation.id.clone(),
            sender_id: actor.id.clone(),
            text,
            attachments,
            seen_by: vec![actor.id.clone()],
            deleted_for: Vec::new(),
            created_at: Utc::now(),
        };
        let message = self.store.insert_message(message).await;

        let prev_sender_unread = conversation
            .unread_counts
            .get(&actor.id)
            .copied()
            .unwrap_or(0);
        let conversation = self
            .store
            .modify_conversation(&conversation.id, |c| {
                c.last_message_id = Some(message.id.clone());
                c.updated_at = message.created_at;
                for (participant, count) in c.unread_counts.iter_mut() {
                    if participant == &actor.id {
                        *count = 0;
                    } else {
                        *count += 1;
                    }
                }
            })
            .await?;
        metrics::MUTATIONS
            .with_label_values(&["messaging", "send_message"])
            .inc();

        // Keep the per-user aggregates in step, synchronously.
        self.unreads
            .adjust(&actor.id, UnreadKind::Messages, -(prev_sender_unread as i64))
            .await?;
        for participant in &conversation.participants {
            if participant != &actor.id {
                self.unreads
                    .adjust(participant, UnreadKind::Messages, 1)
                    .await?;
            }
        }

        // One conversationUpdated per participant, each with that
        // participant's own view, then the conversation-wide message event.
        for participant in &conversation.participants {
            let view = self.conversation_view(&conversation, participant).await?;
            self.bus.publish(
                &Topic::Conversation(participant.clone()),
                &ConversationUpdatedEvent { conversation: view },
            );
        }
        self.bus.publish(
            &Topic::MessageReceived(conversation.id.clone()),
            &MessageReceivedEvent {
                conversation_id: conversation.id.clone(),
                // Published viewer-neutral; the subscription layer rewrites
                // isSenderYou per subscriber.
                message: self.message_view(&message, "").await?,
            },
        );

        // First message of a fresh conversation announces the conversation,
        // not the message — never both.
        let (title, description) = if created {
            (
                "New Conversation".to_string(),
                format!("{} started a conversation with you", sender.full_name),
            )
        } else {
            ("New Message".to_string(), message_preview(&sender.full_name, &message))
        };
        self.notifications
            .notify_quietly(NewNotification {
                recipient_id: recipient.id.clone(),
                notification_type: NotificationType::SocialActivity,
                source: Some(NotificationSource {
                    id: sender.id.clone(),
                    name: sender.full_name.clone(),
                    avatar_url: sender.avatar_url.clone(),
                }),
                title,
                description: Some(description),
                image_url: None,
                action: None,
            })
            .await;

        Ok(SendOutcome {
            message: self.message_view(&message, &actor.id).await?,
            conversation: self.conversation_view(&conversation, &actor.id).await?,
            conversation_created: created,
        })
    }

    /// Mark messages seen, optionally scoped to an explicit id list, and
    /// reset the caller's unread counter for the conversation.
    pub async fn mark_seen(
        &self,
        actor: &AuthedUser,
        conversation_id: &str,
        message_ids: Option<Vec<String>>,
    ) -> AppResult<usize> {
        let conversation = self.require_participant(actor, conversation_id).await?;

        let marked = self
            .store
            .modify_messages_in(conversation_id, |message| {
                if let Some(ids) = &message_ids {
                    if !ids.iter().any(|id| id == &message.id) {
                        return false;
                    }
                }
                if message.seen_by.iter().any(|id| id == &actor.id) {
                    return false;
                }
                message.seen_by.push(actor.id.clone());
                true
            })
            .await;

        let prev = conversation
            .unread_counts
            .get(&actor.id)
            .copied()
            .unwrap_or(0);
        let conversation = self
            .store
            .modify_conversation(conversation_id, |c| {
                c.unread_counts.insert(actor.id.clone(), 0);
            })
            .await?;
        metrics::MUTATIONS
            .with_label_values(&["messaging", "mark_seen"])
            .inc();
        self.unreads
            .adjust(&actor.id, UnreadKind::Messages, -(prev as i64))
            .await?;

        let view = self.conversation_view(&conversation, &actor.id).await?;
        self.bus.publish(
            &Topic::Conversation(actor.id.clone()),
            &ConversationUpdatedEvent { conversation: view },
        );
        Ok(marked)
    }

    /// Soft per-user delete: the message stays for everyone else.
    pub async fn delete_message_for_me(
        &self,
        actor: &AuthedUser,
        message_id: &str,
    ) -> AppResult<()> {
        let message = self
            .store
            .get_message(message_id)
            .await
            .ok_or_else(|| AppError::NotFound(format!("message {} not found", message_id)))?;
        self.require_participant(actor, &message.conversation_id)
            .await?;
        self.store
            .modify_message(message_id, |m| {
                if !m.deleted_for.iter().any(|id| id == &actor.id) {
                    m.deleted_for.push(actor.id.clone());
                }
            })
            .await?;
        metrics::MUTATIONS
            .with_label_values(&["messaging", "delete_for_me"])
            .inc();
        Ok(())
    }

    /// The actor's conversations, most recently active first.
    pub async fn my_conversations(&self, actor: &AuthedUser) -> AppResult<Vec<ConversationView>> {
        let mut conversations = self.store.conversations_for_user(&actor.id).await;
        conversations.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        let mut views = Vec::with_capacity(conversations.len());
        for conversation in &conversations {
            views.push(self.conversation_view(conversation, &actor.id).await?);
        }
        Ok(views)
    }

    /// Messages of a conversation, newest first, excluding the ones the
    /// viewer soft-deleted.
    pub async fn get_messages(
        &self,
        actor: &AuthedUser,
        conversation_id: &str,
        limit: usize,
        offset: usize,
    ) -> AppResult<Vec<MessageView>> {
        self.require_participant(actor, conversation_id).await?;
        let mut messages = self.store.messages_in(conversation_id).await;
        messages.retain(|m| !m.deleted_for.iter().any(|id| id == &actor.id));
        messages.sort_by(|a, b| b.seq.cmp(&a.seq));
        let mut views = Vec::new();
        for message in messages.iter().skip(offset).take(limit) {
            views.push(self.message_view(message, &actor.id).await?);
        }
        Ok(views)
    }

    /// Filter the actor's PRIVATE conversations by the other participant's
    /// username or full name, case-insensitive substring match.
    pub async fn search_conversations(
        &self,
        actor: &AuthedUser,
        query: &str,
    ) -> AppResult<Vec<ConversationView>> {
        let needle = query.to_lowercase();
        let mut views = Vec::new();
        for conversation in self.store.conversations_for_user(&actor.id).await {
            let Some(other_id) = conversation.other_participant(&actor.id) else {
                continue;
            };
            let Some(other) = self.store.get_user(other_id).await else {
                continue;
            };
            if other.username.to_lowercase().contains(&needle)
                || other.full_name.to_lowercase().contains(&needle)
            {
                views.push(self.conversation_view(&conversation, &actor.id).await?);
            }
        }
        views.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(views)
    }

    /// Subscribe to a conversation's message stream. This is the only
    /// subscribe path for `MESSAGE_RECEIVED` topics: the participant check
    /// here is the authorization gate.
    pub async fn subscribe_messages(
        &self,
        actor: &AuthedUser,
        conversation_id: &str,
    ) -> AppResult<broadcast::Receiver<EventEnvelope>> {
        self.require_participant(actor, conversation_id).await?;
        Ok(self
            .bus
            .attach(&Topic::MessageReceived(conversation_id.to_string())))
    }

    async fn require_participant(
        &self,
        actor: &AuthedUser,
        conversation_id: &str,
    ) -> AppResult<Conversation> {
        let conversation = self
            .store
            .get_conversation(conversation_id)
            .await
            .ok_or_else(|| {
                AppError::NotFound(format!("conversation {} not found", conversation_id))
            })?;
        if !conversation.is_participant(&actor.id) {
            return Err(AppError::PermissionDenied(
                "not a participant of this conversation".to_string(),
            ));
        }
        Ok(conversation)
    }

    async fn conversation_view(
        &self,
        conversation: &Conversation,
        viewer_id: &str,
    ) -> AppResult<ConversationView> {
        let participants = self.store.users_by_ids(&conversation.participants).await;
        let other_user = conversation
            .other_participant(viewer_id)
            .and_then(|id| participants.iter().find(|u| &u.id == id))
            .map(UserSummary::from);
        let last_message = match &conversation.last_message_id {
            Some(id) => match self.store.get_message(id).await {
                Some(message) => Some(self.message_view(&message, viewer_id).await?),
                None => None,
            },
            None => None,
        };
        Ok(ConversationView {
            id: conversation.id.clone(),
            kind: conversation.kind,
            participants: participants.iter().map(UserSummary::from).collect(),
            other_user,
            last_message,
            my_unread_count: conversation
                .unread_counts
                .get(viewer_id)
                .copied()
                .unwrap_or(0),
            updated_at: conversation.updated_at,
        })
    }

    async fn message_view(&self, message: &Message, viewer_id: &str) -> AppResult<MessageView> {
        let sender = self.store.require_user(&message.sender_id).await?;
        Ok(MessageView {
            id: message.id.clone(),
            conversation_id: message.conversation_id.clone(),
            sender: UserSummary::from(&sender),
            text: message.text.clone(),
            attachments: message.attachments.clone(),
            is_sender_you: message.sender_id == viewer_id,
            seen_by: message.seen_by.clone(),
            created_at: message.created_at,
        })
    }
}

fn message_preview(sender_name: &str, message: &Message) -> String {
    match &message.text {
        Some(text) => {
            let preview: String = text.chars().take(80).collect();
            format!("{}: {}", sender_name, preview)
        }
        None => {
            let kind = message
                .attachments
                .first()
                .map(|a| a.file_type.as_str())
                .unwrap_or("attachment");
            format!("{} sent a {}", sender_name, kind)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::testutil::{authed, seed_user, world};

    #[tokio::test]
    async fn first_message_creates_conversation_with_correct_unreads() {
        let w = world();
        let a = seed_user(&w.store, "alice").await;
        let b = seed_user(&w.store, "bob").await;

        let outcome = w
            .messaging
            .send_message(&authed(&a), &b.id, "hi", "text")
            .await
            .unwrap();
        assert!(outcome.conversation_created);
        assert!(outcome.message.is_sender_you);

        let conversation = w
            .store
            .get_conversation(&outcome.conversation.id)
            .await
            .unwrap();
        assert_eq!(conversation.participants.len(), 2);
        assert_eq!(conversation.unread_counts.get(&a.id), Some(&0));
        assert_eq!(conversation.unread_counts.get(&b.id), Some(&1));

        // "New Conversation" notice, not "New Message".
        let notices = w
            .notifications
            .my_notifications(&authed(&b), 10, 0)
            .await
            .unwrap();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].title, "New Conversation");

        // Second message reuses the conversation and announces the message.
        let second = w
            .messaging
            .send_message(&authed(&a), &b.id, "you there?", "text")
            .await
            .unwrap();
        assert!(!second.conversation_created);
        assert_eq!(second.conversation.id, outcome.conversation.id);
        let conversation = w
            .store
            .get_conversation(&outcome.conversation.id)
            .await
            .unwrap();
        assert_eq!(conversation.unread_counts.get(&b.id), Some(&2));
        let notices = w
            .notifications
            .my_notifications(&authed(&b), 10, 0)
            .await
            .unwrap();
        assert_eq!(notices[0].title, "New Message");

        // Bob's aggregate follows the conversation counter.
        let unreads = w.unreads.total_unreads(&b.id).await.unwrap();
        assert_eq!(unreads.messages_unreads, 2);
    }

    #[tokio::test]
    async fn sending_resets_own_counter_and_mark_seen_resets_the_other() {
        let w = world();
        let a = seed_user(&w.store, "alice").await;
        let b = seed_user(&w.store, "bob").await;
        w.messaging
            .send_message(&authed(&a), &b.id, "one", "text")
            .await
            .unwrap();
        w.messaging
            .send_message(&authed(&a), &b.id, "two", "text")
            .await
            .unwrap();

        // Bob replies: his counter resets, Alice's goes to 1.
        let outcome = w
            .messaging
            .send_message(&authed(&b), &a.id, "pong", "text")
            .await
            .unwrap();
        let conversation = w
            .store
            .get_conversation(&outcome.conversation.id)
            .await
            .unwrap();
        assert_eq!(conversation.unread_counts.get(&b.id), Some(&0));
        assert_eq!(conversation.unread_counts.get(&a.id), Some(&1));
        assert_eq!(
            w.unreads.total_unreads(&b.id).await.unwrap().messages_unreads,
            0
        );

        let marked = w
            .messaging
            .mark_seen(&authed(&a), &conversation.id, None)
            .await
            .unwrap();
        assert_eq!(marked, 1, "only bob's message was unseen by alice");
        let conversation = w.store.get_conversation(&conversation.id).await.unwrap();
        assert_eq!(conversation.unread_counts.get(&a.id), Some(&0));
        assert_eq!(
            w.unreads.total_unreads(&a.id).await.unwrap().messages_unreads,
            0
        );
    }

    #[tokio::test]
    async fn self_send_and_bad_type_are_invalid() {
        let w = world();
        let a = seed_user(&w.store, "alice").await;
        let b = seed_user(&w.store, "bob").await;
        let err = w
            .messaging
            .send_message(&authed(&a), &a.id, "hi", "text")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidArgument(_)));
        let err = w
            .messaging
            .send_message(&authed(&a), &b.id, "hi", "carrier-pigeon")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn attachment_types_store_the_url_not_text() {
        let w = world();
        let a = seed_user(&w.store, "alice").await;
        let b = seed_user(&w.store, "bob").await;
        let outcome = w
            .messaging
            .send_message(&authed(&a), &b.id, "https://cdn/x.png", "image")
            .await
            .unwrap();
        assert!(outcome.message.text.is_none());
        assert_eq!(outcome.message.attachments.len(), 1);
        assert_eq!(outcome.message.attachments[0].url, "https://cdn/x.png");
        assert_eq!(outcome.message.attachments[0].file_type, MessageType::Image);
    }

    #[tokio::test]
    async fn non_participants_are_denied() {
        let w = world();
        let a = seed_user(&w.store, "alice").await;
        let b = seed_user(&w.store, "bob").await;
        let eve = seed_user(&w.store, "eve").await;
        let outcome = w
            .messaging
            .send_message(&authed(&a), &b.id, "secret", "text")
            .await
            .unwrap();

        let err = w
            .messaging
            .get_messages(&authed(&eve), &outcome.conversation.id, 10, 0)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::PermissionDenied(_)));
        let err = w
            .messaging
            .mark_seen(&authed(&eve), &outcome.conversation.id, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::PermissionDenied(_)));
        let err = w
            .messaging
            .subscribe_messages(&authed(&eve), &outcome.conversation.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::PermissionDenied(_)));
    }

    #[tokio::test]
    async fn messages_paginate_newest_first_and_respect_soft_delete() {
        let w = world();
        let a = seed_user(&w.store, "alice").await;
        let b = seed_user(&w.store, "bob").await;
        for text in ["one", "two", "three"] {
            w.messaging
                .send_message(&authed(&a), &b.id, text, "text")
                .await
                .unwrap();
        }
        let conversation_id = w.messaging.my_conversations(&authed(&a)).await.unwrap()[0]
            .id
            .clone();

        let page = w
            .messaging
            .get_messages(&authed(&b), &conversation_id, 2, 0)
            .await
            .unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].text.as_deref(), Some("three"));
        assert_eq!(page[1].text.as_deref(), Some("two"));
        assert!(!page[0].is_sender_you);

        // Soft-delete hides the message for bob only.
        w.messaging
            .delete_message_for_me(&authed(&b), &page[0].id)
            .await
            .unwrap();
        let for_bob = w
            .messaging
            .get_messages(&authed(&b), &conversation_id, 10, 0)
            .await
            .unwrap();
        assert_eq!(for_bob.len(), 2);
        let for_alice = w
            .messaging
            .get_messages(&authed(&a), &conversation_id, 10, 0)
            .await
            .unwrap();
        assert_eq!(for_alice.len(), 3);
    }

    #[tokio::test]
    async fn search_matches_other_participant_case_insensitively() {
        let w = world();
        let a = seed_user(&w.store, "alice").await;
        let b = seed_user(&w.store, "bob").await;
        let c = seed_user(&w.store, "carol").await;
        w.messaging
            .send_message(&authed(&a), &b.id, "hi bob", "text")
            .await
            .unwrap();
        w.messaging
            .send_message(&authed(&a), &c.id, "hi carol", "text")
            .await
            .unwrap();

        let hits = w.messaging.search_conversations(&authed(&a), "BO").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].other_user.as_ref().unwrap().username, "bob");
    }

    #[tokio::test]
    async fn conversation_subscriber_receives_updates_after_send() {
        let w = world();
        let a = seed_user(&w.store, "alice").await;
        let b = seed_user(&w.store, "bob").await;
        let mut rx = w
            .bus
            .subscribe(&Topic::Conversation(b.id.clone()), &authed(&b))
            .unwrap();

        w.messaging
            .send_message(&authed(&a), &b.id, "ping", "text")
            .await
            .unwrap();
        let envelope = rx.recv().await.unwrap();
        assert_eq!(
            envelope.payload["conversation"]["myUnreadCount"], 1,
            "view must be computed for the subscriber"
        );
        assert_eq!(
            envelope.payload["conversation"]["otherUser"]["username"],
            "alice"
        );
    }

    #[tokio::test]
    async fn no_duplicate_private_conversation_for_a_pair() {
        let w = world();
        let a = seed_user(&w.store, "alice").await;
        let b = seed_user(&w.store, "bob").await;
        w.messaging
            .send_message(&authed(&a), &b.id, "one", "text")
            .await
            .unwrap();
        w.messaging
            .send_message(&authed(&b), &a.id, "two", "text")
            .await
            .unwrap();
        assert_eq!(w.messaging.my_conversations(&authed(&a)).await.unwrap().len(), 1);
    }
}
