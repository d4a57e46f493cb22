// Copyright (c) Linknest Team
// SPDX-License-Identifier: Apache-2.0

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::RwLock;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::auth::AuthedUser;
use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::metrics;

/// Topic key: one channel per (entity kind, entity id) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Topic {
    /// New messages in a conversation. Participant-gated by the messaging
    /// engine, which is the only subscribe path for this topic.
    MessageReceived(String),
    /// Conversation list updates for one user.
    Conversation(String),
    /// Public post update stream (likes/comments).
    PostUpdated(String),
    /// Link request lifecycle updates for one user.
    LinkRequestUpdated(String),
    /// Notification stream for one user.
    Notification(String),
    /// Aggregate unread updates for one user.
    UserUnreads(String),
}

impl Topic {
    /// Wire name of the topic, part of the client contract.
    pub fn name(&self) -> String {
        match self {
            Topic::MessageReceived(id) => format!("MESSAGE_RECEIVED_{}", id),
            Topic::Conversation(id) => format!("CONVERSATION_{}", id),
            Topic::PostUpdated(id) => format!("POST_UPDATED_{}", id),
            Topic::LinkRequestUpdated(id) => format!("LINK_REQUEST_UPDATED_{}", id),
            Topic::Notification(id) => format!("NOTIFICATION_{}", id),
            Topic::UserUnreads(id) => format!("USER_UNREADS_{}", id),
        }
    }

    /// Metric label, without the entity id.
    pub fn kind(&self) -> &'static str {
        match self {
            Topic::MessageReceived(_) => "MESSAGE_RECEIVED",
            Topic::Conversation(_) => "CONVERSATION",
            Topic::PostUpdated(_) => "POST_UPDATED",
            Topic::LinkRequestUpdated(_) => "LINK_REQUEST_UPDATED",
            Topic::Notification(_) => "NOTIFICATION",
            Topic::UserUnreads(_) => "USER_UNREADS",
        }
    }

    /// The user id that owns this topic, for identity-scoped topics.
    /// `None` for topics that are not gated on a single owner: post topics
    /// are public to any valid session, and conversation-message topics are
    /// gated on participation by the messaging engine.
    pub fn owner(&self) -> Option<&str> {
        match self {
            Topic::Conversation(id)
            | Topic::LinkRequestUpdated(id)
            | Topic::Notification(id)
            | Topic::UserUnreads(id) => Some(id),
            Topic::MessageReceived(_) | Topic::PostUpdated(_) => None,
        }
    }
}

/// Envelope delivered to subscribers: topic name, JSON payload, publish time.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventEnvelope {
    pub topic: String,
    pub payload: serde_json::Value,
    pub published_at: DateTime<Utc>,
}

/// Topic-keyed publish/subscribe bus. An explicit component injected into
/// every engine at construction time, so tests can build their own instance.
pub struct PubSub {
    channels: RwLock<HashMap<String, broadcast::Sender<EventEnvelope>>>,
    capacity: usize,
}

impl Default for PubSub {
    fn default() -> Self {
        Self::new(Config::get().pubsub.channel_capacity)
    }
}

impl PubSub {
    pub fn new(capacity: usize) -> Self {
        PubSub {
            channels: RwLock::new(HashMap::new()),
            capacity,
        }
    }

    /// Publish is fire-and-forget: with zero subscribers the event is
    /// dropped and the channel entry pruned, never an error.
    pub fn publish<T: Serialize>(&self, topic: &Topic, payload: &T) {
        let value = match serde_json::to_value(payload) {
            Ok(value) => value,
            Err(e) => {
                warn!("failed to serialize event for {}: {}", topic.name(), e);
                return;
            }
        };
        let envelope = EventEnvelope {
            topic: topic.name(),
            payload: value,
            published_at: Utc::now(),
        };
        metrics::EVENTS_PUBLISHED
            .with_label_values(&[topic.kind()])
            .inc();

        let name = topic.name();
        let sender = {
            let channels = self.channels.read().expect("pubsub lock poisoned");
            channels.get(&name).cloned()
        };
        match sender {
            Some(sender) => {
                if sender.send(envelope).is_err() {
                    // Last subscriber went away since the channel was created.
                    metrics::EVENTS_UNDELIVERED
                        .with_label_values(&[topic.kind()])
                        .inc();
                    let mut channels = self.channels.write().expect("pubsub lock poisoned");
                    if let Some(s) = channels.get(&name) {
                        if s.receiver_count() == 0 {
                            channels.remove(&name);
                        }
                    }
                }
            }
            None => {
                metrics::EVENTS_UNDELIVERED
                    .with_label_values(&[topic.kind()])
                    .inc();
                debug!("no subscribers on {}, event dropped", name);
            }
        }
    }

    /// Subscribe with the authorization gate: identity-scoped topics require
    /// the session user to be the topic owner. Post topics only need a valid
    /// session. Conversation-message topics are always refused here: the
    /// participant check lives in the messaging engine, which is the only
    /// subscribe path for them.
    pub fn subscribe(
        &self,
        topic: &Topic,
        viewer: &AuthedUser,
    ) -> AppResult<broadcast::Receiver<EventEnvelope>> {
        if let Topic::MessageReceived(_) = topic {
            return Err(AppError::PermissionDenied(
                "conversation message streams require a participant check".to_string(),
            ));
        }
        if let Some(owner) = topic.owner() {
            if owner != viewer.id {
                return Err(AppError::PermissionDenied(format!(
                    "cannot subscribe to another user's {} topic",
                    topic.kind()
                )));
            }
        }
        Ok(self.attach(topic))
    }

    /// Attach a receiver without the owner gate. Engine-internal: callers
    /// must have authorized the subscription themselves.
    pub(crate) fn attach(&self, topic: &Topic) -> broadcast::Receiver<EventEnvelope> {
        let name = topic.name();
        let mut channels = self.channels.write().expect("pubsub lock poisoned");
        let sender = channels
            .entry(name)
            .or_insert_with(|| broadcast::channel(self.capacity).0);
        sender.subscribe()
    }

    /// Number of live subscribers on a topic, mainly for tests and metrics.
    pub fn subscriber_count(&self, topic: &Topic) -> usize {
        self.channels
            .read()
            .expect("pubsub lock poisoned")
            .get(&topic.name())
            .map(|s| s.receiver_count())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn viewer(id: &str) -> AuthedUser {
        AuthedUser {
            id: id.to_string(),
            username: format!("user-{}", id),
        }
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_noop() {
        let bus = PubSub::new(8);
        bus.publish(&Topic::Conversation("u1".into()), &json!({"x": 1}));
        assert_eq!(bus.subscriber_count(&Topic::Conversation("u1".into())), 0);
    }

    #[tokio::test]
    async fn subscriber_receives_published_event() {
        let bus = PubSub::new(8);
        let topic = Topic::UserUnreads("u1".into());
        let mut rx = bus.subscribe(&topic, &viewer("u1")).unwrap();
        bus.publish(&topic, &json!({"total": 3}));
        let envelope = rx.recv().await.unwrap();
        assert_eq!(envelope.topic, "USER_UNREADS_u1");
        assert_eq!(envelope.payload["total"], 3);
    }

    #[tokio::test]
    async fn subscribing_to_another_users_topic_is_denied() {
        let bus = PubSub::new(8);
        for topic in [
            Topic::Conversation("u1".into()),
            Topic::LinkRequestUpdated("u1".into()),
            Topic::Notification("u1".into()),
            Topic::UserUnreads("u1".into()),
        ] {
            let err = bus.subscribe(&topic, &viewer("u2")).unwrap_err();
            assert!(matches!(err, AppError::PermissionDenied(_)), "{:?}", topic);
        }
    }

    #[tokio::test]
    async fn conversation_message_topics_refuse_generic_subscribe() {
        let bus = PubSub::new(8);
        let err = bus
            .subscribe(&Topic::MessageReceived("c1".into()), &viewer("eve"))
            .unwrap_err();
        assert!(matches!(err, AppError::PermissionDenied(_)));
        assert_eq!(bus.subscriber_count(&Topic::MessageReceived("c1".into())), 0);
    }

    #[tokio::test]
    async fn post_topics_are_not_identity_scoped() {
        let bus = PubSub::new(8);
        let topic = Topic::PostUpdated("p1".into());
        let mut rx = bus.subscribe(&topic, &viewer("anyone")).unwrap();
        bus.publish(&topic, &json!({"action": "LIKE"}));
        assert_eq!(rx.recv().await.unwrap().payload["action"], "LIKE");
    }

    #[tokio::test]
    async fn events_fan_out_to_all_subscribers() {
        let bus = PubSub::new(8);
        let topic = Topic::PostUpdated("p1".into());
        let mut rx1 = bus.subscribe(&topic, &viewer("a")).unwrap();
        let mut rx2 = bus.subscribe(&topic, &viewer("b")).unwrap();
        bus.publish(&topic, &json!({"n": 7}));
        assert_eq!(rx1.recv().await.unwrap().payload["n"], 7);
        assert_eq!(rx2.recv().await.unwrap().payload["n"], 7);
    }
}
