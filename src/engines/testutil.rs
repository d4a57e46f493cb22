// Copyright (c) Linknest Team
// SPDX-License-Identifier: Apache-2.0

use chrono::Utc;
use std::sync::Arc;

use crate::auth::AuthedUser;
use crate::engines::notification::{NewNotification, LINK_REQUEST_TITLE};
use crate::engines::{
    InteractionEngine, MessagingEngine, NotificationEngine, RelationshipEngine, UnreadsEngine,
};
use crate::external::LogNotifier;
use crate::models::{NotificationSource, NotificationType, User, UserUnreads};
use crate::pubsub::PubSub;
use crate::store::Store;

/// Fully wired engine graph over a fresh in-memory store.
pub(crate) struct World {
    pub store: Arc<Store>,
    pub bus: Arc<PubSub>,
    pub unreads: Arc<UnreadsEngine>,
    pub notifications: Arc<NotificationEngine>,
    pub relationships: Arc<RelationshipEngine>,
    pub messaging: Arc<MessagingEngine>,
    pub interactions: Arc<InteractionEngine>,
}

pub(crate) fn world() -> World {
    let store = Arc::new(Store::new());
    let bus = Arc::new(PubSub::new(64));
    let unreads = Arc::new(UnreadsEngine::new(store.clone(), bus.clone()));
    let notifications = Arc::new(NotificationEngine::new(
        store.clone(),
        bus.clone(),
        unreads.clone(),
        Arc::new(LogNotifier),
    ));
    let relationships = Arc::new(RelationshipEngine::new(
        store.clone(),
        bus.clone(),
        notifications.clone(),
    ));
    let messaging = Arc::new(MessagingEngine::new(
        store.clone(),
        bus.clone(),
        notifications.clone(),
        unreads.clone(),
    ));
    let interactions = Arc::new(InteractionEngine::new(store.clone(), bus.clone()));
    World {
        store,
        bus,
        unreads,
        notifications,
        relationships,
        messaging,
        interactions,
    }
}

pub(crate) async fn seed_user(store: &Store, username: &str) -> User {
    store
        .create_user(User {
            id: store.new_id(),
            username: username.to_string(),
            full_name: capitalize(username),
            email: format!("{}@example.com", username),
            password_hash: "$2b$04$test-hash-not-a-real-credential".to_string(),
            avatar_url: None,
            sent_links: Vec::new(),
            received_links: Vec::new(),
            links: Vec::new(),
            unreads: UserUnreads::default(),
            created_at: Utc::now(),
        })
        .await
        .unwrap()
}

pub(crate) fn authed(user: &User) -> AuthedUser {
    AuthedUser {
        id: user.id.clone(),
        username: user.username.clone(),
    }
}

pub(crate) fn link_request_notification(sender: &User, recipient: &User) -> NewNotification {
    NewNotification {
        recipient_id: recipient.id.clone(),
        notification_type: NotificationType::SocialActivity,
        source: Some(NotificationSource {
            id: sender.id.clone(),
            name: sender.full_name.clone(),
            avatar_url: sender.avatar_url.clone(),
        }),
        title: LINK_REQUEST_TITLE.to_string(),
        description: Some(format!("{} wants to link with you", sender.full_name)),
        image_url: None,
        action: None,
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
