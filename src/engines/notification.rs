// Copyright (c) Linknest Team
// SPDX-License-Identifier: Apache-2.0

use chrono::Utc;
use std::sync::Arc;
use tracing::warn;

use crate::auth::AuthedUser;
use crate::engines::unreads::{UnreadKind, UnreadsEngine};
use crate::error::{AppError, AppResult};
use crate::events::{NotificationEvent, NotificationUpdateType};
use crate::external::ExternalNotifier;
use crate::metrics;
use crate::models::{
    Id, Notification, NotificationAction, NotificationSource, NotificationStatus,
    NotificationType, NotificationView,
};
use crate::pubsub::{PubSub, Topic};
use crate::store::Store;

/// Title used for link-request notifications; withdrawal/accept/reject
/// find the stale notice by this marker plus the source user.
pub const LINK_REQUEST_TITLE: &str = "New Link Request";

#[derive(Debug, Clone)]
pub struct NewNotification {
    pub recipient_id: Id,
    pub notification_type: NotificationType,
    pub source: Option<NotificationSource>,
    pub title: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub action: Option<NotificationAction>,
}

/// Creates, fans out, marks read and deletes notification records. Every
/// mutation is scoped to the authenticated recipient; other engines deliver
/// through `notify_quietly` so a notification failure can never abort their
/// primary mutation.
pub struct NotificationEngine {
    store: Arc<Store>,
    bus: Arc<PubSub>,
    unreads: Arc<UnreadsEngine>,
    notifier: Arc<dyn ExternalNotifier>,
}

impl NotificationEngine {
    pub fn new(
        store: Arc<Store>,
        bus: Arc<PubSub>,
        unreads: Arc<UnreadsEngine>,
        notifier: Arc<dyn ExternalNotifier>,
    ) -> Self {
        NotificationEngine {
            store,
            bus,
            unreads,
            notifier,
        }
    }

    pub async fn create(&self, input: NewNotification) -> AppResult<Notification> {
        self.store.require_user(&input.recipient_id).await?;
        let notification = Notification {
            id: self.store.new_id(),
            seq: self.store.next_seq(),
            recipient_id: input.recipient_id.clone(),
            notification_type: input.notification_type,
            source: input.source,
            title: input.title.clone(),
            description: input.description.clone(),
            image_url: input.image_url,
            action: input.action,
            status: NotificationStatus::Unread,
            created_at: Utc::now(),
        };
        let notification = self.store.insert_notification(notification).await;
        metrics::MUTATIONS
            .with_label_values(&["notification", "create"])
            .inc();

        let unreads = self
            .unreads
            .adjust(&input.recipient_id, UnreadKind::Notifications, 1)
            .await?;
        self.publish(
            &input.recipient_id,
            NotificationEvent {
                update_type: NotificationUpdateType::New,
                notification: Some(NotificationView::from(&notification)),
                ids: Vec::new(),
                unread_count: unreads.notifications_unreads,
            },
        );

        // Push/email delivery is best-effort.
        let body = input.description.unwrap_or_default();
        let data = serde_json::json!({ "notificationId": notification.id });
        if let Err(e) = self
            .notifier
            .notify_externally(&input.recipient_id, &input.title, &body, &data)
            .await
        {
            warn!("external delivery failed for {}: {}", input.recipient_id, e);
        }
        Ok(notification)
    }

    /// Fire-and-forget variant used by the other engines: errors are logged
    /// and swallowed, never propagated to the primary operation.
    pub async fn notify_quietly(&self, input: NewNotification) {
        let recipient = input.recipient_id.clone();
        if let Err(e) = self.create(input).await {
            warn!("notification for {} dropped: {}", recipient, e);
        }
    }

    /// Remove the pending link-request notice a specific actor created for a
    /// recipient, so the stale "you have a pending request" entry disappears
    /// when the request is withdrawn, accepted or rejected.
    pub async fn delete_link_request_notification(
        &self,
        recipient_id: &str,
        actor_id: &str,
    ) -> AppResult<usize> {
        let removed = self
            .store
            .remove_notifications_where(recipient_id, |n| {
                n.title == LINK_REQUEST_TITLE
                    && n.source.as_ref().map(|s| s.id.as_str()) == Some(actor_id)
            })
            .await;
        if removed.is_empty() {
            return Ok(0);
        }
        let unread = removed
            .iter()
            .filter(|n| n.status == NotificationStatus::Unread)
            .count() as i64;
        let unreads = self
            .unreads
            .adjust(recipient_id, UnreadKind::Notifications, -unread)
            .await?;
        self.publish(
            recipient_id,
            NotificationEvent {
                update_type: NotificationUpdateType::Deleted,
                notification: None,
                ids: removed.iter().map(|n| n.id.clone()).collect(),
                unread_count: unreads.notifications_unreads,
            },
        );
        Ok(removed.len())
    }

    pub async fn mark_read(&self, actor: &AuthedUser, ids: &[Id]) -> AppResult<Vec<Id>> {
        let changed = self
            .store
            .modify_notifications(&actor.id, |n| {
                if ids.iter().any(|id| id == &n.id) && n.status == NotificationStatus::Unread {
                    n.status = NotificationStatus::Read;
                    true
                } else {
                    false
                }
            })
            .await;
        self.after_read(actor, changed).await
    }

    pub async fn mark_all_read(&self, actor: &AuthedUser) -> AppResult<Vec<Id>> {
        let changed = self
            .store
            .modify_notifications(&actor.id, |n| {
                if n.status == NotificationStatus::Unread {
                    n.status = NotificationStatus::Read;
                    true
                } else {
                    false
                }
            })
            .await;
        self.after_read(actor, changed).await
    }

    async fn after_read(
        &self,
        actor: &AuthedUser,
        changed: Vec<Notification>,
    ) -> AppResult<Vec<Id>> {
        let ids: Vec<Id> = changed.iter().map(|n| n.id.clone()).collect();
        metrics::MUTATIONS
            .with_label_values(&["notification", "mark_read"])
            .inc();
        let unreads = self
            .unreads
            .adjust(&actor.id, UnreadKind::Notifications, -(ids.len() as i64))
            .await?;
        if !ids.is_empty() {
            self.publish(
                &actor.id,
                NotificationEvent {
                    update_type: NotificationUpdateType::Read,
                    notification: None,
                    ids: ids.clone(),
                    unread_count: unreads.notifications_unreads,
                },
            );
        }
        Ok(ids)
    }

    pub async fn delete_one(&self, actor: &AuthedUser, id: &str) -> AppResult<()> {
        let removed = self
            .store
            .remove_notifications_where(&actor.id, |n| n.id == id)
            .await;
        let Some(notification) = removed.into_iter().next() else {
            // Scoped to the actor: another user's notification id is
            // indistinguishable from a missing one.
            return Err(AppError::NotFound(format!("notification {} not found", id)));
        };
        metrics::MUTATIONS
            .with_label_values(&["notification", "delete"])
            .inc();
        let delta = if notification.status == NotificationStatus::Unread {
            -1
        } else {
            0
        };
        let unreads = self
            .unreads
            .adjust(&actor.id, UnreadKind::Notifications, delta)
            .await?;
        self.publish(
            &actor.id,
            NotificationEvent {
                update_type: NotificationUpdateType::Deleted,
                notification: None,
                ids: vec![notification.id],
                unread_count: unreads.notifications_unreads,
            },
        );
        Ok(())
    }

    pub async fn delete_all(&self, actor: &AuthedUser) -> AppResult<usize> {
        let removed = self
            .store
            .remove_notifications_where(&actor.id, |_| true)
            .await;
        metrics::MUTATIONS
            .with_label_values(&["notification", "delete_all"])
            .inc();
        let unreads = self
            .unreads
            .reset(&actor.id, UnreadKind::Notifications)
            .await?;
        self.publish(
            &actor.id,
            NotificationEvent {
                update_type: NotificationUpdateType::BatchDelete,
                notification: None,
                ids: removed.iter().map(|n| n.id.clone()).collect(),
                unread_count: unreads.notifications_unreads,
            },
        );
        Ok(removed.len())
    }

    /// The actor's notifications, newest first.
    pub async fn my_notifications(
        &self,
        actor: &AuthedUser,
        limit: usize,
        offset: usize,
    ) -> AppResult<Vec<NotificationView>> {
        let mut notifications = self.store.notifications_for(&actor.id).await;
        notifications.sort_by(|a, b| b.seq.cmp(&a.seq));
        Ok(notifications
            .iter()
            .skip(offset)
            .take(limit)
            .map(NotificationView::from)
            .collect())
    }

    fn publish(&self, recipient_id: &str, event: NotificationEvent) {
        self.bus
            .publish(&Topic::Notification(recipient_id.to_string()), &event);
    }
}
