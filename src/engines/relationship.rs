// Copyright (c) Linknest Team
// SPDX-License-Identifier: Apache-2.0

use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing::warn;

use crate::auth::AuthedUser;
use crate::engines::notification::{NewNotification, NotificationEngine, LINK_REQUEST_TITLE};
use crate::error::{AppError, AppResult};
use crate::events::{LinkStatus, LinkUpdateEvent};
use crate::metrics;
use crate::models::{NotificationAction, NotificationSource, NotificationType, User, UserSummary};
use crate::pubsub::{PubSub, Topic};
use crate::store::Store;

/// Current relationship between the actor and another user.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LinkState {
    None,
    Sent,
    Received,
    Linked,
}

/// Actor-side result of a relationship mutation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkMutation {
    pub user: UserSummary,
    pub status: LinkStatus,
    pub total_links: u64,
}

/// State machine for the link request lifecycle:
/// none → sent → {linked | withdrawn | rejected}, linked → removable.
/// Every mutation writes both user documents in one critical section and
/// publishes a viewer-tagged update to both parties' link topics.
pub struct RelationshipEngine {
    store: Arc<Store>,
    bus: Arc<PubSub>,
    notifications: Arc<NotificationEngine>,
}

impl RelationshipEngine {
    pub fn new(store: Arc<Store>, bus: Arc<PubSub>, notifications: Arc<NotificationEngine>) -> Self {
        RelationshipEngine {
            store,
            bus,
            notifications,
        }
    }

    pub async fn send_link_request(
        &self,
        actor: &AuthedUser,
        target_id: &str,
    ) -> AppResult<LinkMutation> {
        if target_id == actor.id {
            return Err(AppError::InvalidArgument(
                "cannot send a link request to yourself".to_string(),
            ));
        }
        if self.store.get_user(target_id).await.is_none() {
            return Err(AppError::InvalidArgument(
                "target user does not exist".to_string(),
            ));
        }

        let (me, target) = self
            .store
            .modify_user_pair(&actor.id, target_id, |me, target| {
                if me.sent_links.contains(&target.id) {
                    return Err(AppError::Conflict(
                        "link request already sent".to_string(),
                    ));
                }
                if me.links.contains(&target.id) && target.links.contains(&me.id) {
                    return Err(AppError::Conflict("already linked".to_string()));
                }
                // Crossing requests would break the no-double-pending
                // invariant; the existing incoming request wins.
                if me.received_links.contains(&target.id) {
                    return Err(AppError::Conflict(
                        "this user already sent you a link request".to_string(),
                    ));
                }
                me.sent_links.push(target.id.clone());
                target.received_links.push(me.id.clone());
                Ok(())
            })
            .await?;
        metrics::MUTATIONS
            .with_label_values(&["relationship", "send_link_request"])
            .inc();

        self.notifications
            .notify_quietly(NewNotification {
                recipient_id: target.id.clone(),
                notification_type: NotificationType::SocialActivity,
                source: Some(NotificationSource {
                    id: me.id.clone(),
                    name: me.full_name.clone(),
                    avatar_url: me.avatar_url.clone(),
                }),
                title: LINK_REQUEST_TITLE.to_string(),
                description: Some(format!("{} wants to link with you", me.full_name)),
                image_url: None,
                action: Some(NotificationAction {
                    label: "View request".to_string(),
                    url: "/links/requests".to_string(),
                }),
            })
            .await;

        self.publish_pair(&me, &target, LinkStatus::Sent, LinkStatus::Received);
        Ok(mutation(&me, &target, LinkStatus::Sent))
    }

    pub async fn withdraw_link_request(
        &self,
        actor: &AuthedUser,
        target_id: &str,
    ) -> AppResult<LinkMutation> {
        let (me, target) = self
            .store
            .modify_user_pair(&actor.id, target_id, |me, target| {
                if !me.sent_links.contains(&target.id) {
                    return Err(AppError::NotFound(
                        "no pending link request to withdraw".to_string(),
                    ));
                }
                me.sent_links.retain(|id| id != &target.id);
                target.received_links.retain(|id| id != &me.id);
                Ok(())
            })
            .await?;
        metrics::MUTATIONS
            .with_label_values(&["relationship", "withdraw_link_request"])
            .inc();

        self.drop_request_notice(&target.id, &me.id).await;
        self.publish_pair(&me, &target, LinkStatus::Withdrawn, LinkStatus::Withdrawn);
        Ok(mutation(&me, &target, LinkStatus::Withdrawn))
    }

    pub async fn accept_link_request(
        &self,
        actor: &AuthedUser,
        sender_id: &str,
    ) -> AppResult<LinkMutation> {
        let (me, sender) = self
            .store
            .modify_user_pair(&actor.id, sender_id, |me, sender| {
                // Already-linked is a normal conflict outcome, not a crash.
                if me.links.contains(&sender.id) && sender.links.contains(&me.id) {
                    return Err(AppError::Conflict("already linked".to_string()));
                }
                if !me.received_links.contains(&sender.id) {
                    return Err(AppError::NotFound(
                        "no pending link request from this user".to_string(),
                    ));
                }
                me.received_links.retain(|id| id != &sender.id);
                sender.sent_links.retain(|id| id != &me.id);
                me.links.push(sender.id.clone());
                sender.links.push(me.id.clone());
                Ok(())
            })
            .await?;
        metrics::MUTATIONS
            .with_label_values(&["relationship", "accept_link_request"])
            .inc();

        self.drop_request_notice(&me.id, &sender.id).await;
        self.publish_pair(&me, &sender, LinkStatus::Linked, LinkStatus::Linked);
        Ok(mutation(&me, &sender, LinkStatus::Linked))
    }

    pub async fn reject_link_request(
        &self,
        actor: &AuthedUser,
        sender_id: &str,
    ) -> AppResult<LinkMutation> {
        let (me, sender) = self
            .store
            .modify_user_pair(&actor.id, sender_id, |me, sender| {
                if !me.received_links.contains(&sender.id) {
                    return Err(AppError::NotFound(
                        "no pending link request from this user".to_string(),
                    ));
                }
                me.received_links.retain(|id| id != &sender.id);
                sender.sent_links.retain(|id| id != &me.id);
                Ok(())
            })
            .await?;
        metrics::MUTATIONS
            .with_label_values(&["relationship", "reject_link_request"])
            .inc();

        self.drop_request_notice(&me.id, &sender.id).await;
        self.publish_pair(&me, &sender, LinkStatus::Rejected, LinkStatus::Rejected);
        Ok(mutation(&me, &sender, LinkStatus::Rejected))
    }

    pub async fn remove_link(
        &self,
        actor: &AuthedUser,
        linked_user_id: &str,
    ) -> AppResult<LinkMutation> {
        let (me, other) = self
            .store
            .modify_user_pair(&actor.id, linked_user_id, |me, other| {
                if !(me.links.contains(&other.id) && other.links.contains(&me.id)) {
                    return Err(AppError::NotFound(
                        "not linked with this user".to_string(),
                    ));
                }
                me.links.retain(|id| id != &other.id);
                other.links.retain(|id| id != &me.id);
                Ok(())
            })
            .await?;
        metrics::MUTATIONS
            .with_label_values(&["relationship", "remove_link"])
            .inc();

        self.publish_pair(&me, &other, LinkStatus::Removed, LinkStatus::Removed);
        Ok(mutation(&me, &other, LinkStatus::Removed))
    }

    pub async fn link_state(&self, actor: &AuthedUser, other_id: &str) -> AppResult<LinkState> {
        let me = self.store.require_user(&actor.id).await?;
        let other = self.store.require_user(other_id).await?;
        if me.links.contains(&other.id) && other.links.contains(&me.id) {
            Ok(LinkState::Linked)
        } else if me.sent_links.contains(&other.id) {
            Ok(LinkState::Sent)
        } else if me.received_links.contains(&other.id) {
            Ok(LinkState::Received)
        } else {
            Ok(LinkState::None)
        }
    }

    pub async fn my_links(&self, actor: &AuthedUser) -> AppResult<Vec<UserSummary>> {
        let me = self.store.require_user(&actor.id).await?;
        Ok(self.summaries(&me.links).await)
    }

    pub async fn received_requests(&self, actor: &AuthedUser) -> AppResult<Vec<UserSummary>> {
        let me = self.store.require_user(&actor.id).await?;
        Ok(self.summaries(&me.received_links).await)
    }

    pub async fn sent_requests(&self, actor: &AuthedUser) -> AppResult<Vec<UserSummary>> {
        let me = self.store.require_user(&actor.id).await?;
        Ok(self.summaries(&me.sent_links).await)
    }

    async fn summaries(&self, ids: &[String]) -> Vec<UserSummary> {
        self.store
            .users_by_ids(ids)
            .await
            .iter()
            .map(UserSummary::from)
            .collect()
    }

    async fn drop_request_notice(&self, recipient_id: &str, actor_id: &str) {
        if let Err(e) = self
            .notifications
            .delete_link_request_notification(recipient_id, actor_id)
            .await
        {
            warn!(
                "failed to remove link request notification for {}: {}",
                recipient_id, e
            );
        }
    }

    /// Publish the mutation to both parties, each tagged with the status
    /// from that party's point of view and their own link count.
    fn publish_pair(&self, me: &User, other: &User, my_status: LinkStatus, their_status: LinkStatus) {
        let now = Utc::now();
        self.bus.publish(
            &Topic::LinkRequestUpdated(me.id.clone()),
            &LinkUpdateEvent {
                user: UserSummary::from(other),
                status: my_status,
                total_links: me.links.len() as u64,
                updated_at: now,
            },
        );
        self.bus.publish(
            &Topic::LinkRequestUpdated(other.id.clone()),
            &LinkUpdateEvent {
                user: UserSummary::from(me),
                status: their_status,
                total_links: other.links.len() as u64,
                updated_at: now,
            },
        );
    }
}

fn mutation(me: &User, other: &User, status: LinkStatus) -> LinkMutation {
    LinkMutation {
        user: UserSummary::from(other),
        status,
        total_links: me.links.len() as u64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::testutil::{authed, seed_user, world};

    #[tokio::test]
    async fn send_then_accept_links_both_sides() {
        let w = world();
        let a = seed_user(&w.store, "alice").await;
        let b = seed_user(&w.store, "bob").await;
        let mut rx_a = w
            .bus
            .subscribe(&Topic::LinkRequestUpdated(a.id.clone()), &authed(&a))
            .unwrap();
        let mut rx_b = w
            .bus
            .subscribe(&Topic::LinkRequestUpdated(b.id.clone()), &authed(&b))
            .unwrap();

        w.relationships
            .send_link_request(&authed(&a), &b.id)
            .await
            .unwrap();
        let ua = w.store.get_user(&a.id).await.unwrap();
        let ub = w.store.get_user(&b.id).await.unwrap();
        assert_eq!(ua.sent_links, vec![b.id.clone()]);
        assert_eq!(ub.received_links, vec![a.id.clone()]);

        // One SOCIAL_ACTIVITY notification for bob.
        let notices = w
            .notifications
            .my_notifications(&authed(&b), 10, 0)
            .await
            .unwrap();
        assert_eq!(notices.len(), 1);
        assert_eq!(
            notices[0].notification_type,
            NotificationType::SocialActivity
        );

        let outcome = w
            .relationships
            .accept_link_request(&authed(&b), &a.id)
            .await
            .unwrap();
        assert_eq!(outcome.status, LinkStatus::Linked);
        assert_eq!(outcome.total_links, 1);

        // Symmetry: A.links contains B iff B.links contains A.
        let ua = w.store.get_user(&a.id).await.unwrap();
        let ub = w.store.get_user(&b.id).await.unwrap();
        assert_eq!(ua.links, vec![b.id.clone()]);
        assert_eq!(ub.links, vec![a.id.clone()]);
        assert!(ua.sent_links.is_empty());
        assert!(ub.received_links.is_empty());

        // The originating notification is gone.
        assert!(w
            .notifications
            .my_notifications(&authed(&b), 10, 0)
            .await
            .unwrap()
            .is_empty());

        // Both subscribers saw SENT/RECEIVED then LINKED with totals.
        assert_eq!(rx_a.recv().await.unwrap().payload["status"], "SENT");
        assert_eq!(rx_b.recv().await.unwrap().payload["status"], "RECEIVED");
        let linked_a = rx_a.recv().await.unwrap();
        let linked_b = rx_b.recv().await.unwrap();
        assert_eq!(linked_a.payload["status"], "LINKED");
        assert_eq!(linked_a.payload["totalLinks"], 1);
        assert_eq!(linked_b.payload["status"], "LINKED");
        assert_eq!(linked_b.payload["totalLinks"], 1);
    }

    #[tokio::test]
    async fn duplicate_and_crossing_requests_conflict() {
        let w = world();
        let a = seed_user(&w.store, "alice").await;
        let b = seed_user(&w.store, "bob").await;
        w.relationships
            .send_link_request(&authed(&a), &b.id)
            .await
            .unwrap();

        let err = w
            .relationships
            .send_link_request(&authed(&a), &b.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        // B sending back while A's request is pending would create a
        // double-pending pair.
        let err = w
            .relationships
            .send_link_request(&authed(&b), &a.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        let ua = w.store.get_user(&a.id).await.unwrap();
        let ub = w.store.get_user(&b.id).await.unwrap();
        assert!(!(ub.sent_links.contains(&a.id) && ua.sent_links.contains(&b.id)));
    }

    #[tokio::test]
    async fn self_and_unknown_targets_are_invalid() {
        let w = world();
        let a = seed_user(&w.store, "alice").await;
        let err = w
            .relationships
            .send_link_request(&authed(&a), &a.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidArgument(_)));
        let err = w
            .relationships
            .send_link_request(&authed(&a), "missing")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn withdraw_clears_pending_state_and_notification() {
        let w = world();
        let a = seed_user(&w.store, "alice").await;
        let b = seed_user(&w.store, "bob").await;
        w.relationships
            .send_link_request(&authed(&a), &b.id)
            .await
            .unwrap();
        w.relationships
            .withdraw_link_request(&authed(&a), &b.id)
            .await
            .unwrap();

        let ua = w.store.get_user(&a.id).await.unwrap();
        let ub = w.store.get_user(&b.id).await.unwrap();
        assert!(ua.sent_links.is_empty());
        assert!(ub.received_links.is_empty());
        // Zero notifications referencing that sender survive.
        assert!(w
            .notifications
            .my_notifications(&authed(&b), 10, 0)
            .await
            .unwrap()
            .is_empty());

        let err = w
            .relationships
            .withdraw_link_request(&authed(&a), &b.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn accept_is_conflict_when_already_linked() {
        let w = world();
        let a = seed_user(&w.store, "alice").await;
        let b = seed_user(&w.store, "bob").await;
        w.relationships
            .send_link_request(&authed(&a), &b.id)
            .await
            .unwrap();
        w.relationships
            .accept_link_request(&authed(&b), &a.id)
            .await
            .unwrap();
        let err = w
            .relationships
            .accept_link_request(&authed(&b), &a.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn reject_clears_pending_without_linking() {
        let w = world();
        let a = seed_user(&w.store, "alice").await;
        let b = seed_user(&w.store, "bob").await;
        w.relationships
            .send_link_request(&authed(&a), &b.id)
            .await
            .unwrap();
        let outcome = w
            .relationships
            .reject_link_request(&authed(&b), &a.id)
            .await
            .unwrap();
        assert_eq!(outcome.status, LinkStatus::Rejected);
        let ua = w.store.get_user(&a.id).await.unwrap();
        assert!(ua.sent_links.is_empty());
        assert!(ua.links.is_empty());
        assert_eq!(
            w.relationships.link_state(&authed(&a), &b.id).await.unwrap(),
            LinkState::None
        );
    }

    #[tokio::test]
    async fn remove_link_is_a_clean_terminal_transition() {
        let w = world();
        let a = seed_user(&w.store, "alice").await;
        let b = seed_user(&w.store, "bob").await;
        w.relationships
            .send_link_request(&authed(&a), &b.id)
            .await
            .unwrap();
        w.relationships
            .accept_link_request(&authed(&b), &a.id)
            .await
            .unwrap();

        let outcome = w
            .relationships
            .remove_link(&authed(&a), &b.id)
            .await
            .unwrap();
        assert_eq!(outcome.status, LinkStatus::Removed);
        assert_eq!(outcome.total_links, 0);

        let ua = w.store.get_user(&a.id).await.unwrap();
        let ub = w.store.get_user(&b.id).await.unwrap();
        assert!(ua.links.is_empty() && ub.links.is_empty());
        assert!(ua.sent_links.is_empty() && ub.received_links.is_empty());

        let err = w
            .relationships
            .remove_link(&authed(&a), &b.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
