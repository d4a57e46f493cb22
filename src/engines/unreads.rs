// Copyright (c) Linknest Team
// SPDX-License-Identifier: Apache-2.0

use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::AppResult;
use crate::events::UserUnreadsEvent;
use crate::metrics;
use crate::models::UserUnreads;
use crate::pubsub::{PubSub, Topic};
use crate::store::Store;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnreadKind {
    Notifications,
    Messages,
}

/// Result of auditing the cached aggregate against ground truth.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnreadDrift {
    pub cached: UserUnreads,
    pub actual: UserUnreads,
    pub matches: bool,
}

/// Owns the per-user unread cache: total = unread notifications + unread
/// messages. The other engines never touch the cache directly; they go
/// through `adjust` as part of the same mutation that changed the
/// underlying counters, so the aggregate can never lag behind a poll.
pub struct UnreadsEngine {
    store: Arc<Store>,
    bus: Arc<PubSub>,
}

impl UnreadsEngine {
    pub fn new(store: Arc<Store>, bus: Arc<PubSub>) -> Self {
        UnreadsEngine { store, bus }
    }

    /// Cheap read of the cached counters, no recomputation.
    pub async fn total_unreads(&self, user_id: &str) -> AppResult<UserUnreads> {
        Ok(self.store.require_user(user_id).await?.unreads)
    }

    /// Apply a delta to one of the counters, clamped at zero, and publish
    /// the new aggregate.
    pub async fn adjust(&self, user_id: &str, kind: UnreadKind, delta: i64) -> AppResult<UserUnreads> {
        if delta == 0 {
            return self.total_unreads(user_id).await;
        }
        let user = self
            .store
            .modify_user(user_id, |u| {
                let counter = match kind {
                    UnreadKind::Notifications => &mut u.unreads.notifications_unreads,
                    UnreadKind::Messages => &mut u.unreads.messages_unreads,
                };
                if delta >= 0 {
                    *counter += delta as u64;
                } else {
                    let decrement = delta.unsigned_abs();
                    if *counter < decrement {
                        warn!(
                            "unread counter for {} would go negative ({} - {}), clamping",
                            user_id, counter, decrement
                        );
                    }
                    *counter = counter.saturating_sub(decrement);
                }
            })
            .await?;
        self.publish(user_id, user.unreads);
        Ok(user.unreads)
    }

    /// Set one counter to zero and publish the new aggregate.
    pub async fn reset(&self, user_id: &str, kind: UnreadKind) -> AppResult<UserUnreads> {
        let user = self
            .store
            .modify_user(user_id, |u| match kind {
                UnreadKind::Notifications => u.unreads.notifications_unreads = 0,
                UnreadKind::Messages => u.unreads.messages_unreads = 0,
            })
            .await?;
        metrics::MUTATIONS
            .with_label_values(&["unreads", "reset"])
            .inc();
        self.publish(user_id, user.unreads);
        Ok(user.unreads)
    }

    /// Recompute both counters from ground truth and overwrite the cache.
    /// Exists because the cache can drift under partial failures.
    pub async fn sync_unreads(&self, user_id: &str) -> AppResult<UserUnreads> {
        let actual = self.recompute(user_id).await?;
        let user = self
            .store
            .modify_user(user_id, |u| u.unreads = actual)
            .await?;
        metrics::MUTATIONS
            .with_label_values(&["unreads", "sync"])
            .inc();
        info!(
            "synced unreads for {}: notifications={} messages={}",
            user_id, actual.notifications_unreads, actual.messages_unreads
        );
        self.publish(user_id, user.unreads);
        Ok(user.unreads)
    }

    /// Compare cached vs. recomputed without mutating.
    pub async fn verify_unreads(&self, user_id: &str) -> AppResult<UnreadDrift> {
        let cached = self.store.require_user(user_id).await?.unreads;
        let actual = self.recompute(user_id).await?;
        Ok(UnreadDrift {
            cached,
            actual,
            matches: cached == actual,
        })
    }

    async fn recompute(&self, user_id: &str) -> AppResult<UserUnreads> {
        self.store.require_user(user_id).await?;
        let notifications_unreads = self.store.count_unread_notifications(user_id).await;
        let messages_unreads = self
            .store
            .conversations_for_user(user_id)
            .await
            .iter()
            .map(|c| c.unread_counts.get(user_id).copied().unwrap_or(0))
            .sum();
        Ok(UserUnreads {
            notifications_unreads,
            messages_unreads,
        })
    }

    fn publish(&self, user_id: &str, unreads: UserUnreads) {
        self.bus.publish(
            &Topic::UserUnreads(user_id.to_string()),
            &UserUnreadsEvent {
                notifications_unreads: unreads.notifications_unreads,
                messages_unreads: unreads.messages_unreads,
                total: unreads.total(),
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::testutil::{seed_user, world};

    #[tokio::test]
    async fn adjust_clamps_at_zero() {
        let w = world();
        let alice = seed_user(&w.store, "alice").await;
        w.unreads
            .adjust(&alice.id, UnreadKind::Messages, 2)
            .await
            .unwrap();
        let unreads = w
            .unreads
            .adjust(&alice.id, UnreadKind::Messages, -5)
            .await
            .unwrap();
        assert_eq!(unreads.messages_unreads, 0);
    }

    #[test_log::test(tokio::test)]
    async fn sync_repairs_drifted_cache() {
        let w = world();
        let alice = seed_user(&w.store, "alice").await;
        // Drift the cache away from ground truth (no notification rows, no
        // conversations).
        w.unreads
            .adjust(&alice.id, UnreadKind::Notifications, 9)
            .await
            .unwrap();

        let drift = w.unreads.verify_unreads(&alice.id).await.unwrap();
        assert!(!drift.matches);
        assert_eq!(drift.cached.notifications_unreads, 9);
        assert_eq!(drift.actual.notifications_unreads, 0);

        let synced = w.unreads.sync_unreads(&alice.id).await.unwrap();
        assert_eq!(synced, drift.actual);
        assert!(w.unreads.verify_unreads(&alice.id).await.unwrap().matches);
    }

    #[tokio::test]
    async fn reset_publishes_user_unreads_event() {
        let w = world();
        let alice = seed_user(&w.store, "alice").await;
        let mut rx = w
            .bus
            .subscribe(&Topic::UserUnreads(alice.id.clone()), &crate::engines::testutil::authed(&alice))
            .unwrap();
        w.unreads
            .reset(&alice.id, UnreadKind::Notifications)
            .await
            .unwrap();
        let envelope = rx.recv().await.unwrap();
        assert_eq!(envelope.payload["total"], 0);
    }
}
