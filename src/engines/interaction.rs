// Copyright (c) Linknest Team
// SPDX-License-Identifier: Apache-2.0

use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing::warn;

use crate::auth::AuthedUser;
use crate::error::{AppError, AppResult};
use crate::events::{PostAction, PostUpdateEvent};
use crate::metrics;
use crate::models::{Comment, CommentView, Post, PostKind, PostView, UserSummary};
use crate::pubsub::{PubSub, Topic};
use crate::store::Store;

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeOutcome {
    pub liked: bool,
    pub likes_count: u64,
}

/// One post's cached counters next to the authoritative row counts.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CounterReport {
    pub post_id: String,
    pub cached_likes: u64,
    pub actual_likes: u64,
    pub cached_comments: u64,
    pub actual_comments: u64,
    pub matches: bool,
}

/// Posts, likes and comments. Counter caches on the post are maintained
/// inline and reconciled against the like/comment rows on demand.
pub struct InteractionEngine {
    store: Arc<Store>,
    bus: Arc<PubSub>,
}

impl InteractionEngine {
    pub fn new(store: Arc<Store>, bus: Arc<PubSub>) -> Self {
        InteractionEngine { store, bus }
    }

    pub async fn create_post(
        &self,
        actor: &AuthedUser,
        caption: Option<String>,
        tags: Vec<String>,
        kind: PostKind,
    ) -> AppResult<PostView> {
        let post = Post {
            id: self.store.new_id(),
            seq: self.store.next_seq(),
            author_id: actor.id.clone(),
            caption,
            tags,
            kind,
            likes_count: 0,
            comments_count: 0,
            created_at: Utc::now(),
        };
        let post = self.store.insert_post(post).await;
        metrics::MUTATIONS
            .with_label_values(&["interaction", "create_post"])
            .inc();
        self.post_view(&post, &actor.id).await
    }

    pub async fn get_post(&self, viewer_id: &str, post_id: &str) -> AppResult<PostView> {
        let post = self.require_post(post_id).await?;
        self.post_view(&post, viewer_id).await
    }

    /// All posts, newest first.
    pub async fn feed(
        &self,
        viewer_id: &str,
        limit: usize,
        offset: usize,
    ) -> AppResult<Vec<PostView>> {
        let mut posts = self.store.all_posts().await;
        posts.sort_by(|a, b| b.seq.cmp(&a.seq));
        let mut views = Vec::new();
        for post in posts.iter().skip(offset).take(limit) {
            views.push(self.post_view(post, viewer_id).await?);
        }
        Ok(views)
    }

    /// The presence of a like row is the toggle predicate: absent means this
    /// call likes, present means it unlikes.
    pub async fn toggle_like(&self, actor: &AuthedUser, post_id: &str) -> AppResult<LikeOutcome> {
        self.require_post(post_id).await?;
        let liked = self.store.toggle_like_row(post_id, &actor.id).await;
        let post = self
            .store
            .modify_post(post_id, |p| {
                if liked {
                    p.likes_count += 1;
                } else {
                    if p.likes_count == 0 {
                        warn!(post_id = %p.id, "likes counter already zero on unlike");
                    }
                    p.likes_count = p.likes_count.saturating_sub(1);
                }
            })
            .await?;
        metrics::MUTATIONS
            .with_label_values(&["interaction", "toggle_like"])
            .inc();

        let action = if liked {
            PostAction::Like
        } else {
            PostAction::Unlike
        };
        self.bus.publish(
            &Topic::PostUpdated(post_id.to_string()),
            &PostUpdateEvent {
                post_id: post_id.to_string(),
                action,
                user_id: actor.id.clone(),
                likes_count: Some(post.likes_count),
                comments_count: None,
                comment: None,
                comment_id: None,
                timestamp: Utc::now(),
            },
        );
        Ok(LikeOutcome {
            liked,
            likes_count: post.likes_count,
        })
    }

    pub async fn add_comment(
        &self,
        actor: &AuthedUser,
        post_id: &str,
        text: &str,
        parent_comment_id: Option<String>,
    ) -> AppResult<CommentView> {
        if text.trim().is_empty() {
            return Err(AppError::InvalidArgument(
                "comment text is required".to_string(),
            ));
        }
        self.require_post(post_id).await?;
        if let Some(parent_id) = &parent_comment_id {
            let parent = self.store.get_comment(parent_id).await.ok_or_else(|| {
                AppError::InvalidArgument(format!("parent comment {} not found", parent_id))
            })?;
            if parent.post_id != post_id {
                return Err(AppError::InvalidArgument(
                    "parent comment belongs to a different post".to_string(),
                ));
            }
            // Replies are one level deep only.
            if parent.parent_comment_id.is_some() {
                return Err(AppError::InvalidArgument(
                    "cannot reply to a reply".to_string(),
                ));
            }
        }

        let now = Utc::now();
        let comment = Comment {
            id: self.store.new_id(),
            seq: self.store.next_seq(),
            post_id: post_id.to_string(),
            user_id: actor.id.clone(),
            text: text.to_string(),
            parent_comment_id,
            created_at: now,
            updated_at: now,
        };
        let comment = self.store.insert_comment(comment).await;
        let post = self
            .store
            .modify_post(post_id, |p| p.comments_count += 1)
            .await?;
        metrics::MUTATIONS
            .with_label_values(&["interaction", "add_comment"])
            .inc();

        let view = self.comment_view(&comment, &actor.id).await?;
        self.bus.publish(
            &Topic::PostUpdated(post_id.to_string()),
            &PostUpdateEvent {
                post_id: post_id.to_string(),
                action: PostAction::CommentAdded,
                user_id: actor.id.clone(),
                likes_count: None,
                comments_count: Some(post.comments_count),
                comment: Some(view.clone()),
                comment_id: None,
                timestamp: now,
            },
        );
        Ok(view)
    }

    pub async fn edit_comment(
        &self,
        actor: &AuthedUser,
        comment_id: &str,
        text: &str,
    ) -> AppResult<CommentView> {
        if text.trim().is_empty() {
            return Err(AppError::InvalidArgument(
                "comment text is required".to_string(),
            ));
        }
        let comment = self.require_own_comment(actor, comment_id).await?;
        let comment = self
            .store
            .modify_comment(&comment.id, |c| {
                c.text = text.to_string();
                c.updated_at = Utc::now();
            })
            .await?;
        metrics::MUTATIONS
            .with_label_values(&["interaction", "edit_comment"])
            .inc();
        self.comment_view(&comment, &actor.id).await
    }

    /// Deletes a comment and, for a top-level comment, its replies. The
    /// post's comment counter drops by the number of removed rows.
    pub async fn delete_comment(&self, actor: &AuthedUser, comment_id: &str) -> AppResult<()> {
        let comment = self.require_own_comment(actor, comment_id).await?;
        let removed = self.store.remove_comment_tree(&comment.id).await;
        let removed_ids: Vec<String> = removed.iter().map(|c| c.id.clone()).collect();
        self.store.remove_comment_likes_for(&removed_ids).await;
        let post = self
            .store
            .modify_post(&comment.post_id, |p| {
                p.comments_count = p.comments_count.saturating_sub(removed_ids.len() as u64);
            })
            .await?;
        metrics::MUTATIONS
            .with_label_values(&["interaction", "delete_comment"])
            .inc();

        self.bus.publish(
            &Topic::PostUpdated(comment.post_id.clone()),
            &PostUpdateEvent {
                post_id: comment.post_id.clone(),
                action: PostAction::CommentDeleted,
                user_id: actor.id.clone(),
                likes_count: None,
                comments_count: Some(post.comments_count),
                comment: None,
                comment_id: Some(comment.id.clone()),
                timestamp: Utc::now(),
            },
        );
        Ok(())
    }

    pub async fn toggle_comment_like(
        &self,
        actor: &AuthedUser,
        comment_id: &str,
    ) -> AppResult<bool> {
        self.store
            .get_comment(comment_id)
            .await
            .ok_or_else(|| AppError::NotFound(format!("comment {} not found", comment_id)))?;
        let liked = self
            .store
            .toggle_comment_like_row(comment_id, &actor.id)
            .await;
        metrics::MUTATIONS
            .with_label_values(&["interaction", "toggle_comment_like"])
            .inc();
        Ok(liked)
    }

    /// Top-level comments of a post, newest first.
    pub async fn get_comments(
        &self,
        viewer_id: &str,
        post_id: &str,
        limit: usize,
        offset: usize,
    ) -> AppResult<Vec<CommentView>> {
        self.require_post(post_id).await?;
        let mut comments = self.store.comments_for_post(post_id).await;
        comments.retain(|c| c.parent_comment_id.is_none());
        comments.sort_by(|a, b| b.seq.cmp(&a.seq));
        let mut views = Vec::new();
        for comment in comments.iter().skip(offset).take(limit) {
            views.push(self.comment_view(comment, viewer_id).await?);
        }
        Ok(views)
    }

    /// Replies under one comment, oldest first.
    pub async fn get_comment_replies(
        &self,
        viewer_id: &str,
        comment_id: &str,
        limit: usize,
        offset: usize,
    ) -> AppResult<Vec<CommentView>> {
        self.store
            .get_comment(comment_id)
            .await
            .ok_or_else(|| AppError::NotFound(format!("comment {} not found", comment_id)))?;
        let mut replies = self.store.replies_of(comment_id).await;
        replies.sort_by(|a, b| a.seq.cmp(&b.seq));
        let mut views = Vec::new();
        for reply in replies.iter().skip(offset).take(limit) {
            views.push(self.comment_view(reply, viewer_id).await?);
        }
        Ok(views)
    }

    /// Overwrite a post's cached counters with the authoritative row counts.
    pub async fn sync_post_counters(&self, post_id: &str) -> AppResult<CounterReport> {
        let report = self.verify_post_counters(post_id).await?;
        if !report.matches {
            warn!(
                post_id,
                cached_likes = report.cached_likes,
                actual_likes = report.actual_likes,
                cached_comments = report.cached_comments,
                actual_comments = report.actual_comments,
                "post counters drifted, resyncing"
            );
            self.store
                .modify_post(post_id, |p| {
                    p.likes_count = report.actual_likes;
                    p.comments_count = report.actual_comments;
                })
                .await?;
        }
        Ok(CounterReport {
            cached_likes: report.actual_likes,
            cached_comments: report.actual_comments,
            matches: true,
            ..report
        })
    }

    pub async fn verify_post_counters(&self, post_id: &str) -> AppResult<CounterReport> {
        let post = self.require_post(post_id).await?;
        let actual_likes = self.store.count_likes(post_id).await;
        let actual_comments = self.store.comments_for_post(post_id).await.len() as u64;
        Ok(CounterReport {
            post_id: post_id.to_string(),
            cached_likes: post.likes_count,
            actual_likes,
            cached_comments: post.comments_count,
            actual_comments,
            matches: post.likes_count == actual_likes && post.comments_count == actual_comments,
        })
    }

    async fn require_post(&self, post_id: &str) -> AppResult<Post> {
        self.store
            .get_post(post_id)
            .await
            .ok_or_else(|| AppError::NotFound(format!("post {} not found", post_id)))
    }

    async fn require_own_comment(
        &self,
        actor: &AuthedUser,
        comment_id: &str,
    ) -> AppResult<Comment> {
        let comment = self
            .store
            .get_comment(comment_id)
            .await
            .ok_or_else(|| AppError::NotFound(format!("comment {} not found", comment_id)))?;
        if comment.user_id != actor.id {
            return Err(AppError::PermissionDenied(
                "only the comment author can modify it".to_string(),
            ));
        }
        Ok(comment)
    }

    async fn post_view(&self, post: &Post, viewer_id: &str) -> AppResult<PostView> {
        let author = self.store.require_user(&post.author_id).await?;
        Ok(PostView {
            id: post.id.clone(),
            author: UserSummary::from(&author),
            caption: post.caption.clone(),
            tags: post.tags.clone(),
            kind: post.kind.clone(),
            likes_count: post.likes_count,
            comments_count: post.comments_count,
            has_liked: self.store.has_liked(&post.id, viewer_id).await,
            created_at: post.created_at,
        })
    }

    async fn comment_view(&self, comment: &Comment, viewer_id: &str) -> AppResult<CommentView> {
        let user = self.store.require_user(&comment.user_id).await?;
        Ok(CommentView {
            id: comment.id.clone(),
            post_id: comment.post_id.clone(),
            user: UserSummary::from(&user),
            text: comment.text.clone(),
            parent_comment_id: comment.parent_comment_id.clone(),
            reply_count: self.store.count_replies(&comment.id).await,
            like_count: self.store.count_comment_likes(&comment.id).await,
            has_liked: self.store.has_liked_comment(&comment.id, viewer_id).await,
            created_at: comment.created_at,
            updated_at: comment.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::testutil::{authed, seed_user, world};

    async fn seed_post(w: &crate::engines::testutil::World, author: &crate::models::User) -> PostView {
        w.interactions
            .create_post(
                &authed(author),
                Some("caption".to_string()),
                vec!["tag".to_string()],
                PostKind::Image {
                    images: vec!["https://cdn/p.png".to_string()],
                },
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn like_toggles_by_row_existence() {
        let w = world();
        let a = seed_user(&w.store, "alice").await;
        let b = seed_user(&w.store, "bob").await;
        let post = seed_post(&w, &a).await;

        let first = w.interactions.toggle_like(&authed(&b), &post.id).await.unwrap();
        assert!(first.liked);
        assert_eq!(first.likes_count, 1);
        assert!(w.store.has_liked(&post.id, &b.id).await);

        let second = w.interactions.toggle_like(&authed(&b), &post.id).await.unwrap();
        assert!(!second.liked);
        assert_eq!(second.likes_count, 0);
        assert!(!w.store.has_liked(&post.id, &b.id).await);
    }

    #[tokio::test]
    async fn like_event_carries_actor_and_new_total() {
        let w = world();
        let a = seed_user(&w.store, "alice").await;
        let b = seed_user(&w.store, "bob").await;
        let post = seed_post(&w, &a).await;
        let mut rx = w.bus.attach(&Topic::PostUpdated(post.id.clone()));

        w.interactions.toggle_like(&authed(&b), &post.id).await.unwrap();
        let envelope = rx.recv().await.unwrap();
        assert_eq!(envelope.payload["action"], "LIKE");
        assert_eq!(envelope.payload["userId"], b.id);
        assert_eq!(envelope.payload["likesCount"], 1);

        w.interactions.toggle_like(&authed(&b), &post.id).await.unwrap();
        let envelope = rx.recv().await.unwrap();
        assert_eq!(envelope.payload["action"], "UNLIKE");
        assert_eq!(envelope.payload["likesCount"], 0);
    }

    #[tokio::test]
    async fn replies_are_one_level_deep() {
        let w = world();
        let a = seed_user(&w.store, "alice").await;
        let post = seed_post(&w, &a).await;
        let top = w
            .interactions
            .add_comment(&authed(&a), &post.id, "top", None)
            .await
            .unwrap();
        let reply = w
            .interactions
            .add_comment(&authed(&a), &post.id, "reply", Some(top.id.clone()))
            .await
            .unwrap();
        let err = w
            .interactions
            .add_comment(&authed(&a), &post.id, "nested", Some(reply.id.clone()))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn only_the_author_edits_or_deletes_a_comment() {
        let w = world();
        let a = seed_user(&w.store, "alice").await;
        let b = seed_user(&w.store, "bob").await;
        let post = seed_post(&w, &a).await;
        let comment = w
            .interactions
            .add_comment(&authed(&a), &post.id, "mine", None)
            .await
            .unwrap();

        let err = w
            .interactions
            .edit_comment(&authed(&b), &comment.id, "hijack")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::PermissionDenied(_)));
        let err = w
            .interactions
            .delete_comment(&authed(&b), &comment.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::PermissionDenied(_)));

        let edited = w
            .interactions
            .edit_comment(&authed(&a), &comment.id, "still mine")
            .await
            .unwrap();
        assert_eq!(edited.text, "still mine");
    }

    #[tokio::test]
    async fn deleting_a_top_level_comment_removes_replies_and_fixes_count() {
        let w = world();
        let a = seed_user(&w.store, "alice").await;
        let b = seed_user(&w.store, "bob").await;
        let post = seed_post(&w, &a).await;
        let top = w
            .interactions
            .add_comment(&authed(&a), &post.id, "top", None)
            .await
            .unwrap();
        w.interactions
            .add_comment(&authed(&b), &post.id, "reply one", Some(top.id.clone()))
            .await
            .unwrap();
        w.interactions
            .add_comment(&authed(&b), &post.id, "reply two", Some(top.id.clone()))
            .await
            .unwrap();
        assert_eq!(w.store.get_post(&post.id).await.unwrap().comments_count, 3);

        w.interactions
            .delete_comment(&authed(&a), &top.id)
            .await
            .unwrap();
        let post = w.store.get_post(&post.id).await.unwrap();
        assert_eq!(post.comments_count, 0);
        assert!(w.store.comments_for_post(&post.id).await.is_empty());
    }

    #[tokio::test]
    async fn comment_paging_orders_top_level_newest_and_replies_oldest() {
        let w = world();
        let a = seed_user(&w.store, "alice").await;
        let post = seed_post(&w, &a).await;
        let first = w
            .interactions
            .add_comment(&authed(&a), &post.id, "first", None)
            .await
            .unwrap();
        w.interactions
            .add_comment(&authed(&a), &post.id, "second", None)
            .await
            .unwrap();
        w.interactions
            .add_comment(&authed(&a), &post.id, "reply a", Some(first.id.clone()))
            .await
            .unwrap();
        w.interactions
            .add_comment(&authed(&a), &post.id, "reply b", Some(first.id.clone()))
            .await
            .unwrap();

        let top = w
            .interactions
            .get_comments(&a.id, &post.id, 10, 0)
            .await
            .unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].text, "second");
        assert_eq!(top[1].text, "first");
        assert_eq!(top[1].reply_count, 2);

        let replies = w
            .interactions
            .get_comment_replies(&a.id, &first.id, 10, 0)
            .await
            .unwrap();
        assert_eq!(replies[0].text, "reply a");
        assert_eq!(replies[1].text, "reply b");
    }

    #[test_log::test(tokio::test)]
    async fn drifted_counters_are_detected_and_resynced() {
        let w = world();
        let a = seed_user(&w.store, "alice").await;
        let b = seed_user(&w.store, "bob").await;
        let post = seed_post(&w, &a).await;
        w.interactions.toggle_like(&authed(&b), &post.id).await.unwrap();

        // Simulate drift in the cached counter.
        w.store
            .modify_post(&post.id, |p| p.likes_count = 5)
            .await
            .unwrap();
        let report = w.interactions.verify_post_counters(&post.id).await.unwrap();
        assert!(!report.matches);
        assert_eq!(report.cached_likes, 5);
        assert_eq!(report.actual_likes, 1);

        let synced = w.interactions.sync_post_counters(&post.id).await.unwrap();
        assert!(synced.matches);
        assert_eq!(w.store.get_post(&post.id).await.unwrap().likes_count, 1);
    }
}
