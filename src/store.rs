// Copyright (c) Linknest Team
// SPDX-License-Identifier: Apache-2.0

use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{
    Comment, Conversation, ConversationKind, Id, Message, Notification, Post, User,
};

/// In-memory durable store. One lock per collection; multi-entity writes
/// that must be logically atomic (both sides of a relationship mutation,
/// find-or-create of a private conversation, like-row toggles) happen inside
/// a single write-lock critical section.
///
/// Unique constraints: `(post, user)` for likes and `(comment, user)` for
/// comment likes are enforced by the keyed maps themselves.
#[derive(Default)]
pub struct Store {
    users: RwLock<HashMap<Id, User>>,
    sessions: RwLock<HashMap<String, Id>>,
    conversations: RwLock<HashMap<Id, Conversation>>,
    messages: RwLock<HashMap<Id, Message>>,
    posts: RwLock<HashMap<Id, Post>>,
    likes: RwLock<HashMap<(Id, Id), chrono::DateTime<Utc>>>,
    comments: RwLock<HashMap<Id, Comment>>,
    comment_likes: RwLock<HashMap<(Id, Id), chrono::DateTime<Utc>>>,
    notifications: RwLock<HashMap<Id, Notification>>,
    seq: AtomicU64,
}

impl Store {
    pub fn new() -> Self {
        Store::default()
    }

    pub fn new_id(&self) -> Id {
        Uuid::new_v4().to_string()
    }

    /// Monotonic sequence used for stable newest-first/oldest-first ordering.
    pub fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::SeqCst) + 1
    }

    // ---- users ----------------------------------------------------------

    pub async fn create_user(&self, user: User) -> AppResult<User> {
        let mut users = self.users.write().await;
        let username = user.username.to_lowercase();
        let email = user.email.to_lowercase();
        if users.values().any(|u| {
            u.username.to_lowercase() == username || u.email.to_lowercase() == email
        }) {
            return Err(AppError::Conflict(
                "username or email already registered".to_string(),
            ));
        }
        users.insert(user.id.clone(), user.clone());
        Ok(user)
    }

    pub async fn get_user(&self, id: &str) -> Option<User> {
        self.users.read().await.get(id).cloned()
    }

    pub async fn require_user(&self, id: &str) -> AppResult<User> {
        self.get_user(id)
            .await
            .ok_or_else(|| AppError::NotFound(format!("user {} not found", id)))
    }

    /// Look a user up by username or email (login identifier).
    pub async fn find_user_by_login(&self, identifier: &str) -> Option<User> {
        let identifier = identifier.to_lowercase();
        self.users
            .read()
            .await
            .values()
            .find(|u| {
                u.username.to_lowercase() == identifier || u.email.to_lowercase() == identifier
            })
            .cloned()
    }

    pub async fn modify_user<F>(&self, id: &str, f: F) -> AppResult<User>
    where
        F: FnOnce(&mut User),
    {
        let mut users = self.users.write().await;
        let user = users
            .get_mut(id)
            .ok_or_else(|| AppError::NotFound(format!("user {} not found", id)))?;
        f(user);
        Ok(user.clone())
    }

    /// Mutate two user documents under one critical section so relationship
    /// writes are logically atomic within this process. If the closure
    /// returns an error (a state-machine check failed), nothing is written.
    pub async fn modify_user_pair<F>(&self, a: &str, b: &str, f: F) -> AppResult<(User, User)>
    where
        F: FnOnce(&mut User, &mut User) -> AppResult<()>,
    {
        if a == b {
            return Err(AppError::InvalidArgument(
                "cannot target yourself".to_string(),
            ));
        }
        let mut users = self.users.write().await;
        let mut ua = users
            .get(a)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("user {} not found", a)))?;
        let mut ub = users
            .get(b)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("user {} not found", b)))?;
        f(&mut ua, &mut ub)?;
        users.insert(ua.id.clone(), ua.clone());
        users.insert(ub.id.clone(), ub.clone());
        Ok((ua, ub))
    }

    /// Case-insensitive substring search over username and full name.
    pub async fn search_users(&self, query: &str) -> Vec<User> {
        let needle = query.to_lowercase();
        self.users
            .read()
            .await
            .values()
            .filter(|u| {
                u.username.to_lowercase().contains(&needle)
                    || u.full_name.to_lowercase().contains(&needle)
            })
            .cloned()
            .collect()
    }

    /// Resolve a list of ids to user documents, skipping dangling ids.
    pub async fn users_by_ids(&self, ids: &[Id]) -> Vec<User> {
        let users = self.users.read().await;
        ids.iter().filter_map(|id| users.get(id).cloned()).collect()
    }

    // ---- sessions -------------------------------------------------------

    pub async fn create_session(&self, user_id: &str) -> String {
        let token = Uuid::new_v4().to_string();
        self.sessions
            .write()
            .await
            .insert(token.clone(), user_id.to_string());
        token
    }

    pub async fn session_user(&self, token: &str) -> Option<Id> {
        self.sessions.read().await.get(token).cloned()
    }

    pub async fn remove_session(&self, token: &str) -> bool {
        self.sessions.write().await.remove(token).is_some()
    }

    // ---- conversations --------------------------------------------------

    /// PRIVATE conversations are keyed by the unordered participant pair;
    /// the lookup and insert run under one write lock so a pair can never
    /// end up with duplicate conversations.
    pub async fn find_or_create_private_conversation(
        &self,
        a: &str,
        b: &str,
    ) -> (Conversation, bool) {
        let mut conversations = self.conversations.write().await;
        if let Some(existing) = conversations.values().find(|c| {
            c.kind == ConversationKind::Private
                && c.participants.len() == 2
                && c.is_participant(a)
                && c.is_participant(b)
        }) {
            return (existing.clone(), false);
        }
        let now = Utc::now();
        let conversation = Conversation {
            id: self.new_id(),
            kind: ConversationKind::Private,
            participants: vec![a.to_string(), b.to_string()],
            last_message_id: None,
            unread_counts: [(a.to_string(), 0), (b.to_string(), 0)].into_iter().collect(),
            created_at: now,
            updated_at: now,
        };
        conversations.insert(conversation.id.clone(), conversation.clone());
        (conversation, true)
    }

    pub async fn get_conversation(&self, id: &str) -> Option<Conversation> {
        self.conversations.read().await.get(id).cloned()
    }

    pub async fn modify_conversation<F>(&self, id: &str, f: F) -> AppResult<Conversation>
    where
        F: FnOnce(&mut Conversation),
    {
        let mut conversations = self.conversations.write().await;
        let conversation = conversations
            .get_mut(id)
            .ok_or_else(|| AppError::NotFound(format!("conversation {} not found", id)))?;
        f(conversation);
        Ok(conversation.clone())
    }

    pub async fn conversations_for_user(&self, user_id: &str) -> Vec<Conversation> {
        self.conversations
            .read()
            .await
            .values()
            .filter(|c| c.is_participant(user_id))
            .cloned()
            .collect()
    }

    // ---- messages -------------------------------------------------------

    pub async fn insert_message(&self, message: Message) -> Message {
        self.messages
            .write()
            .await
            .insert(message.id.clone(), message.clone());
        message
    }

    pub async fn get_message(&self, id: &str) -> Option<Message> {
        self.messages.read().await.get(id).cloned()
    }

    pub async fn modify_message<F>(&self, id: &str, f: F) -> AppResult<Message>
    where
        F: FnOnce(&mut Message),
    {
        let mut messages = self.messages.write().await;
        let message = messages
            .get_mut(id)
            .ok_or_else(|| AppError::NotFound(format!("message {} not found", id)))?;
        f(message);
        Ok(message.clone())
    }

    pub async fn messages_in(&self, conversation_id: &str) -> Vec<Message> {
        self.messages
            .read()
            .await
            .values()
            .filter(|m| m.conversation_id == conversation_id)
            .cloned()
            .collect()
    }

    /// Apply `f` to every message of a conversation; returns how many
    /// messages reported a change.
    pub async fn modify_messages_in<F>(&self, conversation_id: &str, mut f: F) -> usize
    where
        F: FnMut(&mut Message) -> bool,
    {
        let mut messages = self.messages.write().await;
        let mut changed = 0;
        for message in messages
            .values_mut()
            .filter(|m| m.conversation_id == conversation_id)
        {
            if f(message) {
                changed += 1;
            }
        }
        changed
    }

    // ---- posts ----------------------------------------------------------

    pub async fn insert_post(&self, post: Post) -> Post {
        self.posts.write().await.insert(post.id.clone(), post.clone());
        post
    }

    pub async fn get_post(&self, id: &str) -> Option<Post> {
        self.posts.read().await.get(id).cloned()
    }

    pub async fn modify_post<F>(&self, id: &str, f: F) -> AppResult<Post>
    where
        F: FnOnce(&mut Post),
    {
        let mut posts = self.posts.write().await;
        let post = posts
            .get_mut(id)
            .ok_or_else(|| AppError::NotFound(format!("post {} not found", id)))?;
        f(post);
        Ok(post.clone())
    }

    pub async fn all_posts(&self) -> Vec<Post> {
        self.posts.read().await.values().cloned().collect()
    }

    // ---- likes ----------------------------------------------------------

    /// Toggle the `(post, user)` like row, create-if-absent / delete-if-
    /// present under one lock. Returns whether the row now exists.
    pub async fn toggle_like_row(&self, post_id: &str, user_id: &str) -> bool {
        let mut likes = self.likes.write().await;
        let key = (post_id.to_string(), user_id.to_string());
        if likes.remove(&key).is_some() {
            false
        } else {
            likes.insert(key, Utc::now());
            true
        }
    }

    pub async fn has_liked(&self, post_id: &str, user_id: &str) -> bool {
        self.likes
            .read()
            .await
            .contains_key(&(post_id.to_string(), user_id.to_string()))
    }

    pub async fn count_likes(&self, post_id: &str) -> u64 {
        self.likes
            .read()
            .await
            .keys()
            .filter(|(p, _)| p == post_id)
            .count() as u64
    }

    // ---- comments -------------------------------------------------------

    pub async fn insert_comment(&self, comment: Comment) -> Comment {
        self.comments
            .write()
            .await
            .insert(comment.id.clone(), comment.clone());
        comment
    }

    pub async fn get_comment(&self, id: &str) -> Option<Comment> {
        self.comments.read().await.get(id).cloned()
    }

    pub async fn modify_comment<F>(&self, id: &str, f: F) -> AppResult<Comment>
    where
        F: FnOnce(&mut Comment),
    {
        let mut comments = self.comments.write().await;
        let comment = comments
            .get_mut(id)
            .ok_or_else(|| AppError::NotFound(format!("comment {} not found", id)))?;
        f(comment);
        Ok(comment.clone())
    }

    pub async fn comments_for_post(&self, post_id: &str) -> Vec<Comment> {
        self.comments
            .read()
            .await
            .values()
            .filter(|c| c.post_id == post_id)
            .cloned()
            .collect()
    }

    pub async fn replies_of(&self, comment_id: &str) -> Vec<Comment> {
        self.comments
            .read()
            .await
            .values()
            .filter(|c| c.parent_comment_id.as_deref() == Some(comment_id))
            .cloned()
            .collect()
    }

    pub async fn count_replies(&self, comment_id: &str) -> u64 {
        self.comments
            .read()
            .await
            .values()
            .filter(|c| c.parent_comment_id.as_deref() == Some(comment_id))
            .count() as u64
    }

    /// Remove a comment and its direct replies. Returns the removed rows
    /// (the target first, when present).
    pub async fn remove_comment_tree(&self, comment_id: &str) -> Vec<Comment> {
        let mut comments = self.comments.write().await;
        let mut removed = Vec::new();
        if let Some(target) = comments.remove(comment_id) {
            removed.push(target);
        }
        let reply_ids: Vec<Id> = comments
            .values()
            .filter(|c| c.parent_comment_id.as_deref() == Some(comment_id))
            .map(|c| c.id.clone())
            .collect();
        for id in reply_ids {
            if let Some(reply) = comments.remove(&id) {
                removed.push(reply);
            }
        }
        removed
    }

    // ---- comment likes --------------------------------------------------

    pub async fn toggle_comment_like_row(&self, comment_id: &str, user_id: &str) -> bool {
        let mut likes = self.comment_likes.write().await;
        let key = (comment_id.to_string(), user_id.to_string());
        if likes.remove(&key).is_some() {
            false
        } else {
            likes.insert(key, Utc::now());
            true
        }
    }

    pub async fn has_liked_comment(&self, comment_id: &str, user_id: &str) -> bool {
        self.comment_likes
            .read()
            .await
            .contains_key(&(comment_id.to_string(), user_id.to_string()))
    }

    pub async fn count_comment_likes(&self, comment_id: &str) -> u64 {
        self.comment_likes
            .read()
            .await
            .keys()
            .filter(|(c, _)| c == comment_id)
            .count() as u64
    }

    pub async fn remove_comment_likes_for(&self, comment_ids: &[Id]) -> usize {
        let mut likes = self.comment_likes.write().await;
        let before = likes.len();
        likes.retain(|(c, _), _| !comment_ids.iter().any(|id| id == c));
        before - likes.len()
    }

    // ---- notifications --------------------------------------------------

    pub async fn insert_notification(&self, notification: Notification) -> Notification {
        self.notifications
            .write()
            .await
            .insert(notification.id.clone(), notification.clone());
        notification
    }

    pub async fn notifications_for(&self, recipient_id: &str) -> Vec<Notification> {
        self.notifications
            .read()
            .await
            .values()
            .filter(|n| n.recipient_id == recipient_id)
            .cloned()
            .collect()
    }

    /// Apply `f` to the recipient's notifications; returns the rows that
    /// reported a change.
    pub async fn modify_notifications<F>(&self, recipient_id: &str, mut f: F) -> Vec<Notification>
    where
        F: FnMut(&mut Notification) -> bool,
    {
        let mut notifications = self.notifications.write().await;
        let mut changed = Vec::new();
        for notification in notifications
            .values_mut()
            .filter(|n| n.recipient_id == recipient_id)
        {
            if f(notification) {
                changed.push(notification.clone());
            }
        }
        changed
    }

    /// Remove the recipient's notifications matching `pred`; returns the
    /// removed rows.
    pub async fn remove_notifications_where<F>(
        &self,
        recipient_id: &str,
        mut pred: F,
    ) -> Vec<Notification>
    where
        F: FnMut(&Notification) -> bool,
    {
        let mut notifications = self.notifications.write().await;
        let ids: Vec<Id> = notifications
            .values()
            .filter(|n| n.recipient_id == recipient_id && pred(n))
            .map(|n| n.id.clone())
            .collect();
        let mut removed = Vec::new();
        for id in ids {
            if let Some(n) = notifications.remove(&id) {
                removed.push(n);
            }
        }
        removed
    }

    pub async fn count_unread_notifications(&self, recipient_id: &str) -> u64 {
        self.notifications
            .read()
            .await
            .values()
            .filter(|n| {
                n.recipient_id == recipient_id
                    && n.status == crate::models::NotificationStatus::Unread
            })
            .count() as u64
    }
}
