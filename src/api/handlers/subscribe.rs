// Copyright (c) Linknest Team
// SPDX-License-Identifier: Apache-2.0

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::{future, stream::Stream, StreamExt};
use serde::Deserialize;
use serde_json::json;
use std::convert::Infallible;
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tracing::warn;

use crate::api::AppState;
use crate::auth::{self, AuthedUser};
use crate::error::{AppError, AppResult};
use crate::metrics;
use crate::pubsub::{EventEnvelope, Topic};

#[derive(Debug, Default, Deserialize)]
pub struct TokenQuery {
    pub token: Option<String>,
}

/// EventSource clients cannot set request headers, so the session token may
/// also arrive as a `token` query parameter.
async fn sse_auth(
    state: &AppState,
    headers: &HeaderMap,
    query: &TokenQuery,
) -> AppResult<AuthedUser> {
    let token = auth::bearer_token(headers)
        .or_else(|| query.token.clone())
        .ok_or_else(|| AppError::Unauthenticated("missing bearer token".to_string()))?;
    state.auth.authenticate_token(&token).await
}

struct SubscriptionGuard;

impl SubscriptionGuard {
    fn new() -> Self {
        metrics::ACTIVE_SUBSCRIPTIONS.inc();
        SubscriptionGuard
    }
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        metrics::ACTIVE_SUBSCRIPTIONS.dec();
    }
}

/// Turn a broadcast receiver into an SSE stream. Lagged receivers skip the
/// dropped events and keep going. `transform` runs per delivered envelope,
/// for viewer-relative rewrites.
fn sse_stream<F>(
    rx: broadcast::Receiver<EventEnvelope>,
    mut transform: F,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>>
where
    F: FnMut(&mut EventEnvelope) + Send + 'static,
{
    let guard = SubscriptionGuard::new();
    let stream = BroadcastStream::new(rx).filter_map(move |item| {
        let _keep = &guard;
        future::ready(match item {
            Ok(mut envelope) => {
                transform(&mut envelope);
                match Event::default().json_data(&envelope) {
                    Ok(event) => Some(Ok(event)),
                    Err(e) => {
                        warn!("failed to encode event for delivery: {}", e);
                        None
                    }
                }
            }
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                warn!("subscriber lagged, {} events dropped", skipped);
                None
            }
        })
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}

pub async fn conversations(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<TokenQuery>,
) -> AppResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let actor = sse_auth(&state, &headers, &query).await?;
    let rx = state
        .bus
        .subscribe(&Topic::Conversation(actor.id.clone()), &actor)?;
    Ok(sse_stream(rx, |_| {}))
}

pub async fn links(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<TokenQuery>,
) -> AppResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let actor = sse_auth(&state, &headers, &query).await?;
    let rx = state
        .bus
        .subscribe(&Topic::LinkRequestUpdated(actor.id.clone()), &actor)?;
    Ok(sse_stream(rx, |_| {}))
}

pub async fn notifications(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<TokenQuery>,
) -> AppResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let actor = sse_auth(&state, &headers, &query).await?;
    let rx = state
        .bus
        .subscribe(&Topic::Notification(actor.id.clone()), &actor)?;
    Ok(sse_stream(rx, |_| {}))
}

pub async fn unreads(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<TokenQuery>,
) -> AppResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let actor = sse_auth(&state, &headers, &query).await?;
    let rx = state
        .bus
        .subscribe(&Topic::UserUnreads(actor.id.clone()), &actor)?;
    Ok(sse_stream(rx, |_| {}))
}

/// Post topics are open to any valid session, but the post must exist.
pub async fn post(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(post_id): Path<String>,
    Query(query): Query<TokenQuery>,
) -> AppResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let actor = sse_auth(&state, &headers, &query).await?;
    state
        .store
        .get_post(&post_id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("post {} not found", post_id)))?;
    let rx = state.bus.subscribe(&Topic::PostUpdated(post_id), &actor)?;
    Ok(sse_stream(rx, |_| {}))
}

/// Message stream of one conversation. Participant-gated by the messaging
/// engine; `isSenderYou` is rewritten per subscriber since the published
/// payload is viewer-neutral.
pub async fn conversation_messages(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(conversation_id): Path<String>,
    Query(query): Query<TokenQuery>,
) -> AppResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let actor = sse_auth(&state, &headers, &query).await?;
    let rx = state
        .messaging
        .subscribe_messages(&actor, &conversation_id)
        .await?;
    let actor_id = actor.id;
    Ok(sse_stream(rx, move |envelope| {
        personalize_message(envelope, &actor_id)
    }))
}

/// Published message payloads carry a viewer-neutral `isSenderYou`; restore
/// the per-subscriber value before delivery.
fn personalize_message(envelope: &mut EventEnvelope, viewer_id: &str) {
    if let Some(message) = envelope.payload.get_mut("message") {
        let is_you = message["sender"]["id"].as_str() == Some(viewer_id);
        message["isSenderYou"] = json!(is_you);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::testutil::{authed, seed_user, world};

    #[tokio::test]
    async fn message_stream_marks_sender_per_subscriber() {
        let w = world();
        let alice = seed_user(&w.store, "alice").await;
        let bob = seed_user(&w.store, "bob").await;

        let outcome = w
            .messaging
            .send_message(&authed(&alice), &bob.id, "hello", "text")
            .await
            .unwrap();
        let conversation_id = outcome.conversation.id.clone();

        let mut alice_rx = w
            .messaging
            .subscribe_messages(&authed(&alice), &conversation_id)
            .await
            .unwrap();
        let mut bob_rx = w
            .messaging
            .subscribe_messages(&authed(&bob), &conversation_id)
            .await
            .unwrap();

        w.messaging
            .send_message(&authed(&alice), &bob.id, "you there?", "text")
            .await
            .unwrap();

        let mut for_alice = alice_rx.recv().await.unwrap();
        let mut for_bob = bob_rx.recv().await.unwrap();
        personalize_message(&mut for_alice, &alice.id);
        personalize_message(&mut for_bob, &bob.id);

        assert_eq!(for_alice.payload["message"]["isSenderYou"], true);
        assert_eq!(for_bob.payload["message"]["isSenderYou"], false);
        assert_eq!(
            for_bob.payload["message"]["sender"]["id"],
            serde_json::Value::String(alice.id.clone())
        );
    }

    #[tokio::test]
    async fn payloads_without_a_message_are_left_alone() {
        let mut envelope = EventEnvelope {
            topic: "CONVERSATION_u1".to_string(),
            payload: json!({"conversation": {"id": "c1"}}),
            published_at: chrono::Utc::now(),
        };
        let before = envelope.payload.clone();
        personalize_message(&mut envelope, "u1");
        assert_eq!(envelope.payload, before);
    }
}
