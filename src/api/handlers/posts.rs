// Copyright (c) Linknest Team
// SPDX-License-Identifier: Apache-2.0

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::api::routes::{ApiResponse, PaginationParams};
use crate::api::AppState;
use crate::auth;
use crate::engines::interaction::{CounterReport, LikeOutcome};
use crate::error::AppResult;
use crate::models::{CommentView, PostKind, PostView};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePostBody {
    pub caption: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(flatten)]
    pub kind: PostKind,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddCommentBody {
    pub text: String,
    pub parent_comment_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EditCommentBody {
    pub text: String,
}

/// Viewer identity for read endpoints: anonymous when no token is presented,
/// authenticated otherwise. A presented token that fails validation is an
/// error, not an anonymous fallback.
async fn viewer_id(state: &AppState, headers: &HeaderMap) -> AppResult<String> {
    match auth::bearer_token(headers) {
        Some(token) => Ok(state.auth.authenticate_token(&token).await?.id),
        None => Ok(String::new()),
    }
}

pub async fn create_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CreatePostBody>,
) -> AppResult<Json<ApiResponse<PostView>>> {
    let actor = state.auth.require_auth(&headers).await?;
    let post = state
        .interactions
        .create_post(&actor, body.caption, body.tags, body.kind)
        .await?;
    Ok(Json(ApiResponse::success(post)))
}

pub async fn feed(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(pagination): Query<PaginationParams>,
) -> AppResult<Json<ApiResponse<Vec<PostView>>>> {
    let viewer = viewer_id(&state, &headers).await?;
    let posts = state
        .interactions
        .feed(&viewer, pagination.limit(), pagination.offset())
        .await?;
    Ok(Json(ApiResponse::success(posts)))
}

pub async fn get_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(post_id): Path<String>,
) -> AppResult<Json<ApiResponse<PostView>>> {
    let viewer = viewer_id(&state, &headers).await?;
    let post = state.interactions.get_post(&viewer, &post_id).await?;
    Ok(Json(ApiResponse::success(post)))
}

pub async fn toggle_like(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(post_id): Path<String>,
) -> AppResult<Json<ApiResponse<LikeOutcome>>> {
    let actor = state.auth.require_auth(&headers).await?;
    let outcome = state.interactions.toggle_like(&actor, &post_id).await?;
    Ok(Json(ApiResponse::success(outcome)))
}

pub async fn get_comments(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(post_id): Path<String>,
    Query(pagination): Query<PaginationParams>,
) -> AppResult<Json<ApiResponse<Vec<CommentView>>>> {
    let viewer = viewer_id(&state, &headers).await?;
    let comments = state
        .interactions
        .get_comments(&viewer, &post_id, pagination.limit(), pagination.offset())
        .await?;
    Ok(Json(ApiResponse::success(comments)))
}

pub async fn add_comment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(post_id): Path<String>,
    Json(body): Json<AddCommentBody>,
) -> AppResult<Json<ApiResponse<CommentView>>> {
    let actor = state.auth.require_auth(&headers).await?;
    let comment = state
        .interactions
        .add_comment(&actor, &post_id, &body.text, body.parent_comment_id)
        .await?;
    Ok(Json(ApiResponse::success(comment)))
}

pub async fn edit_comment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(comment_id): Path<String>,
    Json(body): Json<EditCommentBody>,
) -> AppResult<Json<ApiResponse<CommentView>>> {
    let actor = state.auth.require_auth(&headers).await?;
    let comment = state
        .interactions
        .edit_comment(&actor, &comment_id, &body.text)
        .await?;
    Ok(Json(ApiResponse::success(comment)))
}

pub async fn delete_comment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(comment_id): Path<String>,
) -> AppResult<Json<ApiResponse<Value>>> {
    let actor = state.auth.require_auth(&headers).await?;
    state.interactions.delete_comment(&actor, &comment_id).await?;
    Ok(Json(ApiResponse::success(json!({ "deleted": true }))))
}

pub async fn toggle_comment_like(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(comment_id): Path<String>,
) -> AppResult<Json<ApiResponse<Value>>> {
    let actor = state.auth.require_auth(&headers).await?;
    let liked = state
        .interactions
        .toggle_comment_like(&actor, &comment_id)
        .await?;
    Ok(Json(ApiResponse::success(json!({ "liked": liked }))))
}

pub async fn get_replies(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(comment_id): Path<String>,
    Query(pagination): Query<PaginationParams>,
) -> AppResult<Json<ApiResponse<Vec<CommentView>>>> {
    let viewer = viewer_id(&state, &headers).await?;
    let replies = state
        .interactions
        .get_comment_replies(&viewer, &comment_id, pagination.limit(), pagination.offset())
        .await?;
    Ok(Json(ApiResponse::success(replies)))
}

pub async fn verify_counters(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(post_id): Path<String>,
) -> AppResult<Json<ApiResponse<CounterReport>>> {
    state.auth.require_auth(&headers).await?;
    let report = state.interactions.verify_post_counters(&post_id).await?;
    Ok(Json(ApiResponse::success(report)))
}

pub async fn sync_counters(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(post_id): Path<String>,
) -> AppResult<Json<ApiResponse<CounterReport>>> {
    state.auth.require_auth(&headers).await?;
    let report = state.interactions.sync_post_counters(&post_id).await?;
    Ok(Json(ApiResponse::success(report)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthService;
    use crate::engines::testutil::{seed_user, world};
    use crate::error::AppError;
    use crate::external::NullObjectStorage;
    use std::sync::Arc;

    fn app_state() -> (AppState, crate::engines::testutil::World) {
        let w = world();
        let state = AppState {
            store: w.store.clone(),
            bus: w.bus.clone(),
            auth: Arc::new(AuthService::new(w.store.clone())),
            unreads: w.unreads.clone(),
            notifications: w.notifications.clone(),
            relationships: w.relationships.clone(),
            messaging: w.messaging.clone(),
            interactions: w.interactions.clone(),
            storage: Arc::new(NullObjectStorage),
        };
        (state, w)
    }

    fn bearer(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::AUTHORIZATION,
            format!("Bearer {}", token).parse().unwrap(),
        );
        headers
    }

    #[tokio::test]
    async fn missing_token_reads_as_anonymous() {
        let (state, _w) = app_state();
        let viewer = viewer_id(&state, &HeaderMap::new()).await.unwrap();
        assert_eq!(viewer, "");
    }

    #[tokio::test]
    async fn valid_token_reads_as_the_session_user() {
        let (state, w) = app_state();
        let alice = seed_user(&w.store, "alice").await;
        let token = w.store.create_session(&alice.id).await;
        let viewer = viewer_id(&state, &bearer(&token)).await.unwrap();
        assert_eq!(viewer, alice.id);
    }

    #[tokio::test]
    async fn invalid_token_is_rejected_not_anonymous() {
        let (state, _w) = app_state();
        let err = viewer_id(&state, &bearer("not-a-session")).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthenticated(_)));
    }
}
