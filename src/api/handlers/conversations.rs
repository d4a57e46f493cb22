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
use crate::engines::messaging::SendOutcome;
use crate::error::AppResult;
use crate::models::{ConversationView, MessageView};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageBody {
    pub recipient_id: String,
    pub body: String,
    #[serde(default = "default_message_type")]
    pub message_type: String,
}

fn default_message_type() -> String {
    "text".to_string()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkSeenBody {
    #[serde(default)]
    pub message_ids: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: String,
}

pub async fn send_message(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<SendMessageBody>,
) -> AppResult<Json<ApiResponse<SendOutcome>>> {
    let actor = state.auth.require_auth(&headers).await?;
    let outcome = state
        .messaging
        .send_message(&actor, &body.recipient_id, &body.body, &body.message_type)
        .await?;
    Ok(Json(ApiResponse::success(outcome)))
}

pub async fn my_conversations(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<Json<ApiResponse<Vec<ConversationView>>>> {
    let actor = state.auth.require_auth(&headers).await?;
    let conversations = state.messaging.my_conversations(&actor).await?;
    Ok(Json(ApiResponse::success(conversations)))
}

pub async fn search_conversations(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<SearchQuery>,
) -> AppResult<Json<ApiResponse<Vec<ConversationView>>>> {
    let actor = state.auth.require_auth(&headers).await?;
    let hits = state.messaging.search_conversations(&actor, &query.q).await?;
    Ok(Json(ApiResponse::success(hits)))
}

pub async fn get_messages(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(conversation_id): Path<String>,
    Query(pagination): Query<PaginationParams>,
) -> AppResult<Json<ApiResponse<Vec<MessageView>>>> {
    let actor = state.auth.require_auth(&headers).await?;
    let messages = state
        .messaging
        .get_messages(
            &actor,
            &conversation_id,
            pagination.limit(),
            pagination.offset(),
        )
        .await?;
    Ok(Json(ApiResponse::success(messages)))
}

pub async fn mark_seen(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(conversation_id): Path<String>,
    Json(body): Json<MarkSeenBody>,
) -> AppResult<Json<ApiResponse<Value>>> {
    let actor = state.auth.require_auth(&headers).await?;
    let marked = state
        .messaging
        .mark_seen(&actor, &conversation_id, body.message_ids)
        .await?;
    Ok(Json(ApiResponse::success(json!({ "marked": marked }))))
}

pub async fn delete_message(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(message_id): Path<String>,
) -> AppResult<Json<ApiResponse<Value>>> {
    let actor = state.auth.require_auth(&headers).await?;
    state.messaging.delete_message_for_me(&actor, &message_id).await?;
    Ok(Json(ApiResponse::success(json!({ "deleted": true }))))
}
