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
use crate::engines::unreads::UnreadDrift;
use crate::error::AppResult;
use crate::models::{NotificationView, UserUnreads};

#[derive(Debug, Deserialize)]
pub struct MarkReadBody {
    pub ids: Vec<String>,
}

pub async fn my_notifications(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(pagination): Query<PaginationParams>,
) -> AppResult<Json<ApiResponse<Vec<NotificationView>>>> {
    let actor = state.auth.require_auth(&headers).await?;
    let notifications = state
        .notifications
        .my_notifications(&actor, pagination.limit(), pagination.offset())
        .await?;
    Ok(Json(ApiResponse::success(notifications)))
}

pub async fn mark_read(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<MarkReadBody>,
) -> AppResult<Json<ApiResponse<Value>>> {
    let actor = state.auth.require_auth(&headers).await?;
    let read = state.notifications.mark_read(&actor, &body.ids).await?;
    Ok(Json(ApiResponse::success(json!({ "read": read }))))
}

pub async fn mark_all_read(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<Json<ApiResponse<Value>>> {
    let actor = state.auth.require_auth(&headers).await?;
    let read = state.notifications.mark_all_read(&actor).await?;
    Ok(Json(ApiResponse::success(json!({ "read": read }))))
}

pub async fn delete_one(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(notification_id): Path<String>,
) -> AppResult<Json<ApiResponse<Value>>> {
    let actor = state.auth.require_auth(&headers).await?;
    state.notifications.delete_one(&actor, &notification_id).await?;
    Ok(Json(ApiResponse::success(json!({ "deleted": true }))))
}

pub async fn delete_all(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<Json<ApiResponse<Value>>> {
    let actor = state.auth.require_auth(&headers).await?;
    let deleted = state.notifications.delete_all(&actor).await?;
    Ok(Json(ApiResponse::success(json!({ "deleted": deleted }))))
}

pub async fn my_unreads(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<Json<ApiResponse<UserUnreads>>> {
    let actor = state.auth.require_auth(&headers).await?;
    let unreads = state.unreads.total_unreads(&actor.id).await?;
    Ok(Json(ApiResponse::success(unreads)))
}

pub async fn sync_unreads(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<Json<ApiResponse<UserUnreads>>> {
    let actor = state.auth.require_auth(&headers).await?;
    let unreads = state.unreads.sync_unreads(&actor.id).await?;
    Ok(Json(ApiResponse::success(unreads)))
}

pub async fn verify_unreads(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<Json<ApiResponse<UnreadDrift>>> {
    let actor = state.auth.require_auth(&headers).await?;
    let drift = state.unreads.verify_unreads(&actor.id).await?;
    Ok(Json(ApiResponse::success(drift)))
}
