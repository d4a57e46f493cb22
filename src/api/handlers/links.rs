// Copyright (c) Linknest Team
// SPDX-License-Identifier: Apache-2.0

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};
use serde::Deserialize;

use crate::api::routes::ApiResponse;
use crate::api::AppState;
use crate::engines::relationship::{LinkMutation, LinkState};
use crate::error::AppResult;
use crate::models::UserSummary;

pub async fn send_request(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(user_id): Path<String>,
) -> AppResult<Json<ApiResponse<LinkMutation>>> {
    let actor = state.auth.require_auth(&headers).await?;
    let mutation = state.relationships.send_link_request(&actor, &user_id).await?;
    Ok(Json(ApiResponse::success(mutation)))
}

pub async fn withdraw_request(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(user_id): Path<String>,
) -> AppResult<Json<ApiResponse<LinkMutation>>> {
    let actor = state.auth.require_auth(&headers).await?;
    let mutation = state
        .relationships
        .withdraw_link_request(&actor, &user_id)
        .await?;
    Ok(Json(ApiResponse::success(mutation)))
}

pub async fn accept_request(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(user_id): Path<String>,
) -> AppResult<Json<ApiResponse<LinkMutation>>> {
    let actor = state.auth.require_auth(&headers).await?;
    let mutation = state
        .relationships
        .accept_link_request(&actor, &user_id)
        .await?;
    Ok(Json(ApiResponse::success(mutation)))
}

pub async fn reject_request(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(user_id): Path<String>,
) -> AppResult<Json<ApiResponse<LinkMutation>>> {
    let actor = state.auth.require_auth(&headers).await?;
    let mutation = state
        .relationships
        .reject_link_request(&actor, &user_id)
        .await?;
    Ok(Json(ApiResponse::success(mutation)))
}

pub async fn remove_link(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(user_id): Path<String>,
) -> AppResult<Json<ApiResponse<LinkMutation>>> {
    let actor = state.auth.require_auth(&headers).await?;
    let mutation = state.relationships.remove_link(&actor, &user_id).await?;
    Ok(Json(ApiResponse::success(mutation)))
}

pub async fn my_links(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<Json<ApiResponse<Vec<UserSummary>>>> {
    let actor = state.auth.require_auth(&headers).await?;
    let links = state.relationships.my_links(&actor).await?;
    Ok(Json(ApiResponse::success(links)))
}

pub async fn received_requests(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<Json<ApiResponse<Vec<UserSummary>>>> {
    let actor = state.auth.require_auth(&headers).await?;
    let requests = state.relationships.received_requests(&actor).await?;
    Ok(Json(ApiResponse::success(requests)))
}

pub async fn sent_requests(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<Json<ApiResponse<Vec<UserSummary>>>> {
    let actor = state.auth.require_auth(&headers).await?;
    let requests = state.relationships.sent_requests(&actor).await?;
    Ok(Json(ApiResponse::success(requests)))
}

#[derive(Debug, Deserialize)]
pub struct UserSearchQuery {
    pub q: String,
}

/// User discovery for link requests: substring match on username/full name,
/// excluding the caller.
pub async fn search_users(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<UserSearchQuery>,
) -> AppResult<Json<ApiResponse<Vec<UserSummary>>>> {
    let actor = state.auth.require_auth(&headers).await?;
    let mut users = state.store.search_users(&query.q).await;
    users.retain(|u| u.id != actor.id);
    users.sort_by(|a, b| a.username.cmp(&b.username));
    Ok(Json(ApiResponse::success(
        users.iter().map(UserSummary::from).collect(),
    )))
}

pub async fn link_state(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(user_id): Path<String>,
) -> AppResult<Json<ApiResponse<LinkState>>> {
    let actor = state.auth.require_auth(&headers).await?;
    let link_state = state.relationships.link_state(&actor, &user_id).await?;
    Ok(Json(ApiResponse::success(link_state)))
}
