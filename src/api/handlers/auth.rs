// Copyright (c) Linknest Team
// SPDX-License-Identifier: Apache-2.0

use axum::{extract::State, http::HeaderMap, Json};
use serde_json::{json, Value};

use crate::api::routes::ApiResponse;
use crate::api::AppState;
use crate::auth::{AuthOutcome, LoginInput, RegisterInput};
use crate::error::AppResult;
use crate::models::UserSummary;

/// Register and open a session in one step.
pub async fn register(
    State(state): State<AppState>,
    Json(input): Json<RegisterInput>,
) -> AppResult<Json<ApiResponse<AuthOutcome>>> {
    let user = state.auth.register(input).await?;
    let token = state.store.create_session(&user.id).await;
    Ok(Json(ApiResponse::success(AuthOutcome {
        token,
        user: UserSummary::from(&user),
    })))
}

pub async fn login(
    State(state): State<AppState>,
    Json(input): Json<LoginInput>,
) -> AppResult<Json<ApiResponse<AuthOutcome>>> {
    let outcome = state.auth.login(input).await?;
    Ok(Json(ApiResponse::success(outcome)))
}

pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<Json<ApiResponse<Value>>> {
    // Validates the token before dropping the session.
    state.auth.require_auth(&headers).await?;
    if let Some(token) = crate::auth::bearer_token(&headers) {
        state.auth.logout(&token).await;
    }
    Ok(Json(ApiResponse::success(json!({ "loggedOut": true }))))
}

pub async fn me(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<Json<ApiResponse<UserSummary>>> {
    let actor = state.auth.require_auth(&headers).await?;
    let user = state.store.require_user(&actor.id).await?;
    Ok(Json(ApiResponse::success(UserSummary::from(&user))))
}
