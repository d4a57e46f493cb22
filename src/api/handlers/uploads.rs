// Copyright (c) Linknest Team
// SPDX-License-Identifier: Apache-2.0

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::api::routes::ApiResponse;
use crate::api::AppState;
use crate::error::AppResult;

const PRESIGN_TTL_SECONDS: u64 = 3600;

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    pub filename: String,
}

/// Accept a raw body upload into the given folder and hand back the storage
/// key plus a temporary URL.
pub async fn upload(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(folder): Path<String>,
    Query(query): Query<UploadQuery>,
    body: Bytes,
) -> AppResult<Json<ApiResponse<Value>>> {
    state.auth.require_auth(&headers).await?;
    let mime_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream");
    let key = state
        .storage
        .store(body.to_vec(), &query.filename, mime_type, &folder)
        .await?;
    let url = state.storage.presign(&key, PRESIGN_TTL_SECONDS).await?;
    Ok(Json(ApiResponse::success(json!({
        "key": key,
        "url": url,
    }))))
}
