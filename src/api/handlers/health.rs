// Copyright (c) Linknest Team
// SPDX-License-Identifier: Apache-2.0

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "message": "API server is running"
        })),
    )
}
