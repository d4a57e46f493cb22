// Copyright (c) Linknest Team
// SPDX-License-Identifier: Apache-2.0

use axum::http::{header, StatusCode};
use axum::response::IntoResponse;

use crate::metrics;

/// Prometheus exposition endpoint
pub async fn get_metrics() -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics::gather(),
    )
}
