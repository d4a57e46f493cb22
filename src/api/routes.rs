// Copyright (c) Linknest Team
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};

use crate::config::Config;

/// Standard API response wrapper
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

/// Pagination parameters
#[derive(Debug, Default, Deserialize)]
pub struct PaginationParams {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl PaginationParams {
    pub fn limit(&self) -> usize {
        let config = Config::get();
        self.limit
            .unwrap_or(config.api.default_page_size)
            .min(config.api.max_page_size)
    }

    pub fn offset(&self) -> usize {
        self.offset.unwrap_or(0)
    }
}
