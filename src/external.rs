// Copyright (c) Linknest Team
// SPDX-License-Identifier: Apache-2.0

//! Narrow interfaces to collaborators that live outside this service:
//! object storage (store a blob, sign a key into a temporary URL) and
//! outbound push/email delivery. The core only ever talks to these traits;
//! delivery failures are logged by the callers and never abort a mutation.

use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Store a blob and return its storage key.
    async fn store(
        &self,
        bytes: Vec<u8>,
        filename: &str,
        mime_type: &str,
        folder: &str,
    ) -> AppResult<String>;

    /// Sign a key into a temporary URL.
    async fn presign(&self, key: &str, ttl_seconds: u64) -> AppResult<String>;
}

#[async_trait]
pub trait ExternalNotifier: Send + Sync {
    /// Deliver a push/email for the given user. Best-effort.
    async fn notify_externally(
        &self,
        user_id: &str,
        title: &str,
        body: &str,
        data: &serde_json::Value,
    ) -> AppResult<()>;
}

/// Default storage backend: accepts everything, signs nothing real.
/// Stands in until a bucket-backed implementation is wired up.
pub struct NullObjectStorage;

#[async_trait]
impl ObjectStorage for NullObjectStorage {
    async fn store(
        &self,
        bytes: Vec<u8>,
        filename: &str,
        _mime_type: &str,
        folder: &str,
    ) -> AppResult<String> {
        if bytes.is_empty() {
            return Err(AppError::InvalidArgument("empty upload".to_string()));
        }
        let key = format!("{}/{}-{}", folder, Uuid::new_v4(), filename);
        debug!("stored {} bytes at {}", bytes.len(), key);
        Ok(key)
    }

    async fn presign(&self, key: &str, ttl_seconds: u64) -> AppResult<String> {
        Ok(format!("https://cdn.invalid/{}?ttl={}", key, ttl_seconds))
    }
}

/// Default delivery backend: logs the payload and reports success.
pub struct LogNotifier;

#[async_trait]
impl ExternalNotifier for LogNotifier {
    async fn notify_externally(
        &self,
        user_id: &str,
        title: &str,
        _body: &str,
        _data: &serde_json::Value,
    ) -> AppResult<()> {
        debug!("external notify for {}: {}", user_id, title);
        Ok(())
    }
}
