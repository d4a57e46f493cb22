// Copyright (c) Linknest Team
// SPDX-License-Identifier: Apache-2.0

use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::models::{User, UserSummary, UserUnreads};
use crate::store::Store;

/// The identity established for a request or subscription handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthedUser {
    pub id: String,
    pub username: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterInput {
    pub username: String,
    pub full_name: String,
    pub email: String,
    pub password: String,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginInput {
    /// Username or email.
    pub identifier: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthOutcome {
    pub token: String,
    pub user: UserSummary,
}

/// Registration, credential verification and bearer-token sessions.
pub struct AuthService {
    store: Arc<Store>,
}

impl AuthService {
    pub fn new(store: Arc<Store>) -> Self {
        AuthService { store }
    }

    pub async fn register(&self, input: RegisterInput) -> AppResult<User> {
        let username = input.username.trim();
        if username.len() < 3 {
            return Err(AppError::InvalidArgument(
                "username must be at least 3 characters".to_string(),
            ));
        }
        if !input.email.contains('@') {
            return Err(AppError::InvalidArgument("invalid email".to_string()));
        }
        if input.password.len() < 8 {
            return Err(AppError::InvalidArgument(
                "password must be at least 8 characters".to_string(),
            ));
        }
        let password_hash = bcrypt::hash(&input.password, Config::get().auth.bcrypt_cost)
            .map_err(|e| AppError::Internal(format!("failed to hash password: {}", e)))?;
        let user = User {
            id: self.store.new_id(),
            username: username.to_string(),
            full_name: input.full_name.trim().to_string(),
            email: input.email.trim().to_string(),
            password_hash,
            avatar_url: input.avatar_url,
            sent_links: Vec::new(),
            received_links: Vec::new(),
            links: Vec::new(),
            unreads: UserUnreads::default(),
            created_at: Utc::now(),
        };
        let user = self.store.create_user(user).await?;
        info!("registered user {} ({})", user.username, user.id);
        Ok(user)
    }

    pub async fn login(&self, input: LoginInput) -> AppResult<AuthOutcome> {
        let user = self
            .store
            .find_user_by_login(&input.identifier)
            .await
            .ok_or_else(|| AppError::Unauthenticated("invalid credentials".to_string()))?;
        let valid = bcrypt::verify(&input.password, &user.password_hash)
            .map_err(|e| AppError::Internal(format!("failed to verify password: {}", e)))?;
        if !valid {
            // Same error for unknown user and wrong password.
            return Err(AppError::Unauthenticated("invalid credentials".to_string()));
        }
        let token = self.store.create_session(&user.id).await;
        Ok(AuthOutcome {
            token,
            user: UserSummary::from(&user),
        })
    }

    pub async fn logout(&self, token: &str) -> bool {
        self.store.remove_session(token).await
    }

    /// Resolve a bearer token to an authenticated user.
    pub async fn authenticate_token(&self, token: &str) -> AppResult<AuthedUser> {
        let user_id = self
            .store
            .session_user(token)
            .await
            .ok_or_else(|| AppError::Unauthenticated("invalid or expired session".to_string()))?;
        let user = self.store.require_user(&user_id).await?;
        Ok(AuthedUser {
            id: user.id,
            username: user.username,
        })
    }

    /// `requireAuth` for HTTP requests: `Authorization: Bearer <token>`.
    pub async fn require_auth(&self, headers: &HeaderMap) -> AppResult<AuthedUser> {
        let token = bearer_token(headers)
            .ok_or_else(|| AppError::Unauthenticated("missing bearer token".to_string()))?;
        self.authenticate_token(&token).await
    }
}

pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))
        .map(|t| t.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> AuthService {
        AuthService::new(Arc::new(Store::new()))
    }

    fn input(username: &str, email: &str) -> RegisterInput {
        RegisterInput {
            username: username.to_string(),
            full_name: format!("{} Person", username),
            email: email.to_string(),
            password: "hunter2hunter2".to_string(),
            avatar_url: None,
        }
    }

    #[tokio::test]
    async fn register_and_login_round_trip() {
        let auth = service();
        let user = auth.register(input("alice", "alice@example.com")).await.unwrap();
        let outcome = auth
            .login(LoginInput {
                identifier: "alice".to_string(),
                password: "hunter2hunter2".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(outcome.user.id, user.id);

        let authed = auth.authenticate_token(&outcome.token).await.unwrap();
        assert_eq!(authed.id, user.id);
    }

    #[tokio::test]
    async fn wrong_password_is_unauthenticated() {
        let auth = service();
        auth.register(input("bob", "bob@example.com")).await.unwrap();
        let err = auth
            .login(LoginInput {
                identifier: "bob".to_string(),
                password: "wrong-password".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthenticated(_)));
    }

    #[tokio::test]
    async fn duplicate_username_conflicts() {
        let auth = service();
        auth.register(input("carol", "carol@example.com")).await.unwrap();
        let err = auth
            .register(input("carol", "other@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn unknown_token_is_rejected() {
        let auth = service();
        let err = auth.authenticate_token("nope").await.unwrap_err();
        assert!(matches!(err, AppError::Unauthenticated(_)));
    }
}
