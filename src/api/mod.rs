// Copyright (c) Linknest Team
// SPDX-License-Identifier: Apache-2.0

mod handlers;
pub mod routes;

use anyhow::Result;
use axum::{
    routing::{delete, get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::auth::AuthService;
use crate::config::Config;
use crate::engines::{
    InteractionEngine, MessagingEngine, NotificationEngine, RelationshipEngine, UnreadsEngine,
};
use crate::external::ObjectStorage;
use crate::pubsub::PubSub;
use crate::store::Store;

/// Shared handler state: the store, the fan-out bus and every engine.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub bus: Arc<PubSub>,
    pub auth: Arc<AuthService>,
    pub unreads: Arc<UnreadsEngine>,
    pub notifications: Arc<NotificationEngine>,
    pub relationships: Arc<RelationshipEngine>,
    pub messaging: Arc<MessagingEngine>,
    pub interactions: Arc<InteractionEngine>,
    pub storage: Arc<dyn ObjectStorage>,
}

/// Start the API server
pub async fn start_api_server(state: AppState) -> Result<()> {
    let config = Config::get();

    // Set up CORS
    let cors = if config.api.enable_cors {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        CorsLayer::permissive()
    };

    // Create router with all routes
    let app = Router::new()
        // General routes
        .route("/health", get(handlers::health::health_check))
        .route("/metrics", get(handlers::metrics::get_metrics))
        // Auth routes
        .route("/api/auth/register", post(handlers::auth::register))
        .route("/api/auth/login", post(handlers::auth::login))
        .route("/api/auth/logout", post(handlers::auth::logout))
        .route("/api/auth/me", get(handlers::auth::me))
        // User and link routes
        .route("/api/users/search", get(handlers::links::search_users))
        .route("/api/links", get(handlers::links::my_links))
        .route(
            "/api/links/requests/received",
            get(handlers::links::received_requests),
        )
        .route(
            "/api/links/requests/sent",
            get(handlers::links::sent_requests),
        )
        .route(
            "/api/links/requests/:user_id",
            post(handlers::links::send_request).delete(handlers::links::withdraw_request),
        )
        .route(
            "/api/links/requests/:user_id/accept",
            post(handlers::links::accept_request),
        )
        .route(
            "/api/links/requests/:user_id/reject",
            post(handlers::links::reject_request),
        )
        .route("/api/links/:user_id", delete(handlers::links::remove_link))
        .route("/api/links/:user_id/state", get(handlers::links::link_state))
        // Conversation and message routes
        .route(
            "/api/conversations",
            get(handlers::conversations::my_conversations),
        )
        .route(
            "/api/conversations/search",
            get(handlers::conversations::search_conversations),
        )
        .route(
            "/api/conversations/:id/messages",
            get(handlers::conversations::get_messages),
        )
        .route(
            "/api/conversations/:id/seen",
            post(handlers::conversations::mark_seen),
        )
        .route("/api/messages", post(handlers::conversations::send_message))
        .route(
            "/api/messages/:id",
            delete(handlers::conversations::delete_message),
        )
        // Post and comment routes
        .route(
            "/api/posts",
            get(handlers::posts::feed).post(handlers::posts::create_post),
        )
        .route("/api/posts/:id", get(handlers::posts::get_post))
        .route("/api/posts/:id/like", post(handlers::posts::toggle_like))
        .route(
            "/api/posts/:id/comments",
            get(handlers::posts::get_comments).post(handlers::posts::add_comment),
        )
        .route(
            "/api/posts/:id/counters",
            get(handlers::posts::verify_counters).post(handlers::posts::sync_counters),
        )
        .route(
            "/api/comments/:id",
            axum::routing::patch(handlers::posts::edit_comment)
                .delete(handlers::posts::delete_comment),
        )
        .route(
            "/api/comments/:id/like",
            post(handlers::posts::toggle_comment_like),
        )
        .route(
            "/api/comments/:id/replies",
            get(handlers::posts::get_replies),
        )
        // Notification and unread routes
        .route(
            "/api/notifications",
            get(handlers::notifications::my_notifications)
                .delete(handlers::notifications::delete_all),
        )
        .route(
            "/api/notifications/read",
            post(handlers::notifications::mark_read),
        )
        .route(
            "/api/notifications/read-all",
            post(handlers::notifications::mark_all_read),
        )
        .route(
            "/api/notifications/:id",
            delete(handlers::notifications::delete_one),
        )
        .route("/api/unreads", get(handlers::notifications::my_unreads))
        .route(
            "/api/unreads/sync",
            post(handlers::notifications::sync_unreads),
        )
        .route(
            "/api/unreads/verify",
            get(handlers::notifications::verify_unreads),
        )
        // Live subscription routes
        .route(
            "/api/subscribe/conversations",
            get(handlers::subscribe::conversations),
        )
        .route(
            "/api/subscribe/conversations/:id/messages",
            get(handlers::subscribe::conversation_messages),
        )
        .route("/api/subscribe/links", get(handlers::subscribe::links))
        .route(
            "/api/subscribe/notifications",
            get(handlers::subscribe::notifications),
        )
        .route("/api/subscribe/unreads", get(handlers::subscribe::unreads))
        .route("/api/subscribe/posts/:id", get(handlers::subscribe::post))
        // Upload routes
        .route("/api/uploads/:folder", post(handlers::uploads::upload))
        // Add state and middleware
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    // Get bind address
    let addr = format!("{}:{}", config.server.host, config.server.port).parse::<SocketAddr>()?;

    // Start server
    info!("Starting API server on {}", addr);
    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await?;

    Ok(())
}
