// Copyright (c) Linknest Team
// SPDX-License-Identifier: Apache-2.0

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::env;

static CONFIG: OnceCell<Config> = OnceCell::new();

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub pubsub: PubSubConfig,
    pub api: ApiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub bcrypt_cost: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PubSubConfig {
    /// Per-topic broadcast channel capacity; lagging subscribers drop oldest events.
    pub channel_capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub enable_cors: bool,
    pub default_page_size: usize,
    pub max_page_size: usize,
}

impl Config {
    pub fn from_env() -> Self {
        // Load .env file if present
        let _ = dotenv::dotenv();

        Config {
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
                port: env::var("SERVER_PORT")
                    .unwrap_or_else(|_| "8080".to_string())
                    .parse()
                    .expect("SERVER_PORT must be a number"),
            },
            auth: AuthConfig {
                bcrypt_cost: env::var("BCRYPT_COST")
                    .unwrap_or_else(|_| bcrypt::DEFAULT_COST.to_string())
                    .parse()
                    .expect("BCRYPT_COST must be a number"),
            },
            pubsub: PubSubConfig {
                channel_capacity: env::var("PUBSUB_CHANNEL_CAPACITY")
                    .unwrap_or_else(|_| "256".to_string())
                    .parse()
                    .expect("PUBSUB_CHANNEL_CAPACITY must be a number"),
            },
            api: ApiConfig {
                enable_cors: env::var("ENABLE_CORS")
                    .map(|v| v == "true" || v == "1")
                    .unwrap_or(true),
                default_page_size: env::var("DEFAULT_PAGE_SIZE")
                    .unwrap_or_else(|_| "20".to_string())
                    .parse()
                    .expect("DEFAULT_PAGE_SIZE must be a number"),
                max_page_size: env::var("MAX_PAGE_SIZE")
                    .unwrap_or_else(|_| "100".to_string())
                    .parse()
                    .expect("MAX_PAGE_SIZE must be a number"),
            },
        }
    }

    /// Initialize the global configuration from the environment.
    pub fn init() -> anyhow::Result<&'static Config> {
        Ok(CONFIG.get_or_init(Config::from_env))
    }

    /// Get the global configuration, initializing from the environment on first use.
    pub fn get() -> &'static Config {
        CONFIG.get_or_init(Config::from_env)
    }
}
