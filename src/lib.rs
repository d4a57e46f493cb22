pub mod api;
pub mod auth;
pub mod config;
pub mod engines;
pub mod error;
pub mod events;
pub mod external;
pub mod metrics;
pub mod models;
pub mod pubsub;
pub mod store;
