//! Core library for rchat - a Rocket.Chat REST client.
//!
//! This crate provides:
//! - Configuration loading and management
//! - XDG-compliant path resolution
//! - Schema and example config generation
//! - A declarative route table and a single dispatcher for the REST API
//! - Token management with on-disk persistence and transparent refresh
//! - Unread message tracking backed by a per-channel watermark cache
//! - Common types and error handling

pub mod cache;
pub mod config;
pub mod error;
pub mod paths;
pub mod rocket;
pub mod schema;

pub use cache::{ChannelCache, ChannelState};
pub use config::{
    AppConfig, AuthConfig, LogLevel, LoggingConfig, PathsConfig, ServerConfig, UnreadConfig,
};
pub use error::{CoreError, Result};
pub use paths::{AppPaths, default_cache_dir, default_config_dir, default_state_dir};
pub use rocket::{
    ChannelType, CredentialSource, Credentials, Message, MessageQuery, ReqwestTransport, Room,
    Session, SessionBuilder, Token, TokenStorage, Transport, User,
};
pub use schema::{generate_example_config, generate_schema};

/// Application name used for config directories and environment prefix.
pub const APP_NAME: &str = "rchat";

/// Returns the environment variable prefix for this application.
#[must_use]
pub fn env_prefix() -> String {
    APP_NAME
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}
