//! Rocket.Chat REST binding.
//!
//! This module provides:
//! - The route table and the session that dispatches it
//! - Credentials, token lifecycle and token storage
//! - Typed wrappers for users, rooms, messages and server routes
//! - History queries and unread resolution

pub mod auth;
pub mod chat;
pub mod client;
pub mod messages;
pub mod models;
pub mod rooms;
pub mod routes;
pub mod server;
pub mod storage;
pub mod users;

#[cfg(test)]
mod testing;

pub use auth::{CredentialSource, Credentials, TokenManager};
pub use client::{HttpRequest, HttpResponse, ReqwestTransport, Session, SessionBuilder, Transport};
pub use messages::{MessageQuery, SortOrder};
pub use models::{
    ChannelType, History, Message, MessageUser, OutgoingMessage, Presence, Room, ServerInfo, Token,
    User, UserEmail,
};
pub use rooms::RoleAction;
pub use routes::{HttpMethod, Route, RouteRequest, ROUTES, find_route};
pub use server::LivechatRole;
pub use storage::{StoredToken, TokenStorage};
pub use users::NewUser;
