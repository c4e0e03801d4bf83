//! Collabdesk API - REST API server
//!
//! This crate provides the HTTP surface of Collabdesk: API key
//! authentication, campaign and recipient management, campaign dispatch,
//! the template catalog, reminders and the analytics dashboard.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod openapi;
pub mod routes;

pub use auth::{issue_api_key, AppState, AuthContext};
pub use openapi::{create_openapi_routes, ApiDoc};
pub use routes::create_router;
