//! authwire - JWT-aware authenticated HTTP client
//!
//! Transparently attaches, validates, and renews a JWT credential pair
//! (short-lived access token + longer-lived refresh token) around outgoing
//! HTTP calls. A centralized error handler reacts to authentication
//! failures by clearing the session and redirecting to the login entry
//! point.

pub mod api;
pub mod auth;
pub mod error;
pub mod handler;
pub mod jwt;
pub mod store;

pub use api::{AuthHttp, Request};
pub use auth::{AuthConfig, SessionService};
pub use error::AuthError;
pub use handler::{GlobalErrorHandler, HandlerOptions};
pub use store::{CredentialRecord, TokenStore};
