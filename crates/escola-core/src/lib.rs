//! Core library for the school portal client.
//!
//! Decodes access tokens, persists them, owns the login session, and decides
//! per navigation whether a page renders or redirects.

pub mod api;
pub mod auth;
pub mod config;
pub mod portal;

pub use api::{ApiClient, ApiError};
pub use auth::{AuthManager, Claims, Credential, Role, Session};
pub use config::{Config, StoreBackend};
pub use portal::{AccessPolicy, Decision, Navigation, RouteTable, View};
