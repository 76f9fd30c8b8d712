//! Authentication module for the portal client.
//!
//! This module provides:
//! - `decode_claims`: structural decoding of JWT access tokens into `Claims`
//! - `SessionStore`: single-slot token persistence (file, keyring, memory)
//! - `AuthManager`: owner of the current `Session`, login and logout
//! - `Authorizer`: per-request bearer attachment for API calls

pub mod authorizer;
pub mod manager;
pub mod service;
pub mod session;
pub mod store;
pub mod token;

pub use authorizer::Authorizer;
pub use manager::{AuthManager, LoginError, INVALID_CREDENTIALS_MESSAGE};
pub use service::AuthService;
pub use session::{Credential, Session};
pub use store::{FileStore, KeyringStore, MemoryStore, SessionStore, StoreError};
pub use token::{decode_claims, Claims, DecodeError, Role};
