//! REST API client module for the portal backend.
//!
//! This module provides the `ApiClient` for obtaining access tokens from the
//! authentication endpoint and for issuing authenticated data requests.
//! Authorization is attached per request through an `Authorizer` derived
//! from the current session.

pub mod client;
pub mod error;

pub use client::ApiClient;
pub use error::ApiError;
