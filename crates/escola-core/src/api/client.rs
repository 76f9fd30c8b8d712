//! API client for the portal backend.
//!
//! The client is stateless with respect to authentication: callers pass an
//! `Authorizer` for each data request instead of mutating shared headers.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::{header, Client};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, warn};

use crate::auth::{AuthService, Authorizer, Credential};

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// Token endpoint, relative to the API base URL
const TOKEN_PATH: &str = "/api/token/";

/// Default HTTP request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for rate-limited (429) data requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

#[derive(Serialize)]
struct TokenRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access: String,
}

/// API client for the portal backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    /// Exchange a username and password for an access token
    pub async fn obtain_token(&self, username: &str, password: &str) -> Result<Credential, ApiError> {
        let url = self.url(TOKEN_PATH);
        debug!(url = %url, username = username, "Requesting access token");

        let response = self
            .client
            .post(&url)
            .header(header::ACCEPT, "application/json")
            .json(&TokenRequest { username, password })
            .send()
            .await?;

        let response = Self::check_response(response).await?;

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(format!("token response: {}", e)))?;

        if token.access.is_empty() {
            return Err(ApiError::InvalidResponse("token response: empty access token".to_string()));
        }

        Ok(Credential::new(token.access))
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    /// Authenticated GET returning parsed JSON. Rate-limited requests are
    /// retried with exponential backoff.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str, auth: &Authorizer) -> Result<T, ApiError> {
        let url = self.url(path);
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let request = auth
                .attach(self.client.get(&url))
                .map_err(|e| ApiError::InvalidResponse(format!("unusable credential: {}", e)))?;

            let response = request.send().await?;

            match Self::check_response(response).await {
                Ok(response) => {
                    return response
                        .json()
                        .await
                        .map_err(|e| ApiError::InvalidResponse(format!("{}: {}", url, e)));
                }
                Err(ApiError::RateLimited) => {
                    retries += 1;
                    if retries > MAX_RATE_LIMIT_RETRIES {
                        return Err(ApiError::RateLimited);
                    }
                    warn!(url = %url, retry = retries, backoff_ms = backoff_ms, "Rate limited, backing off");
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms *= 2;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[async_trait]
impl AuthService for ApiClient {
    async fn authenticate(&self, username: &str, password: &str) -> Result<Credential, ApiError> {
        self.obtain_token(username, password).await
    }
}
