use async_trait::async_trait;

use super::session::Credential;
use crate::api::ApiError;

/// Issues access tokens in exchange for a username and password.
#[async_trait]
pub trait AuthService: Send + Sync {
    async fn authenticate(&self, username: &str, password: &str) -> Result<Credential, ApiError>;
}
