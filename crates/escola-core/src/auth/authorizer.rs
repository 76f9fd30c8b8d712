use std::fmt;

use reqwest::header::{self, HeaderMap, HeaderValue, InvalidHeaderValue};
use reqwest::RequestBuilder;
use tokio::sync::watch;

use super::session::Credential;

/// Per-request credential attachment.
///
/// Reads the auth manager's credential at request time, so an authorizer
/// taken before a logout stops sending the token once the logout happens.
/// An unarmed authorizer leaves requests untouched.
#[derive(Clone)]
pub struct Authorizer {
    credential: watch::Receiver<Option<Credential>>,
}

impl Authorizer {
    pub(crate) fn tracking(credential: watch::Receiver<Option<Credential>>) -> Self {
        Self { credential }
    }

    /// Authorizer pinned to a fixed credential, detached from any manager.
    fn fixed(credential: Option<Credential>) -> Self {
        let (_, rx) = watch::channel(credential);
        Self::tracking(rx)
    }

    pub fn anonymous() -> Self {
        Self::fixed(None)
    }

    pub fn bearer(credential: Credential) -> Self {
        Self::fixed(Some(credential))
    }

    pub fn is_armed(&self) -> bool {
        self.credential.borrow().is_some()
    }

    /// `Authorization` header value, when armed
    pub fn header_value(&self) -> Option<String> {
        self.credential.borrow().as_ref().map(Credential::bearer)
    }

    pub fn headers(&self) -> Result<HeaderMap, InvalidHeaderValue> {
        let mut headers = HeaderMap::new();
        if let Some(value) = self.header_value() {
            let mut value = HeaderValue::from_str(&value)?;
            value.set_sensitive(true);
            headers.insert(header::AUTHORIZATION, value);
        }
        Ok(headers)
    }

    pub fn attach(&self, request: RequestBuilder) -> Result<RequestBuilder, InvalidHeaderValue> {
        Ok(request.headers(self.headers()?))
    }
}

impl Default for Authorizer {
    fn default() -> Self {
        Self::anonymous()
    }
}

impl fmt::Debug for Authorizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Authorizer").field("armed", &self.is_armed()).finish()
    }
}
