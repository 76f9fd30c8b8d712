//! Login form state.
//!
//! The pending flag lives here, not in the session: while a submit is in
//! flight the session keeps its previous value and a second submit is
//! refused.

use std::fmt;

use thiserror::Error;
use tracing::debug;

use super::routes::after_login_target;
use crate::auth::{AuthManager, INVALID_CREDENTIALS_MESSAGE};

/// Maximum username length
const MAX_USERNAME_LENGTH: usize = 150;

/// Maximum password length
const MAX_PASSWORD_LENGTH: usize = 128;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubmitError {
    #[error("Login already in progress")]
    Pending,

    #[error("Username and password required")]
    MissingFields,

    #[error("{0}")]
    Failed(String),
}

/// Credentials captured by an accepted submit.
#[derive(Clone, PartialEq, Eq)]
pub struct Submission {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Submission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Submission")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Default)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
    error: Option<String>,
    pending: bool,
    remember: Option<String>,
}

impl LoginForm {
    /// `remember` is the page the guard redirected away from, if any.
    pub fn new(remember: Option<String>) -> Self {
        Self {
            remember,
            ..Self::default()
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn push_username_char(&mut self, c: char) -> bool {
        if can_add_char(self.username.len(), MAX_USERNAME_LENGTH, c) {
            self.username.push(c);
            true
        } else {
            false
        }
    }

    pub fn push_password_char(&mut self, c: char) -> bool {
        if can_add_char(self.password.len(), MAX_PASSWORD_LENGTH, c) {
            self.password.push(c);
            true
        } else {
            false
        }
    }

    /// Start a submit. Fails without side effects if one is already pending.
    pub fn begin_submit(&mut self) -> Result<Submission, SubmitError> {
        if self.pending {
            debug!("Ignoring submit while login is pending");
            return Err(SubmitError::Pending);
        }

        let username = self.username.trim().to_string();
        if username.is_empty() || self.password.is_empty() {
            self.error = Some(SubmitError::MissingFields.to_string());
            return Err(SubmitError::MissingFields);
        }

        self.error = None;
        self.pending = true;
        Ok(Submission {
            username,
            password: self.password.clone(),
        })
    }

    /// Settle the pending submit. Returns the path to navigate to on success.
    pub fn finish_submit(&mut self, success: bool) -> Option<String> {
        self.pending = false;
        self.password.clear();

        if success {
            self.error = None;
            Some(after_login_target(self.remember.as_deref()))
        } else {
            self.error = Some(INVALID_CREDENTIALS_MESSAGE.to_string());
            None
        }
    }

    /// Submit through `auth` and return where to navigate next.
    pub async fn submit(&mut self, auth: &mut AuthManager) -> Result<String, SubmitError> {
        let submission = self.begin_submit()?;
        let success = auth.login(&submission.username, &submission.password).await;
        self.finish_submit(success)
            .ok_or_else(|| SubmitError::Failed(INVALID_CREDENTIALS_MESSAGE.to_string()))
    }
}

fn can_add_char(current_len: usize, max_len: usize, c: char) -> bool {
    current_len < max_len && !c.is_control()
}
