//! Navigation guards.
//!
//! A guard only inspects the session; it never touches storage or the
//! network. Guards stack the way nested route elements do: the first
//! non-`Render` decision wins.

use crate::auth::{Role, Session};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Render,
    /// Send the user to the login page, returning to `remember` afterwards.
    RedirectToLogin { remember: String },
    RedirectToUnauthorized,
}

/// Decide whether `session` may see `requested_path`. An absent or empty
/// role set only requires a logged-in user.
pub fn authorize(session: &Session, required_roles: Option<&[Role]>, requested_path: &str) -> Decision {
    let claims = match session.claims() {
        Some(claims) => claims,
        None => {
            return Decision::RedirectToLogin {
                remember: requested_path.to_string(),
            }
        }
    };

    match required_roles {
        Some(roles) if !roles.is_empty() && !roles.contains(&claims.role) => Decision::RedirectToUnauthorized,
        _ => Decision::Render,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Guard {
    required_roles: Option<Vec<Role>>,
}

impl Guard {
    /// Login check only
    pub fn authenticated() -> Self {
        Self::default()
    }

    pub fn roles<I, R>(roles: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<Role>,
    {
        Self {
            required_roles: Some(roles.into_iter().map(Into::into).collect()),
        }
    }

    pub fn required_roles(&self) -> Option<&[Role]> {
        self.required_roles.as_deref()
    }

    pub fn check(&self, session: &Session, requested_path: &str) -> Decision {
        authorize(session, self.required_roles(), requested_path)
    }
}

/// Run nested guards outermost first.
pub fn authorize_chain(guards: &[Guard], session: &Session, requested_path: &str) -> Decision {
    guards
        .iter()
        .map(|guard| guard.check(session, requested_path))
        .find(|decision| *decision != Decision::Render)
        .unwrap_or(Decision::Render)
}
