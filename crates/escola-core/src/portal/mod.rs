//! Navigation layer of the portal.
//!
//! - `guard`: per-navigation render/redirect decisions
//! - `access`: role to routes and menu entries
//! - `routes`: the portal route tree and redirect handling
//! - `login`: login form submit state

pub mod access;
pub mod guard;
pub mod login;
pub mod routes;

pub use access::{AccessPolicy, Menu, NavEntry, RoleArea, HOME_PATH};
pub use guard::{authorize, authorize_chain, Decision, Guard};
pub use login::{LoginForm, SubmitError, Submission};
pub use routes::{after_login_target, Navigation, RouteTable, View, LOGIN_PATH, UNAUTHORIZED_PATH};
