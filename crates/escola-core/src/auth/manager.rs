//! Session lifecycle: restore on startup, login, logout, revalidation.
//!
//! `AuthManager` is the single owner of the current `Session`. Views and the
//! navigator either borrow it or hold a `watch::Receiver` from `subscribe()`;
//! every mutation is published before the mutating call returns.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::authorizer::Authorizer;
use super::service::AuthService;
use super::session::{Credential, Session};
use super::store::{SessionStore, StoreError};
use super::token::{decode_claims, Claims, DecodeError};
use crate::api::ApiError;

/// Shown for every login failure so the form never reveals which field was
/// wrong or whether the server was reachable.
pub const INVALID_CREDENTIALS_MESSAGE: &str = "Usuário ou senha inválidos.";

#[derive(Error, Debug)]
pub enum LoginError {
    #[error("Credentials rejected: {0}")]
    Rejected(#[source] ApiError),

    #[error("Authentication service unavailable: {0}")]
    Unavailable(#[source] ApiError),

    #[error("Issued credential is unusable: {0}")]
    Decode(#[from] DecodeError),

    #[error("Failed to persist credential: {0}")]
    Store(#[from] StoreError),
}

impl From<ApiError> for LoginError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Unauthorized | ApiError::AccessDenied(_) | ApiError::InvalidResponse(_) => {
                LoginError::Rejected(err)
            }
            _ => LoginError::Unavailable(err),
        }
    }
}

impl LoginError {
    pub fn user_message(&self) -> &'static str {
        INVALID_CREDENTIALS_MESSAGE
    }
}

pub struct AuthManager {
    store: Box<dyn SessionStore>,
    service: Arc<dyn AuthService>,
    credential_tx: watch::Sender<Option<Credential>>,
    session_tx: watch::Sender<Session>,
}

impl AuthManager {
    /// Create a manager in the unauthenticated state. Call `initialize()`
    /// once to restore a persisted session.
    pub fn new(store: Box<dyn SessionStore>, service: Arc<dyn AuthService>) -> Self {
        let (session_tx, _) = watch::channel(Session::Unauthenticated);
        let (credential_tx, _) = watch::channel(None);
        Self {
            store,
            service,
            credential_tx,
            session_tx,
        }
    }

    /// Restore the session from the store. A stored token that no longer
    /// decodes is discarded.
    pub fn initialize(&mut self) -> Session {
        match self.store.load() {
            Ok(Some(credential)) => match decode_claims(credential.as_str()) {
                Ok(claims) => {
                    info!(username = %claims.username, role = %claims.role, "Session restored");
                    self.credential_tx.send_replace(Some(credential));
                    self.publish(Session::Authenticated(claims));
                }
                Err(e) => {
                    warn!(error = %e, "Stored credential rejected, logging out");
                    self.logout();
                }
            },
            Ok(None) => {
                debug!("No stored credential");
            }
            Err(e) => {
                warn!(error = %e, "Failed to read stored credential, logging out");
                self.logout();
            }
        }
        self.session()
    }

    /// Log in, reporting only success or failure. The session is left
    /// untouched on failure.
    pub async fn login(&mut self, username: &str, password: &str) -> bool {
        match self.login_detailed(username, password).await {
            Ok(_) => true,
            Err(e) => {
                warn!(username = username, error = %e, "Login failed");
                false
            }
        }
    }

    pub async fn login_detailed(&mut self, username: &str, password: &str) -> Result<Claims, LoginError> {
        let credential = self.service.authenticate(username, password).await?;

        // Decode before persisting so an unusable token never reaches the store.
        let claims = decode_claims(credential.as_str())?;
        self.store.save(&credential)?;

        info!(username = %claims.username, role = %claims.role, "Login successful");
        self.credential_tx.send_replace(Some(credential));
        self.publish(Session::Authenticated(claims.clone()));
        Ok(claims)
    }

    /// Drop the session and the stored token. Safe to call repeatedly.
    pub fn logout(&mut self) {
        if let Err(e) = self.store.clear() {
            warn!(error = %e, "Failed to clear stored credential");
        }
        self.credential_tx.send_replace(None);
        if self.publish(Session::Unauthenticated) {
            info!("Logged out");
        }
    }

    /// Re-decode the held token and force a logout if it has expired or
    /// otherwise stopped decoding.
    pub fn revalidate(&mut self) -> Session {
        let failure = self
            .credential_tx
            .borrow()
            .as_ref()
            .and_then(|credential| decode_claims(credential.as_str()).err());

        if let Some(e) = failure {
            warn!(error = %e, "Held credential no longer valid, logging out");
            self.logout();
        }
        self.session()
    }

    pub fn session(&self) -> Session {
        self.session_tx.borrow().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.session_tx.borrow().is_authenticated()
    }

    pub fn current_user(&self) -> Option<Claims> {
        self.session_tx.borrow().claims().cloned()
    }

    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.session_tx.subscribe()
    }

    /// Credential attachment for outgoing API requests. The returned
    /// authorizer follows later logins and logouts.
    pub fn authorizer(&self) -> Authorizer {
        Authorizer::tracking(self.credential_tx.subscribe())
    }

    pub fn store(&self) -> &dyn SessionStore {
        self.store.as_ref()
    }

    /// Returns whether subscribers saw a change.
    fn publish(&self, session: Session) -> bool {
        self.session_tx.send_if_modified(|current| {
            if *current == session {
                false
            } else {
                *current = session;
                true
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::auth::store::MemoryStore;
    use crate::auth::token::testing;
    use crate::auth::Role;

    enum Reply {
        Token(String),
        Status(reqwest::StatusCode),
    }

    struct StubService {
        password: &'static str,
        reply: Reply,
        calls: AtomicUsize,
    }

    impl StubService {
        fn issuing(token: String) -> Arc<Self> {
            Arc::new(Self {
                password: "correct",
                reply: Reply::Token(token),
                calls: AtomicUsize::new(0),
            })
        }

        fn failing(status: reqwest::StatusCode) -> Arc<Self> {
            Arc::new(Self {
                password: "correct",
                reply: Reply::Status(status),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl AuthService for StubService {
        async fn authenticate(&self, _username: &str, password: &str) -> Result<Credential, ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if password != self.password {
                return Err(ApiError::Unauthorized);
            }
            match self.reply {
                Reply::Token(ref token) => Ok(Credential::new(token.clone())),
                Reply::Status(status) => Err(ApiError::from_status(status, "")),
            }
        }
    }

    struct ReadOnlyStore;

    impl SessionStore for ReadOnlyStore {
        fn load(&self) -> Result<Option<Credential>, StoreError> {
            Ok(None)
        }

        fn save(&self, _credential: &Credential) -> Result<(), StoreError> {
            Err(StoreError::Io(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only")))
        }

        fn clear(&self) -> Result<(), StoreError> {
            Ok(())
        }
    }

    fn manager_with(store: MemoryStore, service: Arc<StubService>) -> AuthManager {
        AuthManager::new(Box::new(store), service)
    }

    #[tokio::test]
    async fn test_login_rejected() {
        let service = StubService::issuing(testing::student("aluno1"));
        let mut auth = manager_with(MemoryStore::new(), service.clone());
        auth.initialize();

        assert!(!auth.login("aluno1", "wrongpass").await);
        assert_eq!(auth.session(), Session::Unauthenticated);
        assert!(!auth.authorizer().is_armed());
        assert!(auth.store().load().unwrap().is_none());
        assert_eq!(service.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_login_success() {
        let token = testing::student("aluno1");
        let mut auth = manager_with(MemoryStore::new(), StubService::issuing(token.clone()));
        auth.initialize();

        assert!(auth.login("aluno1", "correct").await);

        let user = auth.current_user().expect("Expected authenticated session");
        assert_eq!(user.role, Role::Student);
        assert_eq!(user.username, "aluno1");
        assert_eq!(auth.store().load().unwrap(), Some(Credential::new(token.clone())));
        assert_eq!(auth.authorizer().header_value(), Some(format!("Bearer {}", token)));
    }

    #[tokio::test]
    async fn test_login_server_error_keeps_prior_session() {
        let token = testing::coordinator("coord1");
        let store = MemoryStore::with_credential(Credential::new(token.clone()));
        let mut auth = manager_with(store, StubService::failing(reqwest::StatusCode::SERVICE_UNAVAILABLE));
        auth.initialize();
        let before = auth.session();
        assert!(before.is_authenticated());

        let err = auth.login_detailed("coord1", "correct").await.unwrap_err();
        assert!(matches!(err, LoginError::Unavailable(_)));
        assert_eq!(err.user_message(), INVALID_CREDENTIALS_MESSAGE);
        assert_eq!(auth.session(), before);
        assert_eq!(auth.authorizer().header_value(), Some(format!("Bearer {}", token)));
    }

    #[tokio::test]
    async fn test_login_with_undecodable_token_stores_nothing() {
        let mut auth = manager_with(MemoryStore::new(), StubService::issuing("garbage".to_string()));
        auth.initialize();

        let err = auth.login_detailed("aluno1", "correct").await.unwrap_err();
        assert!(matches!(err, LoginError::Decode(_)));
        assert!(!auth.is_authenticated());
        assert!(auth.store().load().unwrap().is_none());
        assert!(!auth.authorizer().is_armed());
    }

    #[tokio::test]
    async fn test_login_fails_when_store_rejects_write() {
        let mut auth = AuthManager::new(
            Box::new(ReadOnlyStore),
            StubService::issuing(testing::student("aluno1")),
        );
        auth.initialize();

        let err = auth.login_detailed("aluno1", "correct").await.unwrap_err();
        assert!(matches!(err, LoginError::Store(_)));
        assert!(!auth.is_authenticated());
        assert!(!auth.authorizer().is_armed());
    }

    #[test]
    fn test_initialize_restores_session() {
        let token = testing::coordinator("coord1");
        let store = MemoryStore::with_credential(Credential::new(token.clone()));
        let mut auth = manager_with(store, StubService::failing(reqwest::StatusCode::UNAUTHORIZED));

        let session = auth.initialize();
        assert_eq!(session.role(), Some(&Role::Coordinator));
        assert_eq!(auth.authorizer().header_value(), Some(format!("Bearer {}", token)));
    }

    #[test]
    fn test_initialize_discards_expired_token() {
        let store = MemoryStore::with_credential(Credential::new(testing::expired("aluno1")));
        let mut auth = manager_with(store, StubService::failing(reqwest::StatusCode::UNAUTHORIZED));

        assert_eq!(auth.initialize(), Session::Unauthenticated);
        assert!(auth.store().load().unwrap().is_none());
        assert!(!auth.authorizer().is_armed());
    }

    #[test]
    fn test_initialize_discards_malformed_token() {
        let store = MemoryStore::with_credential(Credential::new("not.a.jwt"));
        let mut auth = manager_with(store, StubService::failing(reqwest::StatusCode::UNAUTHORIZED));

        assert_eq!(auth.initialize(), Session::Unauthenticated);
        assert!(auth.store().load().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_logout_is_idempotent() {
        let mut auth = manager_with(MemoryStore::new(), StubService::issuing(testing::student("aluno1")));
        auth.initialize();
        assert!(auth.login("aluno1", "correct").await);

        auth.logout();
        assert_eq!(auth.session(), Session::Unauthenticated);
        assert!(auth.store().load().unwrap().is_none());
        assert!(!auth.authorizer().is_armed());

        auth.logout();
        assert_eq!(auth.session(), Session::Unauthenticated);
        assert!(auth.store().load().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_subscribers_see_every_transition() {
        let mut auth = manager_with(MemoryStore::new(), StubService::issuing(testing::student("aluno1")));
        auth.initialize();
        let mut rx = auth.subscribe();
        assert!(!rx.has_changed().unwrap());

        assert!(auth.login("aluno1", "correct").await);
        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().is_authenticated());

        auth.logout();
        assert!(rx.has_changed().unwrap());
        assert!(!rx.borrow_and_update().is_authenticated());

        // Already logged out: nothing new to publish.
        auth.logout();
        assert!(!rx.has_changed().unwrap());
    }

    #[tokio::test]
    async fn test_authorizer_disarmed_by_later_logout() {
        let token = testing::student("aluno1");
        let mut auth = manager_with(MemoryStore::new(), StubService::issuing(token.clone()));
        auth.initialize();
        assert!(auth.login("aluno1", "correct").await);

        let authorizer = auth.authorizer();
        assert_eq!(authorizer.header_value(), Some(format!("Bearer {}", token)));

        auth.logout();
        assert!(!authorizer.is_armed());
        let request = authorizer
            .attach(reqwest::Client::new().get("http://localhost/api/boletim/"))
            .unwrap()
            .build()
            .unwrap();
        assert!(request.headers().get(reqwest::header::AUTHORIZATION).is_none());
    }

    #[tokio::test]
    async fn test_authorizer_armed_by_later_login() {
        let token = testing::coordinator("coord1");
        let mut auth = manager_with(MemoryStore::new(), StubService::issuing(token.clone()));
        auth.initialize();

        let authorizer = auth.authorizer();
        assert!(!authorizer.is_armed());

        assert!(auth.login("coord1", "correct").await);
        assert_eq!(authorizer.header_value(), Some(format!("Bearer {}", token)));
    }

    #[test]
    fn test_revalidate_forces_logout_on_expired_token() {
        let store = MemoryStore::with_credential(Credential::new(testing::student("aluno1")));
        let mut auth = manager_with(store, StubService::failing(reqwest::StatusCode::UNAUTHORIZED));
        auth.initialize();
        assert!(auth.revalidate().is_authenticated());

        // Simulate the held token aging past its expiry.
        let expired = Credential::new(testing::expired("aluno1"));
        auth.store().save(&expired).unwrap();
        auth.credential_tx.send_replace(Some(expired));

        assert_eq!(auth.revalidate(), Session::Unauthenticated);
        assert!(auth.store().load().unwrap().is_none());
        assert!(!auth.authorizer().is_armed());
    }
}
