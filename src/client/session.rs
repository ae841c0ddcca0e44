//! Client-side identity state.
//!
//! A [`SessionManager`] owns the attached credential and the identity it
//! stands for. Hosts call [`SessionManager::initialize`] once at start-up and
//! await it before enabling login controls, then observe state through
//! [`SessionManager::snapshot`] or [`SessionManager::subscribe`]. Every change
//! goes through the manager's operations, which run one at a time.

use tokio::sync::{watch, Mutex};

use crate::client::{
    credential_store::CredentialStore,
    transport::{ClientError, Transport},
};
use crate::models::{
    auth::{LoginRequest, RegisterRequest, UpdateDetailsRequest, UpdatePasswordRequest},
    user::UserProfile,
};

const REGISTRATION_FAILED: &str = "Registration failed";
const LOGIN_FAILED: &str = "Login failed";
const UPDATE_FAILED: &str = "Update failed";
const PASSWORD_UPDATE_FAILED: &str = "Password update failed";

/// Where a session is in its start-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Lifecycle {
    /// `initialize` has not run yet.
    #[default]
    Uninitialized,
    /// A stored credential is being checked against the server.
    Restoring,
    /// Start-up is over. The session may be anonymous or authenticated.
    Ready,
}

/// An immutable view of the session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    pub user: Option<UserProfile>,
    /// Always equal to `user.is_some()`.
    pub is_authenticated: bool,
    /// True until start-up has finished.
    pub loading: bool,
    /// The message of the last failed operation.
    pub error: Option<String>,
    pub lifecycle: Lifecycle,
    /// Bumped on every change.
    pub version: u64,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            user: None,
            is_authenticated: false,
            loading: true,
            error: None,
            lifecycle: Lifecycle::Uninitialized,
            version: 0,
        }
    }
}

pub struct SessionManager<T, S> {
    transport: T,
    store: S,
    state: watch::Sender<SessionState>,
    op_lock: Mutex<()>,
}

impl<T: Transport, S: CredentialStore> SessionManager<T, S> {
    pub fn new(transport: T, store: S) -> Self {
        let (state, _) = watch::channel(SessionState::default());
        Self {
            transport,
            store,
            state,
            op_lock: Mutex::new(()),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// The current state.
    pub fn snapshot(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// A receiver notified on every state change.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    fn update(&self, change: impl FnOnce(&mut SessionState)) -> SessionState {
        self.state.send_modify(|state| {
            change(state);
            state.is_authenticated = state.user.is_some();
            state.version += 1;
        });
        self.snapshot()
    }

    fn fail(&self, err: &ClientError, fallback: &str) {
        let message = err.message_or(fallback);
        tracing::debug!("Session operation failed: {}", err);
        self.update(|state| state.error = Some(message));
    }

    /// Restores the session from the credential store.
    ///
    /// Runs once. Later calls return the current snapshot without touching
    /// the server. A stored credential the server does not accept, or a
    /// server that cannot be reached, leaves the session anonymous with the
    /// credential discarded.
    pub async fn initialize(&self) -> SessionState {
        let _guard = self.op_lock.lock().await;
        if self.state.borrow().lifecycle != Lifecycle::Uninitialized {
            return self.snapshot();
        }

        self.update(|state| {
            state.lifecycle = Lifecycle::Restoring;
            state.loading = true;
        });

        match self.restore().await {
            Ok(Some(user)) => {
                tracing::info!("✅ Session restored for user: {}", user.id);
                self.update(|state| state.user = Some(user));
            }
            Ok(None) => tracing::debug!("No stored credential, starting anonymous"),
            Err(e) => {
                tracing::warn!("⚠️ Error checking authentication: {}", e);
                if let Err(e) = self.reset().await {
                    tracing::warn!("⚠️ Failed to clear stored credential: {}", e);
                }
            }
        }

        self.update(|state| {
            state.loading = false;
            state.lifecycle = Lifecycle::Ready;
        })
    }

    async fn restore(&self) -> Result<Option<UserProfile>, ClientError> {
        let Some(token) = self.store.load().await? else {
            return Ok(None);
        };
        self.transport.set_token(Some(token));
        Ok(Some(self.transport.me().await?))
    }

    /// Detaches and forgets the credential. State is reset even when the
    /// store fails to clear.
    async fn reset(&self) -> Result<(), ClientError> {
        self.transport.set_token(None);
        let cleared = self.store.clear().await;
        self.update(|state| state.user = None);
        cleared.map_err(ClientError::from)
    }

    /// Keeps `token` as the session's credential and resolves the identity
    /// behind it. If the identity cannot be fetched the credential is
    /// discarded again.
    async fn adopt(
        &self,
        token: String,
        user: Option<UserProfile>,
    ) -> Result<UserProfile, ClientError> {
        self.store.save(&token).await?;
        self.transport.set_token(Some(token));

        let user = match user {
            Some(user) => user,
            None => match self.transport.me().await {
                Ok(user) => user,
                Err(e) => {
                    if let Err(clear) = self.reset().await {
                        tracing::warn!("⚠️ Failed to clear stored credential: {}", clear);
                    }
                    return Err(e);
                }
            },
        };

        self.update(|state| state.user = Some(user.clone()));
        Ok(user)
    }

    /// Creates an identity and signs in as it.
    pub async fn register(&self, req: RegisterRequest) -> Result<UserProfile, ClientError> {
        let _guard = self.op_lock.lock().await;
        self.update(|state| state.error = None);

        let result = match self.transport.register(&req).await {
            Ok(response) => self.adopt(response.token, response.user).await,
            Err(e) => Err(e),
        };

        result.inspect_err(|e| self.fail(e, REGISTRATION_FAILED))
    }

    /// Signs in and loads the canonical identity.
    pub async fn login(&self, email: &str, password: &str) -> Result<UserProfile, ClientError> {
        let _guard = self.op_lock.lock().await;
        self.update(|state| state.error = None);

        let req = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        let result = match self.transport.login(&req).await {
            Ok(response) => self.adopt(response.token, None).await,
            Err(e) => Err(e),
        };

        result.inspect_err(|e| self.fail(e, LOGIN_FAILED))
    }

    /// Signs out. Safe to call on an anonymous session.
    pub async fn logout(&self) -> Result<(), ClientError> {
        let _guard = self.op_lock.lock().await;
        self.reset().await
    }

    /// Changes profile fields of the signed-in identity.
    pub async fn update_profile(
        &self,
        changes: UpdateDetailsRequest,
    ) -> Result<UserProfile, ClientError> {
        let _guard = self.op_lock.lock().await;
        self.update(|state| state.error = None);

        let result = match self.require_authenticated() {
            Ok(()) => self.transport.update_details(&changes).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(user) => {
                self.update(|state| state.user = Some(user.clone()));
                Ok(user)
            }
            Err(e) => {
                self.fail(&e, UPDATE_FAILED);
                Err(e)
            }
        }
    }

    /// Changes the signed-in identity's password and keeps the credential the
    /// server re-issues. The local profile is left as is.
    pub async fn update_password(&self, current: &str, next: &str) -> Result<(), ClientError> {
        let _guard = self.op_lock.lock().await;
        self.update(|state| state.error = None);

        let req = UpdatePasswordRequest {
            current_password: current.to_string(),
            new_password: next.to_string(),
        };
        let result = match self.require_authenticated() {
            Ok(()) => self.transport.update_password(&req).await,
            Err(e) => Err(e),
        };

        // The server has rotated the credential. The transport carries the new
        // one even when persisting it fails.
        let result = match result {
            Ok(response) => {
                self.transport.set_token(Some(response.token.clone()));
                self.store
                    .save(&response.token)
                    .await
                    .map_err(ClientError::from)
            }
            Err(e) => Err(e),
        };

        result.inspect_err(|e| self.fail(e, PASSWORD_UPDATE_FAILED))
    }

    /// Drops the message of the last failure.
    pub fn clear_error(&self) {
        if self.state.borrow().error.is_some() {
            self.update(|state| state.error = None);
        }
    }

    fn require_authenticated(&self) -> Result<(), ClientError> {
        if self.state.borrow().is_authenticated {
            Ok(())
        } else {
            Err(ClientError::NotAuthenticated)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::credential_store::MemoryCredentialStore;
    use crate::models::auth::AuthResponse;
    use crate::models::user::Role;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex as StdMutex,
    };
    use tokio::sync::Notify;
    use uuid::Uuid;

    const GOOD_TOKEN: &str = "good-token";
    const PASSWORD: &str = "correct horse";

    struct FakeServer {
        user: StdMutex<UserProfile>,
        tokens: StdMutex<Vec<String>>,
        attached: StdMutex<Option<String>>,
        me_gate: Option<Arc<Notify>>,
    }

    #[derive(Clone)]
    struct FakeTransport(Arc<FakeServer>);

    fn profile() -> UserProfile {
        UserProfile {
            id: Uuid::new_v4(),
            name: "Ada".into(),
            email: "ada@uni.edu".into(),
            role: Role::User,
            university: "State University".into(),
            department: "Mathematics".into(),
            contact_number: None,
            created_at: Utc::now(),
        }
    }

    impl FakeTransport {
        fn new() -> Self {
            Self::build(None)
        }

        fn gated(gate: Arc<Notify>) -> Self {
            Self::build(Some(gate))
        }

        fn build(me_gate: Option<Arc<Notify>>) -> Self {
            Self(Arc::new(FakeServer {
                user: StdMutex::new(profile()),
                tokens: StdMutex::new(vec![GOOD_TOKEN.to_string()]),
                attached: StdMutex::new(None),
                me_gate,
            }))
        }

        fn user(&self) -> UserProfile {
            self.0.user.lock().unwrap().clone()
        }

        fn issue(&self) -> String {
            let token = format!("token-{}", Uuid::new_v4());
            self.0.tokens.lock().unwrap().push(token.clone());
            token
        }

        fn authorized(&self) -> Result<(), ClientError> {
            let attached = self.0.attached.lock().unwrap().clone();
            match attached {
                Some(token) if self.0.tokens.lock().unwrap().contains(&token) => Ok(()),
                _ => Err(ClientError::Api {
                    status: 401,
                    message: Some("Not authorized to access this route".into()),
                }),
            }
        }
    }

    #[async_trait]
    impl Transport for FakeTransport {
        fn set_token(&self, token: Option<String>) {
            *self.0.attached.lock().unwrap() = token;
        }

        fn token(&self) -> Option<String> {
            self.0.attached.lock().unwrap().clone()
        }

        async fn register(&self, req: &RegisterRequest) -> Result<AuthResponse, ClientError> {
            if req.email == self.user().email {
                return Err(ClientError::Api {
                    status: 400,
                    message: Some("Email already registered".into()),
                });
            }
            let mut user = profile();
            user.email = req.email.clone();
            user.name = req.name.clone();
            *self.0.user.lock().unwrap() = user.clone();
            Ok(AuthResponse {
                success: true,
                token: self.issue(),
                user: Some(user),
            })
        }

        async fn login(&self, req: &LoginRequest) -> Result<AuthResponse, ClientError> {
            if req.email != self.user().email || req.password != PASSWORD {
                return Err(ClientError::Api {
                    status: 401,
                    message: Some("Invalid credentials".into()),
                });
            }
            Ok(AuthResponse {
                success: true,
                token: self.issue(),
                user: None,
            })
        }

        async fn me(&self) -> Result<UserProfile, ClientError> {
            if let Some(gate) = &self.0.me_gate {
                gate.notified().await;
            }
            self.authorized()?;
            Ok(self.user())
        }

        async fn update_details(
            &self,
            req: &UpdateDetailsRequest,
        ) -> Result<UserProfile, ClientError> {
            self.authorized()?;
            let mut user = self.0.user.lock().unwrap();
            if let Some(name) = &req.name {
                user.name = name.clone();
            }
            Ok(user.clone())
        }

        async fn update_password(
            &self,
            req: &UpdatePasswordRequest,
        ) -> Result<AuthResponse, ClientError> {
            self.authorized()?;
            if req.current_password != PASSWORD {
                return Err(ClientError::Api {
                    status: 401,
                    message: Some("Password is incorrect".into()),
                });
            }
            Ok(AuthResponse {
                success: true,
                token: self.issue(),
                user: None,
            })
        }
    }

    fn manager(
        transport: &FakeTransport,
        store: &MemoryCredentialStore,
    ) -> SessionManager<FakeTransport, MemoryCredentialStore> {
        SessionManager::new(transport.clone(), store.clone())
    }

    fn assert_consistent(state: &SessionState) {
        assert_eq!(state.is_authenticated, state.user.is_some());
    }

    #[tokio::test]
    async fn starts_loading_and_uninitialized() {
        let session = manager(&FakeTransport::new(), &MemoryCredentialStore::new());
        let state = session.snapshot();
        assert!(state.loading);
        assert_eq!(state.lifecycle, Lifecycle::Uninitialized);
        assert_consistent(&state);
    }

    #[tokio::test]
    async fn empty_store_initializes_anonymous() {
        let session = manager(&FakeTransport::new(), &MemoryCredentialStore::new());
        let state = session.initialize().await;
        assert!(!state.loading);
        assert!(!state.is_authenticated);
        assert_eq!(state.lifecycle, Lifecycle::Ready);
    }

    #[tokio::test]
    async fn stored_credential_restores_identity() {
        let transport = FakeTransport::new();
        let store = MemoryCredentialStore::new();
        store.save(GOOD_TOKEN).await.unwrap();

        let state = manager(&transport, &store).initialize().await;
        assert!(state.is_authenticated);
        assert_eq!(state.user, Some(transport.user()));
        assert!(!state.loading);
    }

    #[tokio::test]
    async fn rejected_credential_is_discarded() {
        let transport = FakeTransport::new();
        let store = MemoryCredentialStore::new();
        store.save("expired").await.unwrap();

        let state = manager(&transport, &store).initialize().await;
        assert!(!state.is_authenticated);
        assert!(!state.loading);
        assert_eq!(store.load().await.unwrap(), None);
        assert_eq!(transport.token(), None);
    }

    #[tokio::test]
    async fn second_initialize_is_a_no_op() {
        let transport = FakeTransport::new();
        let store = MemoryCredentialStore::new();
        let session = manager(&transport, &store);

        let first = session.initialize().await;
        store.save(GOOD_TOKEN).await.unwrap();
        let second = session.initialize().await;
        assert_eq!(first, second);
        assert!(!second.is_authenticated);
    }

    #[tokio::test]
    async fn login_then_reload_yields_the_same_identity() {
        let transport = FakeTransport::new();
        let store = MemoryCredentialStore::new();
        let session = manager(&transport, &store);
        session.initialize().await;

        let email = transport.user().email;
        let user = session.login(&email, PASSWORD).await.unwrap();
        assert_eq!(user, transport.user());
        assert!(session.snapshot().is_authenticated);

        let reloaded = manager(&transport, &store).initialize().await;
        assert_eq!(reloaded.user, Some(user));
    }

    #[tokio::test]
    async fn logout_then_reload_is_anonymous() {
        let transport = FakeTransport::new();
        let store = MemoryCredentialStore::new();
        let session = manager(&transport, &store);
        session.initialize().await;
        session.login(&transport.user().email, PASSWORD).await.unwrap();

        session.logout().await.unwrap();
        session.logout().await.unwrap();
        let state = session.snapshot();
        assert!(!state.is_authenticated);
        assert_eq!(transport.token(), None);

        let reloaded = manager(&transport, &store).initialize().await;
        assert!(!reloaded.is_authenticated);
        assert_eq!(reloaded.user, None);
    }

    #[tokio::test]
    async fn failed_login_records_server_message_and_reraises() {
        let transport = FakeTransport::new();
        let session = manager(&transport, &MemoryCredentialStore::new());
        session.initialize().await;

        let err = session.login("ada@uni.edu", "wrong").await.unwrap_err();
        assert!(err.is_rejection());
        let state = session.snapshot();
        assert_eq!(state.error.as_deref(), Some("Invalid credentials"));
        assert!(!state.is_authenticated);

        session.clear_error();
        assert_eq!(session.snapshot().error, None);
    }

    #[tokio::test]
    async fn register_uses_returned_projection_and_persists_token() {
        let transport = FakeTransport::new();
        let store = MemoryCredentialStore::new();
        let session = manager(&transport, &store);
        session.initialize().await;

        let req = RegisterRequest {
            name: "Grace".into(),
            email: "grace@uni.edu".into(),
            password: PASSWORD.into(),
            university: "State University".into(),
            department: "Computing".into(),
            contact_number: None,
        };
        let user = session.register(req).await.unwrap();
        assert_eq!(user.email, "grace@uni.edu");
        assert!(store.load().await.unwrap().is_some());
        assert_eq!(transport.token(), store.load().await.unwrap());

        let duplicate = RegisterRequest {
            email: "grace@uni.edu".into(),
            ..Default::default()
        };
        session.register(duplicate).await.unwrap_err();
        assert_eq!(
            session.snapshot().error.as_deref(),
            Some("Email already registered")
        );
    }

    #[tokio::test]
    async fn profile_and_password_updates_need_a_session() {
        let session = manager(&FakeTransport::new(), &MemoryCredentialStore::new());
        session.initialize().await;

        let err = session
            .update_profile(UpdateDetailsRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::NotAuthenticated));
        assert_eq!(session.snapshot().error.as_deref(), Some("Update failed"));

        session.update_password(PASSWORD, "new password").await.unwrap_err();
        assert_eq!(
            session.snapshot().error.as_deref(),
            Some("Password update failed")
        );
    }

    #[tokio::test]
    async fn profile_update_replaces_local_projection() {
        let transport = FakeTransport::new();
        let session = manager(&transport, &MemoryCredentialStore::new());
        session.initialize().await;
        session.login(&transport.user().email, PASSWORD).await.unwrap();

        let changes = UpdateDetailsRequest {
            name: Some("Ada L.".into()),
            ..Default::default()
        };
        let user = session.update_profile(changes).await.unwrap();
        assert_eq!(user.name, "Ada L.");
        assert_eq!(session.snapshot().user, Some(user));
    }

    #[tokio::test]
    async fn password_update_keeps_user_and_rotates_token() {
        let transport = FakeTransport::new();
        let store = MemoryCredentialStore::new();
        let session = manager(&transport, &store);
        session.initialize().await;
        session.login(&transport.user().email, PASSWORD).await.unwrap();

        let before = session.snapshot();
        let old_token = store.load().await.unwrap();
        session.update_password(PASSWORD, "new password").await.unwrap();

        let after = session.snapshot();
        assert_eq!(after.user, before.user);
        assert_ne!(store.load().await.unwrap(), old_token);
        assert_eq!(transport.token(), store.load().await.unwrap());
    }

    #[derive(Clone, Default)]
    struct ReadOnlyAfterLogin {
        inner: MemoryCredentialStore,
        locked: Arc<AtomicBool>,
    }

    #[async_trait]
    impl CredentialStore for ReadOnlyAfterLogin {
        async fn load(&self) -> std::io::Result<Option<String>> {
            self.inner.load().await
        }

        async fn save(&self, token: &str) -> std::io::Result<()> {
            if self.locked.load(Ordering::SeqCst) {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::PermissionDenied,
                    "read-only",
                ));
            }
            self.inner.save(token).await
        }

        async fn clear(&self) -> std::io::Result<()> {
            self.inner.clear().await
        }
    }

    #[tokio::test]
    async fn password_update_reports_a_store_failure() {
        let transport = FakeTransport::new();
        let store = ReadOnlyAfterLogin::default();
        let session = SessionManager::new(transport.clone(), store.clone());
        session.initialize().await;
        session.login(&transport.user().email, PASSWORD).await.unwrap();

        let old_token = store.load().await.unwrap();
        store.locked.store(true, Ordering::SeqCst);

        let err = session
            .update_password(PASSWORD, "new password")
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Store(_)));

        let state = session.snapshot();
        assert_eq!(state.error.as_deref(), Some("Password update failed"));
        assert!(state.is_authenticated);
        assert_eq!(store.load().await.unwrap(), old_token);
        assert_ne!(transport.token(), old_token);
        assert!(transport.token().is_some());
    }

    #[tokio::test]
    async fn subscribers_see_versioned_consistent_snapshots() {
        let transport = FakeTransport::new();
        let session = manager(&transport, &MemoryCredentialStore::new());
        let mut rx = session.subscribe();

        session.initialize().await;
        assert!(rx.has_changed().unwrap());
        let seen = rx.borrow_and_update().clone();
        assert_consistent(&seen);
        assert!(seen.version > 0);

        session.login(&transport.user().email, PASSWORD).await.unwrap();
        let seen_after = rx.borrow_and_update().clone();
        assert!(seen_after.version > seen.version);
        assert_consistent(&seen_after);
    }

    #[tokio::test]
    async fn login_waits_for_a_pending_restore() {
        let gate = Arc::new(Notify::new());
        let transport = FakeTransport::gated(gate.clone());
        let store = MemoryCredentialStore::new();
        store.save("stale").await.unwrap();

        let session = Arc::new(manager(&transport, &store));
        let restoring = tokio::spawn({
            let session = session.clone();
            async move { session.initialize().await }
        });
        while session.snapshot().lifecycle != Lifecycle::Restoring {
            tokio::task::yield_now().await;
        }

        let email = transport.user().email;
        let login = tokio::spawn({
            let session = session.clone();
            async move { session.login(&email, PASSWORD).await }
        });
        tokio::task::yield_now().await;

        // One permit for the restore's `me`, one for the login's.
        gate.notify_one();
        let restored = restoring.await.unwrap();
        assert!(!restored.is_authenticated);
        gate.notify_one();

        login.await.unwrap().unwrap();
        let state = session.snapshot();
        assert!(state.is_authenticated);
        assert_eq!(state.lifecycle, Lifecycle::Ready);
        assert!(store.load().await.unwrap().is_some());
    }
}
