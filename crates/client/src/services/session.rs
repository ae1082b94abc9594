//! Session manager.
//!
//! Owns the in-memory [`Session`] and is the only writer of the credential
//! store. The session is published through a `tokio::sync::watch` channel so
//! front ends can react to changes.
//!
//! # Ordering
//!
//! `initialize` and `refresh` advance a generation number at the call site,
//! before their future is first polled; `logout` advances it too. A
//! completion whose generation is no longer current is discarded without
//! touching the session or the store. The check and the write happen under
//! one lock so a concurrent `logout` cannot interleave.
//!
//! `login` records the generation and takes a login ticket when called, but
//! advances the generation only when it commits. A failed login therefore
//! leaves a pending restore in charge of the stored token, while a later
//! login still wins over an earlier one.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use popflix_core::{Session, SessionToken, UserProfile};

use crate::api::{LoginGrant, RemoteService};
use crate::error::{ClientError, Result, add_breadcrumb, clear_sentry_user, set_sentry_user};
use crate::store::CredentialStore;

/// Establishes, restores and ends the user's session.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<SessionManagerInner>,
}

struct SessionManagerInner {
    api: Arc<dyn RemoteService>,
    store: Arc<dyn CredentialStore>,
    generation: AtomicU64,
    /// Ticket of the most recently issued login.
    login_ticket: AtomicU64,
    /// Serializes "is this still current?" with the write that follows.
    commit: Mutex<()>,
    state: watch::Sender<Session>,
}

impl SessionManager {
    /// Create a manager with an anonymous session. Call
    /// [`initialize`](Self::initialize) to restore a stored one.
    #[must_use]
    pub fn new(api: Arc<dyn RemoteService>, store: Arc<dyn CredentialStore>) -> Self {
        let (state, _) = watch::channel(Session::anonymous());
        Self {
            inner: Arc::new(SessionManagerInner {
                api,
                store,
                generation: AtomicU64::new(0),
                login_ticket: AtomicU64::new(0),
                commit: Mutex::new(()),
                state,
            }),
        }
    }

    /// Snapshot of the current session.
    #[must_use]
    pub fn session(&self) -> Session {
        self.inner.state.borrow().clone()
    }

    /// Receiver notified on every session change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.inner.state.subscribe()
    }

    /// Current session token, if any.
    #[must_use]
    pub fn token(&self) -> Option<SessionToken> {
        self.inner.state.borrow().token().cloned()
    }

    /// Restore the session from the credential store.
    ///
    /// Never fails: a missing, unreadable or rejected token leaves the
    /// client signed out (and a rejected token is removed from the store).
    /// Resolves to the settled session.
    pub fn initialize(&self) -> impl Future<Output = Session> + Send + use<> {
        let inner = Arc::clone(&self.inner);
        let generation = inner.advance();
        async move { inner.initialize(generation).await }
    }

    /// Exchange an identity-provider credential for a session.
    ///
    /// On success the token is persisted and the session replaced with the
    /// profile returned by the exchange. On failure the previous session is
    /// kept.
    ///
    /// # Errors
    ///
    /// - [`ClientError::InvalidInput`] for a blank credential (no request is made)
    /// - [`ClientError::Remote`] if the exchange fails
    /// - [`ClientError::Storage`] if the token cannot be persisted
    /// - [`ClientError::Superseded`] if a later session operation was issued
    ///   before this one completed
    pub fn login(&self, credential: &str) -> impl Future<Output = Result<Session>> + Send + use<> {
        let inner = Arc::clone(&self.inner);
        let credential = credential.trim().to_string();
        let issued = (!credential.is_empty()).then(|| LoginIssue {
            generation: inner.generation.load(Ordering::SeqCst),
            ticket: inner.login_ticket.fetch_add(1, Ordering::SeqCst) + 1,
        });

        async move {
            let Some(issued) = issued else {
                return Err(ClientError::InvalidInput("credential is empty".to_string()));
            };
            inner.login(issued, &credential).await
        }
    }

    /// Re-fetch the profile for the current token.
    ///
    /// Only a verified, settled session can be refreshed.
    ///
    /// # Errors
    ///
    /// - [`ClientError::AuthenticationRequired`] without a verified user, or
    ///   while a restore or login is in flight (no request is made)
    /// - [`ClientError::Remote`] if the fetch fails; an unauthorized token
    ///   also signs the client out
    /// - [`ClientError::Superseded`] if a later session operation was issued
    pub fn refresh(&self) -> impl Future<Output = Result<Session>> + Send + use<> {
        let inner = Arc::clone(&self.inner);
        let session = self.session();
        let token = session
            .token()
            .filter(|_| session.is_authenticated() && !session.is_loading())
            .cloned();
        let generation = token.as_ref().map(|_| inner.advance());

        async move {
            let (Some(token), Some(generation)) = (token, generation) else {
                return Err(ClientError::AuthenticationRequired);
            };
            inner.refresh(generation, token).await
        }
    }

    /// Sign out. Clears the stored token and the in-memory session and
    /// invalidates any in-flight session operation.
    pub fn logout(&self) {
        let _guard = self.inner.lock_commit();
        self.inner.generation.fetch_add(1, Ordering::SeqCst);

        if let Err(e) = self.inner.store.remove() {
            warn!(error = %e, "Failed to remove stored token on logout");
        }
        self.inner.state.send_replace(Session::anonymous());
        clear_sentry_user();
        add_breadcrumb("auth", "Signed out", None);
        info!("Signed out");
    }
}

/// Where a login stood when it was issued.
#[derive(Debug, Clone, Copy)]
struct LoginIssue {
    generation: u64,
    ticket: u64,
}

impl SessionManagerInner {
    /// Take a new generation number, superseding every earlier operation.
    fn advance(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn lock_commit(&self) -> MutexGuard<'_, ()> {
        self.commit.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The commit lock, if `generation` is still current.
    fn lock_if_current(&self, generation: u64) -> Option<MutexGuard<'_, ()>> {
        let guard = self.lock_commit();
        (self.generation.load(Ordering::SeqCst) == generation).then_some(guard)
    }

    /// The commit lock, if nothing has superseded the login `issued`.
    fn lock_if_login_current(&self, issued: LoginIssue) -> Option<MutexGuard<'_, ()>> {
        let guard = self.lock_commit();
        (self.generation.load(Ordering::SeqCst) == issued.generation
            && self.login_ticket.load(Ordering::SeqCst) == issued.ticket)
            .then_some(guard)
    }

    fn snapshot(&self) -> Session {
        self.state.borrow().clone()
    }

    fn establish(&self, token: SessionToken, user: UserProfile) -> Session {
        set_sentry_user(&user.id, user.email.as_deref());
        let session = Session::authenticated(token, user);
        self.state.send_replace(session.clone());
        session
    }

    /// Drop the stored token and sign out. Caller holds the commit lock.
    fn discard(&self) {
        if let Err(e) = self.store.remove() {
            warn!(error = %e, "Failed to remove rejected token");
        }
        clear_sentry_user();
        self.state.send_replace(Session::anonymous());
    }

    #[instrument(skip(self))]
    async fn initialize(&self, generation: u64) -> Session {
        let stored = self.store.load().unwrap_or_else(|e| {
            warn!(error = %e, "Credential store unreadable, starting signed out");
            None
        });

        let Some(token) = stored else {
            if let Some(_guard) = self.lock_if_current(generation) {
                self.state.send_replace(Session::anonymous());
            }
            debug!("No stored session");
            return self.snapshot();
        };

        match self.lock_if_current(generation) {
            Some(_guard) => {
                self.state.send_replace(Session::verifying(token.clone()));
            }
            None => return self.snapshot(),
        }

        self.verify(generation, token).await
    }

    /// Check a stored token and settle the session on the outcome.
    async fn verify(&self, generation: u64, token: SessionToken) -> Session {
        let result = self.api.fetch_profile(&token).await;

        let Some(_guard) = self.lock_if_current(generation) else {
            debug!("Discarding superseded session restore");
            return self.snapshot();
        };

        match result {
            Ok(user) => {
                info!(user_id = %user.id, "Restored session");
                self.establish(token, user)
            }
            Err(e) => {
                warn!(error = %e, "Stored session rejected, signing out");
                self.discard();
                self.snapshot()
            }
        }
    }

    #[instrument(skip(self, credential))]
    async fn login(&self, issued: LoginIssue, credential: &str) -> Result<Session> {
        if let Some(_guard) = self.lock_if_login_current(issued) {
            let loading = self.snapshot().with_loading(true);
            self.state.send_replace(loading);
        }
        add_breadcrumb("auth", "Sign-in started", None);

        let result = self.api.exchange_credential(credential).await;

        let Some(_guard) = self.lock_if_login_current(issued) else {
            debug!("Discarding superseded login");
            return Err(ClientError::Superseded);
        };

        let error = match result {
            Ok(grant) => match self.commit_login(grant) {
                Ok(session) => return Ok(session),
                Err(e) => e,
            },
            Err(e) => {
                warn!(error = %e, "Login failed");
                e.into()
            }
        };

        // A restore still verifying the stored token settles the flag itself.
        let current = self.snapshot();
        let restoring = current.token().is_some() && current.user().is_none();
        if !restoring {
            self.state.send_replace(current.with_loading(false));
        }
        Err(error)
    }

    /// Persist and apply a successful login, superseding everything issued
    /// before it. Caller holds the commit lock.
    fn commit_login(&self, grant: LoginGrant) -> Result<Session> {
        if let Err(e) = self.store.save(&grant.token) {
            warn!(error = %e, "Failed to persist session token");
            return Err(e.into());
        }

        self.generation.fetch_add(1, Ordering::SeqCst);
        info!(user_id = %grant.user.id, "Signed in");
        Ok(self.establish(grant.token, grant.user))
    }

    #[instrument(skip(self, token))]
    async fn refresh(&self, generation: u64, token: SessionToken) -> Result<Session> {
        let result = self.api.fetch_profile(&token).await;

        let Some(_guard) = self.lock_if_current(generation) else {
            debug!("Discarding superseded profile refresh");
            return Err(ClientError::Superseded);
        };

        match result {
            Ok(user) => {
                debug!(user_id = %user.id, is_premium = user.is_premium, "Profile refreshed");
                Ok(self.establish(token, user))
            }
            Err(e) if e.is_unauthorized() => {
                warn!(error = %e, "Session token rejected on refresh, signing out");
                self.discard();
                Err(e.into())
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use popflix_core::UserId;

    use super::*;
    use crate::api::ApiError;
    use crate::api::mock::{Endpoint, GateKey, MockRemoteService};
    use crate::store::{MemoryCredentialStore, StoreError};

    fn profile(is_premium: bool) -> UserProfile {
        UserProfile {
            id: UserId::new("u-1"),
            name: "Ada".to_string(),
            picture: None,
            email: Some("ada@example.com".to_string()),
            is_premium,
        }
    }

    fn setup(stored: Option<&str>) -> (MockRemoteService, Arc<MemoryCredentialStore>, SessionManager) {
        let mock = MockRemoteService::new().with_account("cred", "tok", profile(false));
        let store = Arc::new(stored.map_or_else(MemoryCredentialStore::new, MemoryCredentialStore::with_token));
        let manager = SessionManager::new(Arc::new(mock.clone()), store.clone());
        (mock, store, manager)
    }

    /// Store whose writes always fail.
    struct ReadOnlyStore;

    impl CredentialStore for ReadOnlyStore {
        fn load(&self) -> std::result::Result<Option<SessionToken>, StoreError> {
            Ok(None)
        }
        fn save(&self, _: &SessionToken) -> std::result::Result<(), StoreError> {
            Err(StoreError::Io(std::io::Error::other("read-only")))
        }
        fn remove(&self) -> std::result::Result<(), StoreError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_initialize_without_token() {
        let (mock, _, manager) = setup(None);
        let session = manager.initialize().await;
        assert!(!session.is_authenticated());
        assert!(!session.is_loading());
        assert_eq!(mock.calls(Endpoint::FetchProfile), 0);
    }

    #[tokio::test]
    async fn test_initialize_restores_stored_token() {
        let (mock, _, manager) = setup(Some("tok"));
        let gate = mock.hold(GateKey::Endpoint(Endpoint::FetchProfile));

        let task = tokio::spawn(manager.initialize());
        assert!(mock.wait_for_calls(Endpoint::FetchProfile, 1).await);
        assert!(manager.session().is_loading());
        assert!(manager.session().user().is_none());

        gate.open();
        let session = task.await.unwrap();
        assert!(session.is_authenticated());
        assert!(!session.is_loading());
        assert_eq!(session.user().unwrap().name, "Ada");
    }

    #[tokio::test]
    async fn test_initialize_discards_rejected_token() {
        let (_, store, manager) = setup(Some("expired"));
        let session = manager.initialize().await;
        assert_eq!(session, Session::anonymous());
        assert!(store.load().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_initialize_discards_token_on_network_error() {
        let (mock, store, manager) = setup(Some("tok"));
        mock.fail(Endpoint::FetchProfile, 503, "down");
        let session = manager.initialize().await;
        assert!(!session.is_authenticated());
        assert!(store.load().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_login_persists_token_without_refetch() {
        let (mock, store, manager) = setup(None);
        let session = manager.login("cred").await.unwrap();

        assert!(session.is_authenticated());
        assert_eq!(store.load().unwrap(), Some(SessionToken::new("tok")));
        assert_eq!(mock.calls(Endpoint::FetchProfile), 0);
        assert_eq!(manager.session(), session);
    }

    #[tokio::test]
    async fn test_failed_login_keeps_previous_session() {
        let (_, store, manager) = setup(None);
        manager.login("cred").await.unwrap();
        let before = manager.session();

        let err = manager.login("bogus").await.unwrap_err();
        assert!(matches!(err, ClientError::Remote(ApiError::Unauthorized(_))));
        assert_eq!(manager.session(), before);
        assert!(!manager.session().is_loading());
        assert_eq!(store.load().unwrap(), Some(SessionToken::new("tok")));
    }

    #[tokio::test]
    async fn test_blank_credential_is_rejected_locally() {
        let (mock, _, manager) = setup(None);
        let err = manager.login("   ").await.unwrap_err();
        assert!(matches!(err, ClientError::InvalidInput(_)));
        assert_eq!(mock.calls(Endpoint::ExchangeCredential), 0);
    }

    #[tokio::test]
    async fn test_unpersistable_login_fails_without_session_change() {
        let mock = MockRemoteService::new().with_account("cred", "tok", profile(false));
        let manager = SessionManager::new(Arc::new(mock), Arc::new(ReadOnlyStore));

        let err = manager.login("cred").await.unwrap_err();
        assert!(matches!(err, ClientError::Storage(_)));
        assert_eq!(manager.session(), Session::anonymous());
    }

    #[tokio::test]
    async fn test_logout_supersedes_inflight_login() {
        let (mock, store, manager) = setup(None);
        let gate = mock.hold(GateKey::Endpoint(Endpoint::ExchangeCredential));

        let task = tokio::spawn(manager.login("cred"));
        assert!(mock.wait_for_calls(Endpoint::ExchangeCredential, 1).await);
        manager.logout();
        gate.open();

        assert!(matches!(task.await.unwrap(), Err(ClientError::Superseded)));
        assert_eq!(manager.session(), Session::anonymous());
        assert!(store.load().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_stale_restore_does_not_undo_login() {
        let (mock, store, manager) = setup(Some("old-token"));
        let gate = mock.hold(GateKey::Endpoint(Endpoint::FetchProfile));

        let restore = tokio::spawn(manager.initialize());
        assert!(mock.wait_for_calls(Endpoint::FetchProfile, 1).await);

        manager.login("cred").await.unwrap();
        gate.open();
        let settled = restore.await.unwrap();

        assert!(settled.is_authenticated());
        assert_eq!(store.load().unwrap(), Some(SessionToken::new("tok")));
    }

    #[tokio::test]
    async fn test_failed_login_during_restore_still_discards_rejected_token() {
        let (mock, store, manager) = setup(Some("expired-token"));
        let gate = mock.hold(GateKey::Endpoint(Endpoint::FetchProfile));

        let restore = tokio::spawn(manager.initialize());
        assert!(mock.wait_for_calls(Endpoint::FetchProfile, 1).await);

        let err = manager.login("bogus").await.unwrap_err();
        assert!(matches!(err, ClientError::Remote(ApiError::Unauthorized(_))));
        assert!(manager.session().is_loading());

        gate.open();
        let settled = restore.await.unwrap();

        assert_eq!(settled, Session::anonymous());
        assert_eq!(manager.session(), Session::anonymous());
        assert!(store.load().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_failed_login_during_restore_keeps_valid_token() {
        let (mock, store, manager) = setup(Some("tok"));
        let gate = mock.hold(GateKey::Endpoint(Endpoint::FetchProfile));

        let restore = tokio::spawn(manager.initialize());
        assert!(mock.wait_for_calls(Endpoint::FetchProfile, 1).await);
        assert!(manager.login("bogus").await.is_err());

        gate.open();
        let settled = restore.await.unwrap();

        assert!(settled.is_authenticated());
        assert!(!settled.is_loading());
        assert_eq!(store.load().unwrap(), Some(SessionToken::new("tok")));
    }

    #[tokio::test]
    async fn test_later_login_wins() {
        let mock = MockRemoteService::new()
            .with_account("cred", "tok", profile(false))
            .with_account(
                "cred-2",
                "tok-2",
                UserProfile {
                    id: UserId::new("u-2"),
                    ..profile(true)
                },
            );
        let store = Arc::new(MemoryCredentialStore::new());
        let manager = SessionManager::new(Arc::new(mock.clone()), store.clone());
        let gate = mock.hold(GateKey::Endpoint(Endpoint::ExchangeCredential));

        let first = tokio::spawn(manager.login("cred"));
        let second = tokio::spawn(manager.login("cred-2"));
        assert!(mock.wait_for_calls(Endpoint::ExchangeCredential, 2).await);
        gate.open();

        assert!(matches!(first.await.unwrap(), Err(ClientError::Superseded)));
        assert!(second.await.unwrap().is_ok());
        assert_eq!(store.load().unwrap(), Some(SessionToken::new("tok-2")));
        assert_eq!(manager.session().user().unwrap().id, UserId::new("u-2"));
    }

    #[tokio::test]
    async fn test_refresh_refused_while_restoring() {
        let (mock, _, manager) = setup(Some("tok"));
        let gate = mock.hold(GateKey::Endpoint(Endpoint::FetchProfile));

        let restore = tokio::spawn(manager.initialize());
        assert!(mock.wait_for_calls(Endpoint::FetchProfile, 1).await);
        mock.fail(Endpoint::FetchProfile, 503, "down");

        let err = manager.refresh().await.unwrap_err();
        assert!(matches!(err, ClientError::AuthenticationRequired));
        assert_eq!(mock.calls(Endpoint::FetchProfile), 1);

        mock.clear_failure(Endpoint::FetchProfile);
        gate.open();
        let settled = restore.await.unwrap();
        assert!(settled.is_authenticated());
        assert!(!settled.is_loading());
    }

    #[tokio::test]
    async fn test_refresh_picks_up_premium() {
        let (mock, _, manager) = setup(None);
        manager.login("cred").await.unwrap();
        mock.set_premium(&UserId::new("u-1"), true);

        let session = manager.refresh().await.unwrap();
        assert!(session.user().unwrap().is_premium);
    }

    #[tokio::test]
    async fn test_refresh_signs_out_on_rejected_token() {
        let (mock, store, manager) = setup(None);
        manager.login("cred").await.unwrap();
        mock.expire_token("tok");

        assert!(manager.refresh().await.is_err());
        assert_eq!(manager.session(), Session::anonymous());
        assert!(store.load().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_refresh_keeps_session_on_transient_failure() {
        let (mock, _, manager) = setup(None);
        manager.login("cred").await.unwrap();
        let before = manager.session();
        mock.fail(Endpoint::FetchProfile, 502, "bad gateway");

        let err = manager.refresh().await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(manager.session(), before);
    }

    #[tokio::test]
    async fn test_subscribers_see_login() {
        let (_, _, manager) = setup(None);
        let mut rx = manager.subscribe();
        manager.login("cred").await.unwrap();
        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().is_authenticated());
    }
}
