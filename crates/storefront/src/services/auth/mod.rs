//! Session/role gate.
//!
//! Tracks the authenticated principal, fetches its profile and derives the
//! [`Role`] every capability check is made against. The gate is started once
//! and shared; consumers read the current [`GateState`] or subscribe to its
//! changes.
//!
//! State transitions are driven by the remote store's session events only:
//! [`SessionGate::sign_in`] and friends delegate to the store and never touch
//! the state directly.

mod error;

pub use error::AuthError;

use std::sync::{Arc, Mutex, PoisonError};

use amicale_core::records::Profile;
use amicale_core::remote::{
    AdminNotification, Principal, RemoteStore, SessionEvent, SignUpMetadata, Table,
};
use amicale_core::{Email, Role, UserId, derive_role};
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::error::{clear_sentry_user, set_sentry_user};

/// Minimum password length.
const MIN_PASSWORD_LENGTH: usize = 8;

/// What the gate currently knows about the session.
#[derive(Debug, Clone)]
pub enum GateState {
    /// The initial session resolution has not finished.
    Loading,
    /// No session.
    Unauthenticated,
    /// A principal is signed in.
    Authenticated {
        principal: Principal,
        /// `None` when the profile row is missing or could not be fetched.
        profile: Option<Profile>,
        role: Role,
    },
}

impl GateState {
    /// Whether the initial resolution is still running.
    #[must_use]
    pub const fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    /// The signed-in principal.
    #[must_use]
    pub const fn principal(&self) -> Option<&Principal> {
        match self {
            Self::Authenticated { principal, .. } => Some(principal),
            Self::Loading | Self::Unauthenticated => None,
        }
    }

    /// The signed-in principal's profile.
    #[must_use]
    pub const fn profile(&self) -> Option<&Profile> {
        match self {
            Self::Authenticated { profile, .. } => profile.as_ref(),
            Self::Loading | Self::Unauthenticated => None,
        }
    }

    /// The derived role; `Anonymous` unless authenticated.
    #[must_use]
    pub const fn role(&self) -> Role {
        match self {
            Self::Authenticated { role, .. } => *role,
            Self::Loading | Self::Unauthenticated => Role::Anonymous,
        }
    }
}

/// Shared handle on the session state.
///
/// Cheap to clone. The background tracking task stops when the last handle
/// is dropped or on [`SessionGate::shutdown`].
#[derive(Clone)]
pub struct SessionGate {
    inner: Arc<GateInner>,
}

struct GateInner {
    store: Arc<dyn RemoteStore>,
    state: watch::Receiver<GateState>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for GateInner {
    fn drop(&mut self) {
        if let Some(task) = self.task.get_mut().unwrap_or_else(PoisonError::into_inner).take() {
            task.abort();
        }
    }
}

impl SessionGate {
    /// Start tracking the store's session.
    ///
    /// The gate subscribes to session events before resolving the current
    /// session, so a sign-in racing the initial resolution is not lost.
    /// Must be called within a Tokio runtime.
    #[must_use]
    pub fn start(store: Arc<dyn RemoteStore>) -> Self {
        let (tx, rx) = watch::channel(GateState::Loading);
        let events = store.subscribe();
        let task = tokio::spawn(track_session(Arc::clone(&store), tx, events));

        Self {
            inner: Arc::new(GateInner {
                store,
                state: rx,
                task: Mutex::new(Some(task)),
            }),
        }
    }

    /// Stop the background task. The last published state stays readable.
    pub fn shutdown(&self) {
        let task = self
            .inner
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            task.abort();
            debug!("Session gate stopped");
        }
    }

    /// Snapshot of the current state.
    #[must_use]
    pub fn state(&self) -> GateState {
        self.inner.state.borrow().clone()
    }

    /// Receiver notified on every state change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<GateState> {
        self.inner.state.clone()
    }

    /// Wait for the initial resolution to finish.
    pub async fn ready(&self) -> GateState {
        self.wait_until(|state| !state.is_loading()).await
    }

    /// Wait until the state satisfies `condition`.
    ///
    /// Returns the last known state if the gate is shut down first.
    pub async fn wait_until(&self, mut condition: impl FnMut(&GateState) -> bool) -> GateState {
        let mut rx = self.subscribe();
        match rx.wait_for(|state| condition(state)).await {
            Ok(state) => state.clone(),
            Err(_) => self.state(),
        }
    }

    /// The signed-in principal.
    #[must_use]
    pub fn principal(&self) -> Option<Principal> {
        self.inner.state.borrow().principal().cloned()
    }

    /// The signed-in principal's profile.
    #[must_use]
    pub fn profile(&self) -> Option<Profile> {
        self.inner.state.borrow().profile().cloned()
    }

    /// The derived role.
    #[must_use]
    pub fn role(&self) -> Role {
        self.inner.state.borrow().role()
    }

    /// Whether the current role is one of `allowed`.
    ///
    /// Fails closed: always `false` while loading and for anonymous users,
    /// even when `Anonymous` is listed.
    #[must_use]
    pub fn check_permission(&self, allowed: &[Role]) -> bool {
        let state = self.inner.state.borrow();
        if state.is_loading() {
            return false;
        }
        let role = state.role();
        role.is_authenticated() && allowed.contains(&role)
    }

    // =========================================================================
    // Credential operations
    // =========================================================================

    /// Sign in with email and password.
    ///
    /// The gate state follows through the store's `SignedIn` event.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` for a malformed email, otherwise the
    /// store's rejection unchanged.
    #[instrument(skip(self, password))]
    pub async fn sign_in(&self, email: &str, password: &SecretString) -> Result<Principal, AuthError> {
        let email = Email::parse(email)?;
        let principal = self
            .inner
            .store
            .sign_in_with_password(&email, password)
            .await?;
        info!(user_id = %principal.id, "Signed in");
        Ok(principal)
    }

    /// Register a new member.
    ///
    /// Does not open a session. The administrators are notified on a best
    /// effort basis; a notification failure is logged and otherwise ignored.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` or `AuthError::WeakPassword` before
    /// any remote call, otherwise the store's rejection unchanged.
    #[instrument(skip(self, password, metadata))]
    pub async fn sign_up(
        &self,
        email: &str,
        password: &SecretString,
        metadata: &SignUpMetadata,
    ) -> Result<UserId, AuthError> {
        let email = Email::parse(email)?;
        validate_password(password)?;

        let user_id = self.inner.store.sign_up(&email, password, metadata).await?;
        info!(user_id = %user_id, "Member registered");

        let notification = AdminNotification::NewMember {
            email,
            first_name: metadata.first_name.clone(),
            last_name: metadata.last_name.clone(),
        };
        if let Err(e) = self.inner.store.notify_admin(&notification).await {
            warn!(error = %e, user_id = %user_id, "New member notification failed");
        }

        Ok(user_id)
    }

    /// End the session.
    ///
    /// # Errors
    ///
    /// Returns the store's error.
    #[instrument(skip(self))]
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        self.inner.store.sign_out().await?;
        Ok(())
    }

    /// Change the signed-in principal's password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::WeakPassword` for a short password, otherwise the
    /// store's error.
    #[instrument(skip(self, new_password))]
    pub async fn update_password(&self, new_password: &SecretString) -> Result<(), AuthError> {
        validate_password(new_password)?;
        self.inner.store.update_password(new_password).await?;
        Ok(())
    }
}

async fn track_session(
    store: Arc<dyn RemoteStore>,
    tx: watch::Sender<GateState>,
    mut events: broadcast::Receiver<SessionEvent>,
) {
    publish(&tx, resolve_session(store.as_ref()).await);

    loop {
        let next = match events.recv().await {
            Ok(SessionEvent::SignedIn(principal) | SessionEvent::TokenRefreshed(principal)) => {
                authenticated(store.as_ref(), principal).await
            }
            Ok(SessionEvent::SignedOut) => GateState::Unauthenticated,
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "Session events lagged, re-resolving session");
                resolve_session(store.as_ref()).await
            }
            Err(RecvError::Closed) => {
                debug!("Session event stream closed");
                break;
            }
        };
        publish(&tx, next);
    }
}

async fn resolve_session(store: &dyn RemoteStore) -> GateState {
    match store.current_session().await {
        Ok(Some(principal)) => authenticated(store, principal).await,
        Ok(None) => GateState::Unauthenticated,
        Err(e) => {
            warn!(error = %e, "Could not resolve session, continuing signed out");
            GateState::Unauthenticated
        }
    }
}

async fn authenticated(store: &dyn RemoteStore, principal: Principal) -> GateState {
    let profile = match Table::<Profile, _>::new(store).find(principal.id).await {
        Ok(profile) => profile,
        Err(e) => {
            warn!(error = %e, user_id = %principal.id, "Profile fetch failed");
            None
        }
    };
    let role = derive_role(Some(&principal), profile.as_ref());
    GateState::Authenticated {
        principal,
        profile,
        role,
    }
}

fn publish(tx: &watch::Sender<GateState>, state: GateState) {
    match &state {
        GateState::Authenticated { principal, role, .. } => {
            set_sentry_user(&principal.id, Some(principal.email.as_str()));
            debug!(user_id = %principal.id, role = %role, "Session authenticated");
        }
        GateState::Unauthenticated => {
            clear_sentry_user();
            debug!("Session unauthenticated");
        }
        GateState::Loading => {}
    }
    tx.send_replace(state);
}

fn validate_password(password: &SecretString) -> Result<(), AuthError> {
    if password.expose_secret().chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword {
            min: MIN_PASSWORD_LENGTH,
        });
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use amicale_core::ProfileRole;
    use amicale_core::remote::{AuthBackend, MemoryStore};

    use super::*;

    fn secret(s: &str) -> SecretString {
        SecretString::from(s.to_string())
    }

    fn member(store: &MemoryStore, address: &str, role: ProfileRole) -> UserId {
        store.register_user(&Email::parse(address).unwrap(), "motdepasse", role)
    }

    #[tokio::test]
    async fn test_starts_loading_then_unauthenticated() {
        let store = Arc::new(MemoryStore::new());
        let gate = SessionGate::start(store);

        let state = gate.ready().await;
        assert!(matches!(state, GateState::Unauthenticated));
        assert_eq!(gate.role(), Role::Anonymous);
    }

    #[tokio::test]
    async fn test_sign_in_derives_role_from_profile() {
        let store = Arc::new(MemoryStore::new());
        let id = member(&store, "editor@amicale.org", ProfileRole::Editor);
        let gate = SessionGate::start(store);
        gate.ready().await;

        gate.sign_in("editor@amicale.org", &secret("motdepasse"))
            .await
            .unwrap();
        let state = gate.wait_until(|s| s.principal().is_some()).await;

        assert_eq!(state.role(), Role::Editor);
        assert_eq!(gate.principal().unwrap().id, id);
        assert!(gate.check_permission(&[Role::Admin, Role::Editor]));
        assert!(!gate.check_permission(&[Role::Admin]));
    }

    #[tokio::test]
    async fn test_existing_session_is_resolved_at_start() {
        let store = Arc::new(MemoryStore::new());
        member(&store, "admin@amicale.org", ProfileRole::Admin);
        store
            .sign_in_with_password(&Email::parse("admin@amicale.org").unwrap(), &secret("motdepasse"))
            .await
            .unwrap();

        let gate = SessionGate::start(store);
        assert_eq!(gate.ready().await.role(), Role::Admin);
    }

    #[tokio::test]
    async fn test_missing_profile_means_subscriber() {
        let store = Arc::new(MemoryStore::new());
        member(&store, "ghost@amicale.org", ProfileRole::Admin);
        store.fail_reads("profiles", "permission denied for table profiles");
        let gate = SessionGate::start(store);
        gate.ready().await;

        gate.sign_in("ghost@amicale.org", &secret("motdepasse"))
            .await
            .unwrap();
        let state = gate.wait_until(|s| s.principal().is_some()).await;
        assert_eq!(state.role(), Role::Subscriber);
        assert!(state.profile().is_none());
    }

    #[tokio::test]
    async fn test_session_lookup_failure_resolves_unauthenticated() {
        let store = Arc::new(MemoryStore::new());
        store.fail_session_lookup("connection refused");
        let gate = SessionGate::start(store);
        assert!(matches!(gate.ready().await, GateState::Unauthenticated));
    }

    #[tokio::test]
    async fn test_sign_out_and_expiry_clear_state() {
        let store = Arc::new(MemoryStore::new());
        member(&store, "a@amicale.org", ProfileRole::Author);
        let gate = SessionGate::start(Arc::clone(&store) as Arc<dyn RemoteStore>);
        gate.ready().await;

        gate.sign_in("a@amicale.org", &secret("motdepasse")).await.unwrap();
        gate.wait_until(|s| s.principal().is_some()).await;
        gate.sign_out().await.unwrap();
        let state = gate.wait_until(|s| s.principal().is_none()).await;
        assert!(matches!(state, GateState::Unauthenticated));

        gate.sign_in("a@amicale.org", &secret("motdepasse")).await.unwrap();
        gate.wait_until(|s| s.principal().is_some()).await;
        store.expire_session();
        gate.wait_until(|s| s.principal().is_none()).await;
        assert!(!gate.check_permission(&[Role::Author]));
    }

    #[tokio::test]
    async fn test_check_permission_denies_while_loading() {
        let store = Arc::new(MemoryStore::new());
        member(&store, "admin@amicale.org", ProfileRole::Admin);
        store
            .sign_in_with_password(&Email::parse("admin@amicale.org").unwrap(), &secret("motdepasse"))
            .await
            .unwrap();

        // The session task has not been polled yet on the current-thread runtime.
        let gate = SessionGate::start(store);
        assert!(gate.state().is_loading());
        assert!(!gate.check_permission(&[Role::Admin, Role::Subscriber, Role::Anonymous]));

        gate.ready().await;
        assert!(gate.check_permission(&[Role::Admin]));
    }

    #[tokio::test]
    async fn test_check_permission_fails_closed_for_anonymous() {
        let store = Arc::new(MemoryStore::new());
        let gate = SessionGate::start(store);
        gate.ready().await;
        assert!(!gate.check_permission(&[Role::Anonymous]));
    }

    #[tokio::test]
    async fn test_sign_in_rejects_bad_email_and_passes_store_message() {
        let store = Arc::new(MemoryStore::new());
        let gate = SessionGate::start(store);

        let err = gate.sign_in("not-an-email", &secret("x")).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidEmail(_)));

        let err = gate
            .sign_in("nobody@amicale.org", &secret("whatever1"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid login credentials");
    }

    #[tokio::test]
    async fn test_sign_up_survives_notification_failure() {
        let store = Arc::new(MemoryStore::new());
        store.set_notifications_down(true);
        let gate = SessionGate::start(Arc::clone(&store) as Arc<dyn RemoteStore>);

        let metadata = SignUpMetadata {
            first_name: "Yasmine".to_string(),
            last_name: "Roux".to_string(),
            ..SignUpMetadata::default()
        };
        let id = gate
            .sign_up("yasmine@amicale.org", &secret("motdepasse"), &metadata)
            .await
            .unwrap();

        assert!(store.has_identity(id));
        assert!(store.notifications().is_empty());
        assert!(gate.principal().is_none());
    }

    #[tokio::test]
    async fn test_sign_up_notifies_admins() {
        let store = Arc::new(MemoryStore::new());
        let gate = SessionGate::start(Arc::clone(&store) as Arc<dyn RemoteStore>);
        gate.sign_up(
            "new@amicale.org",
            &secret("motdepasse"),
            &SignUpMetadata::default(),
        )
        .await
        .unwrap();

        assert!(matches!(
            store.notifications().as_slice(),
            [AdminNotification::NewMember { .. }]
        ));
    }

    #[tokio::test]
    async fn test_weak_password_rejected_before_remote_call() {
        let store = Arc::new(MemoryStore::new());
        let gate = SessionGate::start(Arc::clone(&store) as Arc<dyn RemoteStore>);

        let err = gate
            .sign_up("short@amicale.org", &secret("1234567"), &SignUpMetadata::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::WeakPassword { min: 8 }));
        assert!(store.rows("profiles").is_empty());

        let err = gate.update_password(&secret("short")).await.unwrap_err();
        assert!(matches!(err, AuthError::WeakPassword { .. }));
    }

    #[tokio::test]
    async fn test_shutdown_keeps_last_state() {
        let store = Arc::new(MemoryStore::new());
        let gate = SessionGate::start(store);
        gate.ready().await;
        gate.shutdown();
        assert!(matches!(gate.state(), GateState::Unauthenticated));
        assert!(matches!(gate.ready().await, GateState::Unauthenticated));
    }
}
