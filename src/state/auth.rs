//! Auth/session/role state container.
//!
//! ARCHITECTURE
//! ============
//! Single source of truth for the current visitor's identity and role.
//! The remote session service pushes lifecycle events; a listener task
//! mirrors them into the snapshot and a profile fetch resolves the role
//! for each new identity. Consumers read `snapshot()` or watch
//! `subscribe()`; they never write back.
//!
//! TRADE-OFFS
//! ==========
//! Profile fetches are keyed by a generation counter bumped on every
//! identity transition. A fetch that resolves after a later sign-in is
//! discarded, so the snapshot can never show one user's role against
//! another user's identity. The cost is a visible loading window on rapid
//! re-sign-in, which is acceptable; serving a stale admin flag is not.

#[cfg(test)]
#[path = "auth_test.rs"]
mod auth_test;

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::net::backend::{CredentialError, SessionClient};
use crate::net::types::{Profile, Session, SessionEvent, User};
use crate::services::profile::ProfileFetcher;

/// Read-only view of the current auth state.
///
/// Never persisted; rebuilt from the remote session on every process
/// start.
#[derive(Clone, Debug)]
pub struct AuthSnapshot {
    pub user: Option<User>,
    pub session: Option<Session>,
    pub profile: Option<Profile>,
    /// True while the initial session or a profile fetch is unresolved.
    pub loading: bool,
}

impl AuthSnapshot {
    /// State before `initialize` has resolved anything.
    #[must_use]
    pub fn initial() -> Self {
        Self { user: None, session: None, profile: None, loading: true }
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    /// Fail-closed: true only while a fetched profile carries the admin
    /// flag. Missing or degraded profiles are never admin.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.profile.as_ref().is_some_and(|p| p.is_admin)
    }
}

struct Inner {
    snapshot: AuthSnapshot,
    /// Bumped on every identity transition; in-flight profile fetches
    /// carry the value they started under.
    generation: u64,
}

/// Owned auth state container. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct AuthContainer {
    sessions: Arc<dyn SessionClient>,
    profiles: ProfileFetcher,
    inner: Arc<Mutex<Inner>>,
    changes: Arc<watch::Sender<AuthSnapshot>>,
    listener: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl AuthContainer {
    #[must_use]
    pub fn new(sessions: Arc<dyn SessionClient>, profiles: ProfileFetcher) -> Self {
        let snapshot = AuthSnapshot::initial();
        let (changes, _) = watch::channel(snapshot.clone());
        Self {
            sessions,
            profiles,
            inner: Arc::new(Mutex::new(Inner { snapshot, generation: 0 })),
            changes: Arc::new(changes),
            listener: Arc::new(Mutex::new(None)),
        }
    }

    /// Resolve the current session and start mirroring lifecycle events.
    ///
    /// Retrieval failure resolves to anonymous rather than loading
    /// forever. The event subscription is taken before the retrieval so a
    /// change arriving in between is not lost.
    pub async fn initialize(&self) {
        let mut events = self.sessions.subscribe();

        match self.sessions.current_session().await {
            Ok(session) => self.apply_session(session),
            Err(error) => {
                tracing::warn!(%error, "session retrieval failed; starting anonymous");
                self.apply_session(None);
            }
        }

        let container = self.clone();
        let handle = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                container.apply_event(event);
            }
        });
        let previous = self
            .listener
            .lock()
            .expect("auth listener lock poisoned")
            .replace(handle);
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    /// Delegate credential verification. User/session state is updated by
    /// the event listener, never here, so form feedback and state changes
    /// cannot race each other.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<(), CredentialError> {
        self.sessions.sign_in(email, password).await
    }

    /// End the session. `loading` is held true for the duration of the
    /// call; the resulting `SignedOut` event clears the rest.
    pub async fn sign_out(&self) {
        {
            let mut inner = self.lock_inner();
            inner.snapshot.loading = true;
            self.publish(&inner);
        }
        self.sessions.sign_out().await;
    }

    /// Current state, cloned.
    #[must_use]
    pub fn snapshot(&self) -> AuthSnapshot {
        self.changes.borrow().clone()
    }

    /// Watch channel for consumers that re-render on every change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AuthSnapshot> {
        self.changes.subscribe()
    }

    /// Stop the event listener. Pending profile fetches resolve against a
    /// generation that no longer advances, which is harmless.
    pub fn shutdown(&self) {
        let handle = self.listener.lock().expect("auth listener lock poisoned").take();
        if let Some(handle) = handle {
            handle.abort();
        }
    }

    fn apply_event(&self, event: SessionEvent) {
        match event {
            SessionEvent::SignedIn(session) | SessionEvent::TokenRefreshed(session) => {
                self.apply_session(Some(session));
            }
            SessionEvent::SignedOut => self.apply_session(None),
        }
    }

    /// Mirror a remote session value into the snapshot. Idempotent: the
    /// same session applied twice changes nothing and fetches nothing.
    fn apply_session(&self, session: Option<Session>) {
        let mut pending: Option<(Uuid, u64)> = None;
        {
            let mut inner = self.lock_inner();
            let previous_user = inner.snapshot.user.as_ref().map(|u| u.id);
            let next_user = session.as_ref().map(|s| s.user.id);

            inner.snapshot.user = session.as_ref().map(|s| s.user.clone());
            inner.snapshot.session = session;

            match next_user {
                None => {
                    // Sign-out clears the profile in the same transition;
                    // a stale role must never be observable.
                    inner.snapshot.profile = None;
                    inner.snapshot.loading = false;
                    inner.generation += 1;
                }
                Some(id) if previous_user == Some(id) => {
                    // Same identity: token refresh or duplicate event.
                    // Keep the profile; a fetch still in flight keeps its
                    // loading window.
                    if inner.snapshot.profile.is_some() {
                        inner.snapshot.loading = false;
                    }
                }
                Some(id) => {
                    inner.snapshot.profile = None;
                    inner.snapshot.loading = true;
                    inner.generation += 1;
                    pending = Some((id, inner.generation));
                }
            }
            self.publish(&inner);
        }

        if let Some((user_id, generation)) = pending {
            let container = self.clone();
            tokio::spawn(async move {
                let profile = container.profiles.resolve(user_id).await;
                container.commit_profile(user_id, generation, profile);
            });
        }
    }

    fn commit_profile(&self, user_id: Uuid, generation: u64, profile: Profile) {
        let mut inner = self.lock_inner();
        let current_user = inner.snapshot.user.as_ref().map(|u| u.id);
        if inner.generation != generation || current_user != Some(user_id) {
            tracing::debug!(%user_id, "discarding stale profile fetch");
            return;
        }
        inner.snapshot.profile = Some(profile);
        inner.snapshot.loading = false;
        self.publish(&inner);
    }

    fn lock_inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().expect("auth state lock poisoned")
    }

    fn publish(&self, inner: &MutexGuard<'_, Inner>) {
        self.changes.send_replace(inner.snapshot.clone());
    }
}
