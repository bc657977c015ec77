//! Mock backends shared by unit tests.
//!
//! DESIGN
//! ======
//! Mocks implement the `backend` traits with scripted data so container
//! and service tests never touch the network. `MockProfileStore::hold`
//! gates a fetch on an explicit release, which makes the stale-response
//! race deterministic to test.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::{Notify, mpsc};
use uuid::Uuid;

use super::backend::{
    CredentialError, ObjectStorage, ProfileStore, RecordStore, SessionBroadcaster, SessionClient,
    SessionError, StoreError,
};
use super::types::{Profile, Session, SessionEvent, User};

#[must_use]
pub fn test_user(email: &str) -> User {
    User { id: Uuid::new_v4(), email: Some(email.to_owned()) }
}

#[must_use]
pub fn session_for(user: &User) -> Session {
    Session {
        access_token: format!("tok-{}", user.id),
        refresh_token: Some(format!("refresh-{}", user.id)),
        expires_in: Some(3600),
        user: user.clone(),
    }
}

// =============================================================================
// SESSION CLIENT
// =============================================================================

enum InitialSession {
    Session(Option<Session>),
    Unreachable,
}

/// Scripted session service. Sign-ins check a credential table and emit
/// events exactly like the real client; arbitrary events can be pushed
/// with `emit`.
pub struct MockSessionClient {
    initial: InitialSession,
    credentials: Mutex<HashMap<String, (String, Session)>>,
    events: SessionBroadcaster,
}

impl MockSessionClient {
    #[must_use]
    pub fn new(initial: Option<Session>) -> Self {
        Self {
            initial: InitialSession::Session(initial),
            credentials: Mutex::new(HashMap::new()),
            events: SessionBroadcaster::new(),
        }
    }

    /// Session retrieval fails as if the service were down.
    #[must_use]
    pub fn unreachable() -> Self {
        Self {
            initial: InitialSession::Unreachable,
            credentials: Mutex::new(HashMap::new()),
            events: SessionBroadcaster::new(),
        }
    }

    pub fn allow_credentials(&self, email: &str, password: &str, session: Session) {
        self.credentials
            .lock()
            .unwrap()
            .insert(email.to_owned(), (password.to_owned(), session));
    }

    /// Push an externally triggered session change to all subscribers.
    pub fn emit(&self, event: &SessionEvent) {
        self.events.emit(event);
    }
}

#[async_trait]
impl SessionClient for MockSessionClient {
    async fn current_session(&self) -> Result<Option<Session>, SessionError> {
        match &self.initial {
            InitialSession::Session(session) => Ok(session.clone()),
            InitialSession::Unreachable => {
                Err(SessionError::Unreachable("connection refused".to_owned()))
            }
        }
    }

    fn subscribe(&self) -> mpsc::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<(), CredentialError> {
        let matched = self
            .credentials
            .lock()
            .unwrap()
            .get(email)
            .filter(|(expected, _)| expected == password)
            .map(|(_, session)| session.clone());
        match matched {
            Some(session) => {
                self.events.emit(&SessionEvent::SignedIn(session));
                Ok(())
            }
            None => Err(CredentialError::Rejected("Invalid login credentials".to_owned())),
        }
    }

    async fn sign_out(&self) {
        self.events.emit(&SessionEvent::SignedOut);
    }
}

// =============================================================================
// PROFILE STORE
// =============================================================================

/// Scripted profile lookups with optional per-user gating.
#[derive(Default)]
pub struct MockProfileStore {
    profiles: Mutex<HashMap<Uuid, Profile>>,
    denied: Mutex<HashSet<Uuid>>,
    gates: Mutex<HashMap<Uuid, Arc<Notify>>>,
    fetch_count: AtomicUsize,
}

impl MockProfileStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, user_id: Uuid, profile: Profile) {
        self.profiles.lock().unwrap().insert(user_id, profile);
    }

    /// Lookups for this user fail with `PermissionDenied`.
    pub fn deny(&self, user_id: Uuid) {
        self.denied.lock().unwrap().insert(user_id);
    }

    /// Block lookups for this user until the returned handle is notified.
    pub fn hold(&self, user_id: Uuid) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.gates.lock().unwrap().insert(user_id, gate.clone());
        gate
    }

    #[must_use]
    pub fn fetch_count(&self) -> usize {
        self.fetch_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProfileStore for MockProfileStore {
    async fn profile_by_user_id(&self, user_id: Uuid) -> Result<Profile, super::backend::ProfileError> {
        use super::backend::ProfileError;

        self.fetch_count.fetch_add(1, Ordering::SeqCst);

        let gate = self.gates.lock().unwrap().get(&user_id).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        if self.denied.lock().unwrap().contains(&user_id) {
            return Err(ProfileError::PermissionDenied);
        }
        self.profiles
            .lock()
            .unwrap()
            .get(&user_id)
            .cloned()
            .ok_or(ProfileError::NotFound)
    }
}

// =============================================================================
// RECORD STORE / OBJECT STORAGE
// =============================================================================

/// Record store returning scripted rows and recording inserts. Inserted
/// records are echoed back with a generated `id`, matching the backend's
/// `return=representation` behavior.
#[derive(Default)]
pub struct MockRecordStore {
    rows: Mutex<HashMap<String, Vec<serde_json::Value>>>,
    rejected_tables: Mutex<HashSet<String>>,
    pub inserted: Mutex<Vec<(String, serde_json::Value)>>,
    next_id: AtomicI64,
}

impl MockRecordStore {
    #[must_use]
    pub fn new() -> Self {
        Self { next_id: AtomicI64::new(1), ..Self::default() }
    }

    pub fn set_rows(&self, table: &str, rows: Vec<serde_json::Value>) {
        self.rows.lock().unwrap().insert(table.to_owned(), rows);
    }

    /// All access to this table fails as a row-level security rejection.
    pub fn reject_table(&self, table: &str) {
        self.rejected_tables.lock().unwrap().insert(table.to_owned());
    }

    fn rejection(&self, table: &str) -> Option<StoreError> {
        self.rejected_tables
            .lock()
            .unwrap()
            .contains(table)
            .then(|| StoreError::Rejected { status: 401, message: "permission denied".to_owned() })
    }
}

#[async_trait]
impl RecordStore for MockRecordStore {
    async fn insert(&self, table: &str, record: serde_json::Value) -> Result<serde_json::Value, StoreError> {
        if let Some(error) = self.rejection(table) {
            return Err(error);
        }
        let mut stored = record;
        if let Some(map) = stored.as_object_mut() {
            map.entry("id")
                .or_insert_with(|| self.next_id.fetch_add(1, Ordering::SeqCst).into());
        }
        self.inserted.lock().unwrap().push((table.to_owned(), stored.clone()));
        Ok(stored)
    }

    async fn select(&self, table: &str, _columns: &str) -> Result<Vec<serde_json::Value>, StoreError> {
        if let Some(error) = self.rejection(table) {
            return Err(error);
        }
        Ok(self.rows.lock().unwrap().get(table).cloned().unwrap_or_default())
    }
}

/// Object storage recording uploads and serving deterministic public URLs.
#[derive(Default)]
pub struct MockObjectStorage {
    pub uploads: Mutex<Vec<(String, String, String, usize)>>,
    fail: AtomicBool,
}

impl MockObjectStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_uploads(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl ObjectStorage for MockObjectStorage {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StoreError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(StoreError::Rejected { status: 403, message: "bucket policy".to_owned() });
        }
        self.uploads.lock().unwrap().push((
            bucket.to_owned(),
            path.to_owned(),
            content_type.to_owned(),
            bytes.len(),
        ));
        Ok(format!("https://cdn.test/{bucket}/{path}"))
    }
}
