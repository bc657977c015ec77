//! Contracts the hosted backend is consumed through.
//!
//! ARCHITECTURE
//! ============
//! Four narrow traits keep the auth container and the storefront services
//! independent of the transport: session lifecycle, profile lookup, record
//! access and object storage. `rest::RestClient` implements all of them;
//! tests drive the same seams with mocks.
//!
//! ERROR HANDLING
//! ==============
//! One error enum per concern. Credential rejections carry the backend's
//! message verbatim so sign-in forms can show it; nothing here is fatal to
//! the process and nothing is retried automatically.

#[cfg(test)]
#[path = "backend_test.rs"]
mod backend_test;

use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::types::{Profile, Session, SessionEvent};

/// Buffered events per subscriber; a lagging consumer misses events
/// rather than blocking the emitter.
const EVENT_CHANNEL_CAPACITY: usize = 16;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session service unreachable: {0}")]
    Unreachable(String),
    #[error("malformed session response: {0}")]
    Malformed(String),
}

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    /// The backend rejected the credentials; message is surfaced verbatim.
    #[error("{0}")]
    Rejected(String),
    #[error("sign-in request failed: {0}")]
    Transport(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("profile not found")]
    NotFound,
    #[error("profile access denied")]
    PermissionDenied,
    #[error("profile fetch failed: {0}")]
    Remote(String),
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("request failed: {0}")]
    Transport(String),
    #[error("rejected by backend ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("malformed response: {0}")]
    Malformed(String),
}

/// Remote session service: credential exchange, current-session retrieval
/// and change notifications.
#[async_trait]
pub trait SessionClient: Send + Sync {
    /// Ask the service for the currently valid session, if any.
    async fn current_session(&self) -> Result<Option<Session>, SessionError>;

    /// Subscribe to session lifecycle events. Dropping the receiver
    /// unsubscribes.
    fn subscribe(&self) -> mpsc::Receiver<SessionEvent>;

    /// Exchange email/password for a session. State updates arrive through
    /// the event stream, not the return value.
    async fn sign_in(&self, email: &str, password: &str) -> Result<(), CredentialError>;

    /// End the current session. Best-effort: the local session is cleared
    /// and `SignedOut` is emitted even if the remote call fails.
    async fn sign_out(&self);
}

/// Single-row profile lookup keyed by user id.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn profile_by_user_id(&self, user_id: Uuid) -> Result<Profile, ProfileError>;
}

/// Row insert/select against the hosted record store. Access control is
/// enforced remotely per row; callers only see the filtered result.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn insert(&self, table: &str, record: serde_json::Value) -> Result<serde_json::Value, StoreError>;

    async fn select(&self, table: &str, columns: &str) -> Result<Vec<serde_json::Value>, StoreError>;
}

/// Hosted object storage. Upload returns the public URL of the object.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StoreError>;
}

// =============================================================================
// SESSION EVENT FAN-OUT
// =============================================================================

/// Fan-out of session events to any number of subscribers.
///
/// Each subscriber owns an mpsc receiver; closed subscribers are pruned on
/// the next emit. Emission never blocks the caller.
#[derive(Default)]
pub struct SessionBroadcaster {
    subscribers: Mutex<Vec<mpsc::Sender<SessionEvent>>>,
}

impl SessionBroadcaster {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new subscriber and return its receiving end.
    pub fn subscribe(&self) -> mpsc::Receiver<SessionEvent> {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        self.subscribers
            .lock()
            .expect("session broadcaster lock poisoned")
            .push(tx);
        rx
    }

    /// Deliver `event` to every live subscriber.
    pub fn emit(&self, event: &SessionEvent) {
        let mut subscribers = self
            .subscribers
            .lock()
            .expect("session broadcaster lock poisoned");
        subscribers.retain(|tx| match tx.try_send(event.clone()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!("session event subscriber is lagging; dropping event");
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        });
    }

    /// Number of live subscribers (closed ones may linger until next emit).
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .expect("session broadcaster lock poisoned")
            .len()
    }
}
