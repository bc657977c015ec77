//! REST implementation of the backend contracts.
//!
//! SYSTEM CONTEXT
//! ==============
//! The hosted service exposes auth under `/auth/v1`, row access under
//! `/rest/v1` and object storage under `/storage/v1`. This client speaks
//! those three surfaces and emits `SessionEvent`s for its own auth calls,
//! so the state container observes sign-in/sign-out the same way it would
//! observe externally triggered changes.
//!
//! TRADE-OFFS
//! ==========
//! Sign-out clears the cached session and notifies subscribers before the
//! remote call completes; a failed logout request leaves the remote token
//! to expire on its own rather than leaving the client signed in.

#[cfg(test)]
#[path = "rest_test.rs"]
mod rest_test;

use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::config::StoreConfig;

use super::backend::{
    CredentialError, ObjectStorage, ProfileStore, RecordStore, SessionBroadcaster, SessionClient,
    SessionError, StoreError,
};
use super::types::{Profile, Session, SessionEvent, User};

/// HTTP client for the hosted backend, implementing all four contracts.
pub struct RestClient {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
    /// Cached copy of the current session; the service owns the truth.
    session: Mutex<Option<Session>>,
    /// Token restored from configuration, validated lazily by
    /// `current_session`.
    restored_token: Option<String>,
    events: SessionBroadcaster,
}

impl RestClient {
    #[must_use]
    pub fn new(config: &StoreConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.base_url.clone(),
            anon_key: config.anon_key.clone(),
            session: Mutex::new(None),
            restored_token: config.access_token.clone(),
            events: SessionBroadcaster::new(),
        }
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1{path}", self.base_url)
    }

    fn rest_url(&self, table: &str, query: &str) -> String {
        format!("{}/rest/v1/{table}?{query}", self.base_url)
    }

    fn storage_upload_url(&self, bucket: &str, path: &str) -> String {
        format!("{}/storage/v1/object/{bucket}/{path}", self.base_url)
    }

    /// Public URL of an uploaded object, valid for public buckets.
    #[must_use]
    pub fn public_object_url(&self, bucket: &str, path: &str) -> String {
        format!("{}/storage/v1/object/public/{bucket}/{path}", self.base_url)
    }

    fn cached_session(&self) -> Option<Session> {
        self.session.lock().expect("session cache lock poisoned").clone()
    }

    fn store_session(&self, session: Option<Session>) {
        *self.session.lock().expect("session cache lock poisoned") = session;
    }

    /// Bearer credential for data requests: the user token when signed in,
    /// the anon key otherwise (row-level security decides what it may see).
    fn bearer_token(&self) -> String {
        self.cached_session()
            .map_or_else(|| self.anon_key.clone(), |s| s.access_token)
    }

    fn data_request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, url)
            .header("apikey", self.anon_key.as_str())
            .bearer_auth(self.bearer_token())
    }

    /// Exchange a refresh token for a fresh session, keeping the same
    /// identity. Emits `TokenRefreshed` on success.
    pub async fn refresh_session(&self) -> Result<Session, SessionError> {
        let Some(refresh_token) = self.cached_session().and_then(|s| s.refresh_token) else {
            return Err(SessionError::Malformed("no refresh token held".to_owned()));
        };

        let url = self.auth_url("/token?grant_type=refresh_token");
        let response = self
            .http
            .post(&url)
            .header("apikey", self.anon_key.as_str())
            .json(&serde_json::json!({ "refresh_token": refresh_token }))
            .send()
            .await
            .map_err(|e| SessionError::Unreachable(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SessionError::Malformed(error_message(status.as_u16(), &body)));
        }

        let session = response
            .json::<Session>()
            .await
            .map_err(|e| SessionError::Malformed(e.to_string()))?;
        self.store_session(Some(session.clone()));
        self.events.emit(&SessionEvent::TokenRefreshed(session.clone()));
        Ok(session)
    }
}

/// Pull a human-readable message out of an auth error body. The service
/// varies the field name across endpoints.
fn error_message(status: u16, body: &str) -> String {
    let parsed = serde_json::from_str::<serde_json::Value>(body).ok();
    let from_field = parsed.as_ref().and_then(|value| {
        ["error_description", "msg", "message", "error"]
            .iter()
            .find_map(|field| value.get(field).and_then(serde_json::Value::as_str))
            .map(ToOwned::to_owned)
    });
    from_field.unwrap_or_else(|| {
        if body.trim().is_empty() {
            format!("HTTP {status}")
        } else {
            body.trim().to_owned()
        }
    })
}

#[async_trait]
impl SessionClient for RestClient {
    async fn current_session(&self) -> Result<Option<Session>, SessionError> {
        if let Some(session) = self.cached_session() {
            return Ok(Some(session));
        }
        let Some(token) = self.restored_token.clone() else {
            return Ok(None);
        };

        // Validate the restored token against the auth service; a rejected
        // token means anonymous, not an error.
        let response = self
            .http
            .get(self.auth_url("/user"))
            .header("apikey", self.anon_key.as_str())
            .bearer_auth(&token)
            .send()
            .await
            .map_err(|e| SessionError::Unreachable(e.to_string()))?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED
            || response.status() == reqwest::StatusCode::FORBIDDEN
        {
            return Ok(None);
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SessionError::Malformed(error_message(status.as_u16(), &body)));
        }

        let user = response
            .json::<User>()
            .await
            .map_err(|e| SessionError::Malformed(e.to_string()))?;
        let session = Session { access_token: token, refresh_token: None, expires_in: None, user };
        self.store_session(Some(session.clone()));
        Ok(Some(session))
    }

    fn subscribe(&self) -> mpsc::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<(), CredentialError> {
        let url = self.auth_url("/token?grant_type=password");
        let response = self
            .http
            .post(&url)
            .header("apikey", self.anon_key.as_str())
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(|e| CredentialError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(CredentialError::Rejected(error_message(status.as_u16(), &body)));
        }

        let session = response
            .json::<Session>()
            .await
            .map_err(|e| CredentialError::Transport(e.to_string()))?;
        self.store_session(Some(session.clone()));
        self.events.emit(&SessionEvent::SignedIn(session));
        Ok(())
    }

    async fn sign_out(&self) {
        let token = self.cached_session().map(|s| s.access_token);
        self.store_session(None);
        self.events.emit(&SessionEvent::SignedOut);

        let Some(token) = token else { return };
        let result = self
            .http
            .post(self.auth_url("/logout"))
            .header("apikey", self.anon_key.as_str())
            .bearer_auth(token)
            .send()
            .await;
        if let Err(error) = result {
            tracing::debug!(%error, "remote logout failed; token left to expire");
        }
    }
}

#[async_trait]
impl ProfileStore for RestClient {
    async fn profile_by_user_id(&self, user_id: Uuid) -> Result<Profile, super::backend::ProfileError> {
        use super::backend::ProfileError;

        let url = self.rest_url("profiles", &format!("select=display_name,is_admin&id=eq.{user_id}"));
        let response = self
            .data_request(reqwest::Method::GET, &url)
            .send()
            .await
            .map_err(|e| ProfileError::Remote(e.to_string()))?;

        match response.status() {
            reqwest::StatusCode::UNAUTHORIZED | reqwest::StatusCode::FORBIDDEN => {
                return Err(ProfileError::PermissionDenied);
            }
            status if !status.is_success() => {
                let body = response.text().await.unwrap_or_default();
                return Err(ProfileError::Remote(error_message(status.as_u16(), &body)));
            }
            _ => {}
        }

        let mut rows = response
            .json::<Vec<Profile>>()
            .await
            .map_err(|e| ProfileError::Remote(e.to_string()))?;
        if rows.is_empty() {
            return Err(ProfileError::NotFound);
        }
        Ok(rows.swap_remove(0))
    }
}

#[async_trait]
impl RecordStore for RestClient {
    async fn insert(&self, table: &str, record: serde_json::Value) -> Result<serde_json::Value, StoreError> {
        let url = self.rest_url(table, "select=*");
        let response = self
            .data_request(reqwest::Method::POST, &url)
            .header("Prefer", "return=representation")
            .json(&serde_json::Value::Array(vec![record]))
            .send()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Rejected { status, message: error_message(status, &body) });
        }

        let mut rows = response
            .json::<Vec<serde_json::Value>>()
            .await
            .map_err(|e| StoreError::Malformed(e.to_string()))?;
        if rows.is_empty() {
            return Err(StoreError::Malformed("insert returned no representation".to_owned()));
        }
        Ok(rows.swap_remove(0))
    }

    async fn select(&self, table: &str, columns: &str) -> Result<Vec<serde_json::Value>, StoreError> {
        let url = self.rest_url(table, &format!("select={columns}"));
        let response = self
            .data_request(reqwest::Method::GET, &url)
            .send()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Rejected { status, message: error_message(status, &body) });
        }

        response
            .json::<Vec<serde_json::Value>>()
            .await
            .map_err(|e| StoreError::Malformed(e.to_string()))
    }
}

#[async_trait]
impl ObjectStorage for RestClient {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StoreError> {
        let url = self.storage_upload_url(bucket, path);
        let response = self
            .data_request(reqwest::Method::POST, &url)
            .header("Content-Type", content_type)
            .body(bytes)
            .send()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Rejected { status, message: error_message(status, &body) });
        }

        Ok(self.public_object_url(bucket, path))
    }
}
