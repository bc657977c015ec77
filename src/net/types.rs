//! Wire DTOs for the hosted backend.
//!
//! DESIGN
//! ======
//! These types mirror the service's JSON payloads so serde handles the
//! boundary and the rest of the crate works with typed values. Sessions
//! and users are remote-owned; this crate only holds cached copies.

#[cfg(test)]
#[path = "types_test.rs"]
mod types_test;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Remote-issued identity record. Immutable from this system's side.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Unique user identifier.
    pub id: Uuid,
    /// Email the account was registered with, when the service shares it.
    pub email: Option<String>,
}

/// Opaque token bundle issued by the remote auth service.
///
/// Expiry and refresh are managed remotely; the container never inspects
/// the token beyond forwarding it as a bearer credential.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Seconds until expiry as reported at issue time, if reported.
    #[serde(default)]
    pub expires_in: Option<u64>,
    pub user: User,
}

/// Role/display record keyed by user id, read-only from this system.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub is_admin: bool,
}

impl Profile {
    /// Fail-closed substitute used when a fetch fails: least privilege,
    /// placeholder name.
    #[must_use]
    pub fn degraded() -> Self {
        Self { display_name: Some("unknown".to_owned()), is_admin: false }
    }
}

/// Session lifecycle notification pushed by the session client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    SignedIn(Session),
    /// Same identity, fresh token. Never triggers a profile refetch.
    TokenRefreshed(Session),
    SignedOut,
}

/// Storefront product row as stored in the `products` table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: f64,
    #[serde(default)]
    pub stock: i64,
    #[serde(default)]
    pub image_url: Option<String>,
}
